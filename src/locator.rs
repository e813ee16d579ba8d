use crate::config::GalleryMarkers;
use crate::markup::PageLink;
use tracing::debug;
use url::Url;

/// Finds the gallery index URL among an episode page's links.
///
/// Links whose href contains the gallery marker are candidates. A candidate
/// whose visible text mentions one of the media keywords wins; otherwise the
/// first candidate is used. Relative hrefs are resolved against the site
/// root, since the gallery lives at a fixed location independent of the
/// episode page path.
pub fn locate(links: &[PageLink], site_base: &Url, markers: &GalleryMarkers) -> Option<Url> {
    let candidates: Vec<&PageLink> = links
        .iter()
        .filter(|link| link.href.contains(markers.index_marker.as_str()))
        .collect();

    let chosen = candidates
        .iter()
        .find(|link| {
            let text = link.text.to_lowercase();
            markers
                .media_keywords
                .iter()
                .any(|keyword| text.contains(keyword.as_str()))
        })
        .or_else(|| candidates.first())?;

    let resolved = resolve_against_site(site_base, &chosen.href);
    if resolved.is_none() {
        debug!(href = %chosen.href, "gallery link could not be resolved");
    }
    resolved
}

/// Joins `href` onto the site root. Absolute hrefs are returned as-is.
pub fn resolve_against_site(site_base: &Url, href: &str) -> Option<Url> {
    if let Ok(absolute) = Url::parse(href) {
        return Some(absolute);
    }

    let mut root = site_base.clone();
    if !root.path().ends_with('/') {
        let path = format!("{}/", root.path());
        root.set_path(&path);
    }
    root.join(href.trim_start_matches('/')).ok()
}
