use crate::config::{ListingLayout, SeriesSource};
use crate::episode_code::EpisodeCode;
use crate::markup::{Document, Element, PageLink};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use tracing::debug;
use url::Url;

static SEASON_X_EPISODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+x\d+").unwrap());
static SEASON_NUMBERED_PAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)season\d+/\d{3}\.html").unwrap());

/// One episode found on a series listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeLink {
    pub code: EpisodeCode,
    pub title: String,
    pub url: Url,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub episodes: Vec<EpisodeLink>,
    /// Raw labels or hrefs that looked like episodes but did not normalize.
    pub unrecognized: Vec<String>,
}

/// Extracts the episodes of a series listing page in page order, using the
/// layout declared for the series.
pub fn enumerate<D: Document>(doc: &D, series: &SeriesSource) -> Listing {
    let listing = match &series.layout {
        ListingLayout::Table {
            link_class,
            code_class,
        } => enumerate_table(doc, &series.episodes_url, link_class, code_class),
        ListingLayout::AnchorPattern => enumerate_anchors(doc, &series.episodes_url),
    };
    debug!(
        series = %series.slug,
        episodes = listing.episodes.len(),
        unrecognized = listing.unrecognized.len(),
        "listing enumerated"
    );
    listing
}

fn enumerate_table<D: Document>(doc: &D, listing_url: &Url, link_class: &str, code_class: &str) -> Listing {
    let mut listing = Listing::default();

    for cell in doc.find_by_class("td", link_class) {
        let Some(link) = cell.find_first("a").as_ref().and_then(PageLink::from_element) else {
            continue;
        };
        let label = cell
            .enclosing("tr")
            .and_then(|row| row.find_all("td").into_iter().find(|td| td.has_class(code_class)))
            .map(|td| td.text().trim().to_string());
        let Some(label) = label else {
            continue;
        };

        let Some(code) = EpisodeCode::normalize(&label) else {
            listing.unrecognized.push(label);
            continue;
        };
        let Ok(url) = listing_url.join(&link.href) else {
            listing.unrecognized.push(link.href);
            continue;
        };

        listing.episodes.push(EpisodeLink {
            code,
            title: link.text,
            url,
        });
    }

    listing
}

fn looks_like_episode_href(href: &str) -> bool {
    let lower = href.to_ascii_lowercase();
    (lower.contains("season") && SEASON_X_EPISODE.is_match(&lower))
        || SEASON_NUMBERED_PAGE.is_match(&lower)
}

fn enumerate_anchors<D: Document>(doc: &D, listing_url: &Url) -> Listing {
    let mut listing = Listing::default();
    let mut seen = HashSet::new();

    for link in doc.links() {
        if !looks_like_episode_href(&link.href) {
            continue;
        }
        let Ok(url) = listing_url.join(&link.href) else {
            listing.unrecognized.push(link.href);
            continue;
        };
        if !seen.insert(url.as_str().trim_end_matches('/').to_string()) {
            continue;
        }

        match EpisodeCode::from_url_path(url.path()) {
            Some(code) => listing.episodes.push(EpisodeLink {
                code,
                title: link.text,
                url,
            }),
            None => listing.unrecognized.push(link.href),
        }
    }

    listing
}
