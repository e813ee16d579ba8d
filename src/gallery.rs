use crate::config::{DelayRange, GalleryMarkers, SamplingConfig, TransportConfig};
use crate::markup::{Document, Element, HtmlPage};
use crate::transport::Fetch;
use crate::Result;
use once_cell::sync::Lazy;
use rand::Rng;
use rand::seq::index;
use regex::Regex;
use std::collections::HashSet;
use tracing::{debug, info, warn};
use url::Url;

static PAGE_COUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s+files?\s+on\s+(\d+)\s+page").unwrap());

/// Samples media URLs from a paginated gallery.
///
/// Page 1 is always read. When the gallery reports more pages, up to
/// `max_extra_pages` of the remaining pages are picked at random and read in
/// ascending order. The deduplicated result is capped at `max_items` by a
/// uniform random sample.
pub struct GallerySampler<'a, F: Fetch> {
    fetcher: &'a F,
    markers: &'a GalleryMarkers,
    transport: &'a TransportConfig,
    sampling: SamplingConfig,
    page_delay: DelayRange,
}

impl<'a, F: Fetch> GallerySampler<'a, F> {
    pub fn new(
        fetcher: &'a F,
        markers: &'a GalleryMarkers,
        transport: &'a TransportConfig,
        sampling: SamplingConfig,
        page_delay: DelayRange,
    ) -> Self {
        Self {
            fetcher,
            markers,
            transport,
            sampling,
            page_delay,
        }
    }

    /// Never fails: a page-1 failure yields an empty list, an extra-page
    /// failure is logged and that page skipped.
    pub fn sample<R: Rng + ?Sized>(&self, gallery_url: &Url, rng: &mut R) -> Vec<Url> {
        self.try_sample(gallery_url, rng).unwrap_or_else(|err| {
            warn!(url = %gallery_url, error = %err, "gallery index fetch failed");
            Vec::new()
        })
    }

    /// Like [`Self::sample`], but a page-1 failure is returned to the caller
    /// so it can be retried later. Extra-page failures are still skipped.
    pub fn try_sample<R: Rng + ?Sized>(&self, gallery_url: &Url, rng: &mut R) -> Result<Vec<Url>> {
        let body = self
            .fetcher
            .fetch_html(gallery_url, self.transport.page_timeout())?;
        let first = HtmlPage::parse(&body);

        let mut candidates = extract_media_urls(&first, gallery_url, self.markers);
        let total_pages = parse_page_count(&first.text()).unwrap_or(1);

        let extra_pages = choose_extra_pages(total_pages, self.sampling.max_extra_pages, rng);
        if !extra_pages.is_empty() {
            info!(total_pages, pages = ?extra_pages, "sampling extra gallery pages");
        }

        for page in extra_pages {
            self.page_delay.sleep(rng);
            let page_url = page_url(gallery_url, page);
            match self
                .fetcher
                .fetch_html(&page_url, self.transport.extra_page_timeout())
            {
                Ok(body) => {
                    let doc = HtmlPage::parse(&body);
                    candidates.extend(extract_media_urls(&doc, gallery_url, self.markers));
                }
                Err(err) => warn!(url = %page_url, page, error = %err, "gallery page skipped"),
            }
        }

        let unique = dedupe(candidates);
        let found = unique.len();
        let selected = cap_random(unique, self.sampling.max_items, rng);
        debug!(found, selected = selected.len(), "gallery sampled");
        Ok(selected)
    }
}

/// Media links of a gallery page: every image's enclosing anchor, kept when
/// it targets an image file rather than another gallery view. Relative hrefs
/// resolve against the gallery index URL.
pub fn extract_media_urls<D: Document>(doc: &D, gallery_url: &Url, markers: &GalleryMarkers) -> Vec<Url> {
    let mut urls = Vec::new();
    for img in doc.find_all("img") {
        let Some(anchor) = img.enclosing("a") else {
            continue;
        };
        let Some(href) = anchor.attr("href").map(str::trim).filter(|h| !h.is_empty()) else {
            continue;
        };
        if markers
            .self_reference_markers
            .iter()
            .any(|m| href.contains(m.as_str()))
        {
            continue;
        }
        let Ok(url) = gallery_url.join(href) else {
            continue;
        };
        let path = url.path().to_ascii_lowercase();
        if markers
            .image_extensions
            .iter()
            .any(|ext| path.ends_with(ext.as_str()))
        {
            urls.push(url);
        }
    }
    urls
}

/// Reads the total page count from an "N files on M page(s)" indicator.
pub fn parse_page_count(text: &str) -> Option<usize> {
    let captures = PAGE_COUNT.captures(text)?;
    captures[2].parse().ok().filter(|&pages| pages >= 1)
}

/// Distinct page numbers from `2..=total_pages`, at most `max_extra`,
/// sorted ascending.
pub fn choose_extra_pages<R: Rng + ?Sized>(total_pages: usize, max_extra: usize, rng: &mut R) -> Vec<usize> {
    if total_pages <= 1 || max_extra == 0 {
        return Vec::new();
    }
    let pool = total_pages - 1;
    let amount = max_extra.min(pool);
    let mut pages: Vec<usize> = index::sample(rng, pool, amount)
        .into_iter()
        .map(|i| i + 2)
        .collect();
    pages.sort_unstable();
    pages
}

pub fn page_url(gallery_url: &Url, page: usize) -> Url {
    let mut url = gallery_url.clone();
    url.query_pairs_mut().append_pair("page", &page.to_string());
    url
}

fn dedupe(urls: Vec<Url>) -> Vec<Url> {
    let mut seen = HashSet::new();
    urls.into_iter().filter(|u| seen.insert(u.clone())).collect()
}

/// Uniform sample of exactly `max_items` when over the cap, keeping the
/// original relative order.
fn cap_random<R: Rng + ?Sized>(urls: Vec<Url>, max_items: usize, rng: &mut R) -> Vec<Url> {
    if urls.len() <= max_items {
        return urls;
    }
    let mut keep = index::sample(rng, urls.len(), max_items).into_vec();
    keep.sort_unstable();
    let mut keep = keep.into_iter().peekable();
    urls.into_iter()
        .enumerate()
        .filter_map(|(i, url)| {
            if keep.peek() == Some(&i) {
                keep.next();
                Some(url)
            } else {
                None
            }
        })
        .collect()
}
