// Shared fixtures for the integration tests: a scripted fetcher that serves
// canned pages and records every request, plus a small legacy-style site.

#![allow(dead_code)]

use chrono::NaiveDate;
use screencap_harvester::config::{ConfigBuilder, HarvestConfig, ListingLayout, Pacing, SeriesSource};
use screencap_harvester::transport::{Fetch, FetchedPage};
use screencap_harvester::{EpisodeRecord, EpisodeReference, EpisodeReferences, SeriesKey, SourceTag};
use std::cell::RefCell;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

pub const SLUG: &str = "star-trek-enterprise";
pub const LISTING: &str = "https://ent.trekcore.com/episodes/";
pub const GALLERY: &str = "https://ent.trekcore.com/gallery/thumbnails.php?album=12";

/// Serves registered pages; anything else is a 404.
#[derive(Default)]
pub struct ScriptedFetcher {
    pages: HashMap<String, FetchedPage>,
    log: RefCell<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, body: impl Into<String>) -> Self {
        self.pages.insert(
            url.to_string(),
            FetchedPage {
                status: 200,
                body: body.into(),
            },
        );
        self
    }

    pub fn status(mut self, url: &str, status: u16) -> Self {
        self.pages.insert(
            url.to_string(),
            FetchedPage {
                status,
                body: String::new(),
            },
        );
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    pub fn requested(&self, url: &str) -> usize {
        self.log.borrow().iter().filter(|u| u.as_str() == url).count()
    }
}

impl Fetch for ScriptedFetcher {
    fn fetch(&self, url: &Url, _timeout: Duration) -> screencap_harvester::Result<FetchedPage> {
        self.log.borrow_mut().push(url.to_string());
        Ok(self.pages.get(url.as_str()).cloned().unwrap_or(FetchedPage {
            status: 404,
            body: "not found".to_string(),
        }))
    }
}

pub fn series() -> SeriesSource {
    SeriesSource {
        slug: SeriesKey::new(SLUG),
        name: "Star Trek: Enterprise".to_string(),
        base_url: Url::parse("https://ent.trekcore.com").unwrap(),
        episodes_url: Url::parse(LISTING).unwrap(),
        layout: ListingLayout::AnchorPattern,
        source: SourceTag::Legacy,
    }
}

/// One legacy series, no pacing delays.
pub fn config() -> HarvestConfig {
    let base = HarvestConfig {
        series: vec![series()],
        ..HarvestConfig::default()
    };
    ConfigBuilder::new()
        .base(base)
        .pacing(Pacing::none())
        .build()
        .unwrap()
}

pub fn episode_url(code: &str) -> String {
    format!("{LISTING}season1/{code}/")
}

/// Listing page linking the given `(code, title)` pairs, e.g. `("1x02", "Fight or Flight")`.
pub fn listing(episodes: &[(&str, &str)]) -> String {
    let links: String = episodes
        .iter()
        .map(|(code, title)| format!(r#"<li><a href="season1/{code}/">{title}</a></li>"#))
        .collect();
    format!(r#"<html><body><a href="/gallery/">Gallery</a><ul>{links}</ul></body></html>"#)
}

pub fn episode_page_with_gallery() -> String {
    r#"<html><body>
        <a href="/gallery/thumbnails.php?album=99">Behind the Scenes</a>
        <a href="/gallery/thumbnails.php?album=12">Episode Screencaps</a>
    </body></html>"#
        .to_string()
}

pub fn gallery_page_url(page: usize) -> String {
    format!("{GALLERY}&page={page}")
}

/// A thumbnail page with `count` distinct images, carrying the page-count
/// indicator when `total` is given.
pub fn gallery_page(page: usize, count: usize, total: Option<(usize, usize)>) -> String {
    let thumbs: String = (0..count)
        .map(|i| {
            format!(
                r#"<td><a href="albums/ent/1x02/fof_{page:02}_{i:03}.jpg"><img src="albums/ent/1x02/thumb_fof_{page:02}_{i:03}.jpg"></a></td>"#
            )
        })
        .collect();
    let indicator = total
        .map(|(files, pages)| format!("<td class=\"tableh1\">{files} files on {pages} page(s)</td>"))
        .unwrap_or_default();
    format!(
        r#"<html><body><table><tr>{indicator}</tr><tr>{thumbs}</tr>
        <tr><td><a href="displayimage.php?album=12&pid=1"><img src="images/next.gif"></a></td></tr></table></body></html>"#
    )
}

pub fn record(code: &str, urls: &[&str]) -> EpisodeRecord {
    EpisodeRecord {
        series_slug: SeriesKey::new(SLUG),
        episode_number: code.parse().unwrap(),
        episode_title: "Broken Bow".to_string(),
        screencaps: urls.iter().map(|u| u.to_string()).collect(),
        source: SourceTag::Legacy,
        scraped_at: NaiveDate::from_ymd_opt(2025, 2, 1)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap(),
    }
}

pub fn references() -> EpisodeReferences {
    EpisodeReferences {
        episodes: vec![
            EpisodeReference::new(SLUG, "S1E01", "Broken Bow"),
            EpisodeReference::new(SLUG, "S1E02", "Fight or Flight"),
        ],
        ..EpisodeReferences::default()
    }
}
