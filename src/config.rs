use crate::catalog::{SeriesKey, SourceTag};
use crate::{HarvestError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// How a series' episode listing page is laid out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ListingLayout {
    /// Table rows: the link and title sit in one cell, the episode label in a
    /// sibling cell of the same row.
    Table { link_class: String, code_class: String },
    /// Episode links recognized by URL shape anywhere on the page.
    AnchorPattern,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesSource {
    pub slug: SeriesKey,
    pub name: String,
    pub base_url: Url,
    pub episodes_url: Url,
    pub layout: ListingLayout,
    pub source: SourceTag,
}

impl SeriesSource {
    fn trekcore_legacy(slug: &str, host: &str, name: &str) -> Self {
        let base = format!("https://{host}.trekcore.com");
        Self {
            slug: SeriesKey::new(slug),
            name: name.to_string(),
            base_url: Url::parse(&base).expect("static url"),
            episodes_url: Url::parse(&format!("{base}/episodes/")).expect("static url"),
            layout: ListingLayout::AnchorPattern,
            source: SourceTag::Legacy,
        }
    }
}

pub fn default_series() -> Vec<SeriesSource> {
    let mut series = vec![SeriesSource {
        slug: SeriesKey::new("star-trek-starfleet-academy"),
        name: "Star Trek: Starfleet Academy".to_string(),
        base_url: Url::parse("https://academy.trekcore.com").expect("static url"),
        episodes_url: Url::parse("https://academy.trekcore.com/episodes/").expect("static url"),
        layout: ListingLayout::Table {
            link_class: "col2".to_string(),
            code_class: "col1".to_string(),
        },
        source: SourceTag::Primary,
    }];
    series.extend([
        SeriesSource::trekcore_legacy("star-trek-the-original-series", "tos", "Star Trek: The Original Series"),
        SeriesSource::trekcore_legacy("star-trek-the-next-generation", "tng", "Star Trek: The Next Generation"),
        SeriesSource::trekcore_legacy("star-trek-deep-space-nine", "ds9", "Star Trek: Deep Space Nine"),
        SeriesSource::trekcore_legacy("star-trek-voyager", "voy", "Star Trek: Voyager"),
        SeriesSource::trekcore_legacy("star-trek-enterprise", "ent", "Star Trek: Enterprise"),
    ]);
    series
}

/// Markup heuristics for galleries. These are data about the target sites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GalleryMarkers {
    /// Substring identifying a gallery index href.
    pub index_marker: String,
    /// Lowercase words that make a gallery link preferable.
    pub media_keywords: Vec<String>,
    /// Endpoints that link back into the gallery instead of to an image.
    pub self_reference_markers: Vec<String>,
    pub image_extensions: Vec<String>,
}

impl Default for GalleryMarkers {
    fn default() -> Self {
        Self {
            index_marker: "gallery/thumbnails.php".to_string(),
            media_keywords: vec![
                "screencap".to_string(),
                "photos".to_string(),
                "promotional".to_string(),
            ],
            self_reference_markers: vec![
                "thumbnails.php".to_string(),
                "displayimage.php".to_string(),
            ],
            image_extensions: vec![
                ".jpg".to_string(),
                ".jpeg".to_string(),
                ".png".to_string(),
                ".webp".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub max_items: usize,
    pub max_extra_pages: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            max_items: 20,
            max_extra_pages: 5,
        }
    }
}

/// Inclusive delay range in milliseconds. Equal bounds give a fixed delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const fn fixed(ms: u64) -> Self {
        Self { min_ms: ms, max_ms: ms }
    }

    pub const fn between(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.max_ms <= self.min_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(rng.gen_range(self.min_ms..=self.max_ms))
    }

    pub fn is_zero(&self) -> bool {
        self.max_ms == 0
    }

    /// Blocks the current thread for a delay drawn from the range.
    pub fn sleep<R: Rng + ?Sized>(&self, rng: &mut R) {
        if self.is_zero() {
            return;
        }
        std::thread::sleep(self.pick(rng));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pacing {
    /// After each processed episode.
    pub episode_delay: DelayRange,
    /// Before each extra gallery page.
    pub page_delay: DelayRange,
    /// After each series.
    pub series_delay: DelayRange,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            episode_delay: DelayRange::between(2_000, 4_000),
            page_delay: DelayRange::fixed(500),
            series_delay: DelayRange::fixed(2_000),
        }
    }
}

impl Pacing {
    pub fn none() -> Self {
        Self {
            episode_delay: DelayRange::fixed(0),
            page_delay: DelayRange::fixed(0),
            series_delay: DelayRange::fixed(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub page_timeout_secs: u64,
    pub extra_page_timeout_secs: u64,
    pub headers: Vec<(String, String)>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            page_timeout_secs: 30,
            extra_page_timeout_secs: 15,
            headers: vec![
                ("User-Agent".to_string(), DEFAULT_USER_AGENT.to_string()),
                (
                    "Accept".to_string(),
                    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8"
                        .to_string(),
                ),
                ("Accept-Language".to_string(), "en-US,en;q=0.5".to_string()),
            ],
        }
    }
}

impl TransportConfig {
    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }

    pub fn extra_page_timeout(&self) -> Duration {
        Duration::from_secs(self.extra_page_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogPaths {
    pub episodes: PathBuf,
    pub screencaps: PathBuf,
    pub retries: PathBuf,
}

impl Default for CatalogPaths {
    fn default() -> Self {
        Self {
            episodes: PathBuf::from("data/__episodes.json"),
            screencaps: PathBuf::from("data/__screencaps.json"),
            retries: PathBuf::from("data/__pending_retries.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    pub paths: CatalogPaths,
    pub series: Vec<SeriesSource>,
    pub markers: GalleryMarkers,
    pub sampling: SamplingConfig,
    pub pacing: Pacing,
    pub transport: TransportConfig,
    /// Listing titles starting with this are treated as placeholders.
    pub placeholder_title_prefix: String,
    pub force_update: bool,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            paths: CatalogPaths::default(),
            series: default_series(),
            markers: GalleryMarkers::default(),
            sampling: SamplingConfig::default(),
            pacing: Pacing::default(),
            transport: TransportConfig::default(),
            placeholder_title_prefix: "Episode".to_string(),
            force_update: false,
        }
    }
}

impl HarvestConfig {
    pub fn is_placeholder_title(&self, title: &str) -> bool {
        let title = title.trim();
        title.is_empty() || title.starts_with(self.placeholder_title_prefix.as_str())
    }

    pub fn validate(&self) -> Result<()> {
        if self.series.is_empty() {
            return Err(HarvestError::InvalidConfig("no series selected".to_string()));
        }
        if self.sampling.max_items == 0 {
            return Err(HarvestError::InvalidConfig(
                "sampling.max_items must be greater than zero".to_string(),
            ));
        }
        for (name, range) in [
            ("episode_delay", self.pacing.episode_delay),
            ("page_delay", self.pacing.page_delay),
            ("series_delay", self.pacing.series_delay),
        ] {
            if range.min_ms > range.max_ms {
                return Err(HarvestError::InvalidConfig(format!(
                    "pacing.{name}: min_ms {} exceeds max_ms {}",
                    range.min_ms, range.max_ms
                )));
            }
        }
        Ok(())
    }
}

/// Reads a JSON config file; a missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<HarvestConfig> {
    if !path.exists() {
        return Ok(HarvestConfig::default());
    }
    let bytes = std::fs::read(path).map_err(|e| HarvestError::io(path, e))?;
    serde_json::from_slice(&bytes).map_err(|e| {
        HarvestError::InvalidConfig(format!("failed to parse {}: {e}", path.to_string_lossy()))
    })
}

/// Layers command-line overrides on top of a loaded config.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    base: Option<HarvestConfig>,
    episodes: Option<PathBuf>,
    screencaps: Option<PathBuf>,
    retries: Option<PathBuf>,
    series_filter: Vec<String>,
    force_update: bool,
    pacing: Option<Pacing>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base(mut self, config: HarvestConfig) -> Self {
        self.base = Some(config);
        self
    }

    pub fn episodes_path<P: AsRef<Path>>(mut self, path: Option<P>) -> Self {
        self.episodes = path.map(|p| p.as_ref().to_path_buf());
        self
    }

    pub fn screencaps_path<P: AsRef<Path>>(mut self, path: Option<P>) -> Self {
        self.screencaps = path.map(|p| p.as_ref().to_path_buf());
        self
    }

    pub fn retries_path<P: AsRef<Path>>(mut self, path: Option<P>) -> Self {
        self.retries = path.map(|p| p.as_ref().to_path_buf());
        self
    }

    pub fn only_series(mut self, slugs: Vec<String>) -> Self {
        self.series_filter = slugs;
        self
    }

    pub fn force_update(mut self, force: bool) -> Self {
        self.force_update = force;
        self
    }

    pub fn pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = Some(pacing);
        self
    }

    pub fn build(self) -> Result<HarvestConfig> {
        let mut config = self.base.unwrap_or_default();

        if let Some(path) = self.episodes {
            config.paths.episodes = path;
        }
        if let Some(path) = self.screencaps {
            config.paths.screencaps = path;
        }
        if let Some(path) = self.retries {
            config.paths.retries = path;
        }
        if let Some(pacing) = self.pacing {
            config.pacing = pacing;
        }
        config.force_update |= self.force_update;

        if !self.series_filter.is_empty() {
            let unknown: Vec<&String> = self
                .series_filter
                .iter()
                .filter(|slug| !config.series.iter().any(|s| s.slug.as_str() == slug.as_str()))
                .collect();
            if !unknown.is_empty() {
                return Err(HarvestError::InvalidConfig(format!(
                    "unknown series: {unknown:?}"
                )));
            }
            config
                .series
                .retain(|s| self.series_filter.iter().any(|slug| slug == s.slug.as_str()));
        }

        config.validate()?;
        Ok(config)
    }
}
