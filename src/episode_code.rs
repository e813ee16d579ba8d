use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

static SEASON_X_EPISODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)x(\d+)").unwrap());
static EPISODE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)episode\s*(\d+)").unwrap());
static NUMBERED_PAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/(\d+)\.html?$").unwrap());
static CANONICAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^S(\d+)E(\d{2,})$").unwrap());

/// Canonical episode identifier, rendered as `S<season>E<episode:02>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EpisodeCode {
    pub season: u32,
    pub episode: u32,
}

impl EpisodeCode {
    pub fn new(season: u32, episode: u32) -> Self {
        Self { season, episode }
    }

    /// Normalizes a free-form episode label.
    ///
    /// Recognized forms, first match wins:
    /// 1. `<season>x<episode>` anywhere in the text ("1x03", "Season 2 - 2x11")
    /// 2. `Episode NNN` with exactly three digits: first digit is the season,
    ///    the remaining two are the episode ("Episode 103"). The first such
    ///    mention in the label wins.
    ///
    /// Anything else, including four-digit legacy numbers whose season width
    /// is ambiguous, yields `None`.
    pub fn normalize(raw: &str) -> Option<Self> {
        if let Some(captures) = SEASON_X_EPISODE.captures(raw) {
            let season = captures[1].parse().ok()?;
            let episode = captures[2].parse().ok()?;
            return Some(Self::new(season, episode));
        }

        EPISODE_NUMBER
            .captures_iter(raw)
            .find_map(|captures| Self::from_legacy_number(&captures[1]))
    }

    /// Derives the identifier from an episode page URL path such as
    /// `season1/1x02/` or `season1/102.html`.
    pub fn from_url_path(path: &str) -> Option<Self> {
        if let Some(captures) = SEASON_X_EPISODE.captures(path) {
            let season = captures[1].parse().ok()?;
            let episode = captures[2].parse().ok()?;
            return Some(Self::new(season, episode));
        }

        let captures = NUMBERED_PAGE.captures(path)?;
        Self::from_legacy_number(&captures[1])
    }

    fn from_legacy_number(digits: &str) -> Option<Self> {
        if digits.len() != 3 {
            return None;
        }
        let season = digits[..1].parse().ok()?;
        let episode = digits[1..].parse().ok()?;
        Some(Self::new(season, episode))
    }
}

impl fmt::Display for EpisodeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}E{:02}", self.season, self.episode)
    }
}

impl FromStr for EpisodeCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let captures = CANONICAL
            .captures(s.trim())
            .ok_or_else(|| format!("not a canonical episode code: {s:?}"))?;
        let season = captures[1]
            .parse()
            .map_err(|e| format!("bad season in {s:?}: {e}"))?;
        let episode = captures[2]
            .parse()
            .map_err(|e| format!("bad episode in {s:?}: {e}"))?;
        Ok(Self::new(season, episode))
    }
}

impl TryFrom<String> for EpisodeCode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EpisodeCode> for String {
    fn from(code: EpisodeCode) -> Self {
        code.to_string()
    }
}
