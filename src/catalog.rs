use crate::episode_code::EpisodeCode;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

/// Externally assigned series slug, e.g. `star-trek-voyager`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeriesKey(String);

impl SeriesKey {
    pub fn new(slug: impl Into<String>) -> Self {
        Self(slug.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Catalog key: one episode of one series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity {
    pub series: SeriesKey,
    pub code: EpisodeCode,
}

impl Identity {
    pub fn new(series: SeriesKey, code: EpisodeCode) -> Self {
        Self { series, code }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.series, self.code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceTag {
    #[serde(rename = "trekcore")]
    Primary,
    #[serde(rename = "trekcore_legacy")]
    Legacy,
    #[serde(rename = "aws_s3")]
    ObjectStore,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeRecord {
    pub series_slug: SeriesKey,
    pub episode_number: EpisodeCode,
    pub episode_title: String,
    pub screencaps: Vec<String>,
    pub source: SourceTag,
    pub scraped_at: NaiveDateTime,
}

impl EpisodeRecord {
    pub fn identity(&self) -> Identity {
        Identity::new(self.series_slug.clone(), self.episode_number)
    }

    pub fn has_media(&self) -> bool {
        !self.screencaps.is_empty()
    }
}

/// Harvested records keyed by [`Identity`].
///
/// Records keep their position for their whole life: replacing a record
/// leaves it where it was, new records go to the end. Episode references
/// point into the catalog by position, so this keeps them valid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    records: Vec<EpisodeRecord>,
    index: HashMap<Identity, usize>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog from persisted records. Later duplicates of an
    /// identity replace earlier ones in place.
    pub fn from_records(records: Vec<EpisodeRecord>) -> Self {
        let mut catalog = Self::new();
        for record in records {
            catalog.upsert(record);
        }
        catalog
    }

    /// Inserts or replaces, returning the record's position.
    pub fn upsert(&mut self, record: EpisodeRecord) -> usize {
        let identity = record.identity();
        match self.index.get(&identity) {
            Some(&position) => {
                self.records[position] = record;
                position
            }
            None => {
                let position = self.records.len();
                self.records.push(record);
                self.index.insert(identity, position);
                position
            }
        }
    }

    pub fn get(&self, identity: &Identity) -> Option<&EpisodeRecord> {
        self.position(identity).map(|p| &self.records[p])
    }

    pub fn position(&self, identity: &Identity) -> Option<usize> {
        self.index.get(identity).copied()
    }

    /// True when the catalog already holds media for this identity.
    pub fn has_media(&self, identity: &Identity) -> bool {
        self.get(identity).is_some_and(EpisodeRecord::has_media)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[EpisodeRecord] {
        &self.records
    }
}

/// An entry of the episode-reference catalog maintained outside this tool.
/// Only the fields the pipeline reads or writes are typed; everything else
/// round-trips untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeReference {
    #[serde(rename = "seriesSlug", default, skip_serializing_if = "Option::is_none")]
    pub series_slug: Option<SeriesKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Positions into the screencaps catalog.
    #[serde(rename = "gallery", default, skip_serializing_if = "Option::is_none")]
    pub gallery_refs: Option<Vec<usize>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EpisodeReference {
    pub fn new(series: &str, number: &str, title: &str) -> Self {
        Self {
            series_slug: Some(SeriesKey::new(series)),
            number: Some(number.to_string()),
            title: Some(title.to_string()),
            gallery_refs: None,
            extra: Map::new(),
        }
    }

    /// None when the entry lacks a series or a canonical episode number.
    pub fn identity(&self) -> Option<Identity> {
        let series = self.series_slug.clone()?;
        let code = self.number.as_deref()?.parse().ok()?;
        Some(Identity::new(series, code))
    }
}

/// Whole episode-reference file: `{"episodes": [...], ...}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EpisodeReferences {
    #[serde(default)]
    pub episodes: Vec<EpisodeReference>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EpisodeReferences {
    /// Title from the reference catalog for this identity, unless it is
    /// itself empty or a placeholder.
    pub fn better_title(&self, identity: &Identity, is_placeholder: impl Fn(&str) -> bool) -> Option<&str> {
        self.episodes
            .iter()
            .find(|entry| entry.identity().as_ref() == Some(identity))
            .and_then(|entry| entry.title.as_deref())
            .filter(|title| !is_placeholder(*title))
    }
}
