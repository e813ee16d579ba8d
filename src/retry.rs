use crate::catalog::{Identity, SeriesKey};
use crate::episode_code::EpisodeCode;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// An episode whose harvest failed and should be attempted first next run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRetry {
    pub series_slug: SeriesKey,
    pub episode_number: EpisodeCode,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub failed_at: NaiveDateTime,
}

impl PendingRetry {
    pub fn identity(&self) -> Identity {
        Identity::new(self.series_slug.clone(), self.episode_number)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryQueue {
    #[serde(default)]
    pub pending: Vec<PendingRetry>,
}

impl RetryQueue {
    pub fn contains(&self, identity: &Identity) -> bool {
        self.pending.iter().any(|p| &p.identity() == identity)
    }

    /// Records a failure; a newer failure for the same identity replaces the
    /// older entry.
    pub fn record(&mut self, retry: PendingRetry) {
        let identity = retry.identity();
        match self.pending.iter_mut().find(|p| p.identity() == identity) {
            Some(existing) => *existing = retry,
            None => self.pending.push(retry),
        }
    }

    /// Returns true when an entry was removed.
    pub fn resolve(&mut self, identity: &Identity) -> bool {
        let before = self.pending.len();
        self.pending.retain(|p| &p.identity() != identity);
        self.pending.len() != before
    }

    pub fn for_series<'a>(&'a self, series: &'a SeriesKey) -> impl Iterator<Item = &'a PendingRetry> + 'a {
        self.pending.iter().filter(move |p| &p.series_slug == series)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
