//! Drives a harvest run: listing page, then per episode the episode page,
//! the gallery entry and the sampled gallery pages, persisting each episode
//! as soon as it has media.

use crate::catalog::{Catalog, EpisodeRecord, EpisodeReferences, Identity};
use crate::config::{HarvestConfig, SeriesSource};
use crate::enumerator::{self, EpisodeLink};
use crate::gallery::GallerySampler;
use crate::locator;
use crate::markup::{Document, HtmlPage};
use crate::reconcile::{self, merge, relink};
use crate::retry::{PendingRetry, RetryQueue};
use crate::store::CatalogStore;
use crate::transport::Fetch;
use crate::Result;
use chrono::Local;
use rand::Rng;
use std::ops::AddAssign;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestReport {
    /// Episodes persisted with a fresh media list.
    pub written: usize,
    /// Episodes left alone because the catalog already had media for them.
    pub skipped_existing: usize,
    /// Listing entries whose label did not normalize.
    pub unrecognized: usize,
    /// Episodes without a gallery link or without extractable media.
    pub empty: usize,
    pub failed: Vec<PendingRetry>,
}

impl AddAssign for HarvestReport {
    fn add_assign(&mut self, other: Self) {
        self.written += other.written;
        self.skipped_existing += other.skipped_existing;
        self.unrecognized += other.unrecognized;
        self.empty += other.empty;
        self.failed.extend(other.failed);
    }
}

enum EpisodeOutcome {
    Written(usize),
    NoGallery,
    NoMedia,
}

pub struct Harvester<'a, F: Fetch, S: CatalogStore, R: Rng> {
    fetcher: &'a F,
    store: &'a S,
    config: &'a HarvestConfig,
    rng: R,
    catalog: Catalog,
    references: EpisodeReferences,
    retries: RetryQueue,
}

impl<'a, F: Fetch, S: CatalogStore, R: Rng> Harvester<'a, F, S, R> {
    /// Loads the current snapshots from the store. This is the only step
    /// that can fail; once running, failures are per episode.
    pub fn new(fetcher: &'a F, store: &'a S, config: &'a HarvestConfig, rng: R) -> Result<Self> {
        let catalog = store.load_catalog()?;
        let references = store.load_references()?;
        let retries = store.load_retries()?;

        reconcile::dangling_refs(&references, &catalog);
        info!(
            catalog = catalog.len(),
            references = references.episodes.len(),
            pending_retries = retries.len(),
            "catalog loaded"
        );

        Ok(Self {
            fetcher,
            store,
            config,
            rng,
            catalog,
            references,
            retries,
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn references(&self) -> &EpisodeReferences {
        &self.references
    }

    pub fn retries(&self) -> &RetryQueue {
        &self.retries
    }

    /// Harvests every configured series in order, pausing between series.
    pub fn run(&mut self) -> HarvestReport {
        let config = self.config;
        let mut total = HarvestReport::default();
        for (i, series) in config.series.iter().enumerate() {
            if i > 0 {
                config.pacing.series_delay.sleep(&mut self.rng);
            }
            total += self.harvest_series(series);
        }
        total
    }

    pub fn harvest_series(&mut self, series: &SeriesSource) -> HarvestReport {
        let mut report = HarvestReport::default();
        info!(series = %series.slug, name = %series.name, force = self.config.force_update, "harvesting series");

        let body = match self
            .fetcher
            .fetch_html(&series.episodes_url, self.config.transport.page_timeout())
        {
            Ok(body) => body,
            Err(err) => {
                warn!(series = %series.slug, url = %series.episodes_url, error = %err, "episode listing fetch failed");
                return report;
            }
        };

        let listing = enumerator::enumerate(&HtmlPage::parse(&body), series);
        for label in &listing.unrecognized {
            debug!(series = %series.slug, label = %label, "unrecognized episode label");
        }
        report.unrecognized = listing.unrecognized.len();

        let work = self.pending_first(series, listing.episodes);
        info!(series = %series.slug, episodes = work.len(), "episodes listed");

        for link in work {
            let identity = Identity::new(series.slug.clone(), link.code);

            if !self.config.force_update && self.catalog.has_media(&identity) {
                debug!(episode = %identity, "already harvested, skipping");
                self.drop_retry(&identity);
                report.skipped_existing += 1;
                continue;
            }

            match self.harvest_episode(series, &identity, &link) {
                Ok(EpisodeOutcome::Written(count)) => {
                    info!(episode = %identity, screencaps = count, "episode saved");
                    report.written += 1;
                }
                Ok(EpisodeOutcome::NoGallery) => {
                    info!(episode = %identity, url = %link.url, "no gallery link on episode page");
                    self.drop_retry(&identity);
                    report.empty += 1;
                }
                Ok(EpisodeOutcome::NoMedia) => {
                    info!(episode = %identity, "gallery yielded no screencaps");
                    self.drop_retry(&identity);
                    report.empty += 1;
                }
                Err(err) => {
                    warn!(
                        episode = %identity,
                        url = %link.url,
                        transient = err.is_transient(),
                        error = %err,
                        "episode failed, queued for retry"
                    );
                    let retry = PendingRetry {
                        series_slug: series.slug.clone(),
                        episode_number: link.code,
                        reason: err.to_string(),
                        url: Some(link.url.to_string()),
                        failed_at: Local::now().naive_local(),
                    };
                    self.retries.record(retry.clone());
                    self.save_retries();
                    report.failed.push(retry);
                }
            }

            self.config.pacing.episode_delay.sleep(&mut self.rng);
        }

        info!(
            series = %series.slug,
            written = report.written,
            skipped = report.skipped_existing,
            empty = report.empty,
            unrecognized = report.unrecognized,
            failed = report.failed.len(),
            "series done"
        );
        report
    }

    /// Moves episodes with a pending retry to the front, keeping listing
    /// order within both groups.
    fn pending_first(&self, series: &SeriesSource, episodes: Vec<EpisodeLink>) -> Vec<EpisodeLink> {
        if self.retries.for_series(&series.slug).next().is_none() {
            return episodes;
        }
        let (pending, rest): (Vec<_>, Vec<_>) = episodes.into_iter().partition(|link| {
            self.retries
                .contains(&Identity::new(series.slug.clone(), link.code))
        });
        if !pending.is_empty() {
            info!(series = %series.slug, retries = pending.len(), "retrying previously failed episodes first");
        }
        pending.into_iter().chain(rest).collect()
    }

    fn harvest_episode(
        &mut self,
        series: &SeriesSource,
        identity: &Identity,
        link: &EpisodeLink,
    ) -> Result<EpisodeOutcome> {
        let config = self.config;
        let title = self.resolve_title(identity, &link.title);
        info!(episode = %identity, title = %title, "processing episode");

        let body = self
            .fetcher
            .fetch_html(&link.url, config.transport.page_timeout())?;
        let links = HtmlPage::parse(&body).links();

        let Some(gallery_url) = locator::locate(&links, &series.base_url, &config.markers) else {
            return Ok(EpisodeOutcome::NoGallery);
        };
        debug!(episode = %identity, gallery = %gallery_url, "gallery located");

        let sampler = GallerySampler::new(
            self.fetcher,
            &config.markers,
            &config.transport,
            config.sampling,
            config.pacing.page_delay,
        );
        let screencaps = sampler.try_sample(&gallery_url, &mut self.rng)?;
        if screencaps.is_empty() {
            return Ok(EpisodeOutcome::NoMedia);
        }

        let record = EpisodeRecord {
            series_slug: series.slug.clone(),
            episode_number: link.code,
            episode_title: title,
            screencaps: screencaps.into_iter().map(String::from).collect(),
            source: series.source,
            scraped_at: Local::now().naive_local(),
        };
        let count = record.screencaps.len();
        self.persist(record)?;
        Ok(EpisodeOutcome::Written(count))
    }

    fn resolve_title(&self, identity: &Identity, listed: &str) -> String {
        let listed = listed.trim();
        if !self.config.is_placeholder_title(listed) {
            return listed.to_string();
        }
        match self
            .references
            .better_title(identity, |t| self.config.is_placeholder_title(t))
        {
            Some(better) => {
                debug!(episode = %identity, from = %listed, to = %better, "title replaced");
                better.to_string()
            }
            None => listed.to_string(),
        }
    }

    /// Merges one record, relinks the references and writes both files
    /// before the next episode starts.
    fn persist(&mut self, record: EpisodeRecord) -> Result<()> {
        let identity = record.identity();

        self.catalog = merge(std::mem::take(&mut self.catalog), [record]);
        self.store.save_catalog(&self.catalog)?;

        let (references, touched) = relink(std::mem::take(&mut self.references), &self.catalog);
        self.references = references;
        if touched > 0 {
            self.store.save_references(&self.references)?;
        }
        debug!(episode = %identity, catalog = self.catalog.len(), touched, "catalog persisted");

        self.drop_retry(&identity);
        Ok(())
    }

    /// A fetch that went through, with or without media, settles the retry.
    fn drop_retry(&mut self, identity: &Identity) {
        if self.retries.resolve(identity) {
            debug!(episode = %identity, "pending retry resolved");
            self.save_retries();
        }
    }

    fn save_retries(&self) {
        if let Err(err) = self.store.save_retries(&self.retries) {
            warn!(error = %err, "could not write pending retries");
        }
    }
}

/// Rebuilds the `gallery` references from the stored catalog without any
/// network access. Returns the number of entries that gained a reference.
pub fn relink_store<S: CatalogStore>(store: &S) -> Result<usize> {
    let catalog = store.load_catalog()?;
    let references = store.load_references()?;
    reconcile::dangling_refs(&references, &catalog);

    let (references, touched) = relink(references, &catalog);
    if touched > 0 {
        store.save_references(&references)?;
    }
    info!(touched, catalog = catalog.len(), "references relinked");
    Ok(touched)
}
