// End-to-end runs of the harvester against a scripted site

mod common;

use common::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use screencap_harvester::harvest::{Harvester, relink_store};
use screencap_harvester::retry::RetryQueue;
use screencap_harvester::store::MemoryStore;
use screencap_harvester::{Catalog, EpisodeReferences, Identity, SeriesKey};
use std::collections::HashSet;

fn identity(code: &str) -> Identity {
    Identity::new(SeriesKey::new(SLUG), code.parse().unwrap())
}

fn store_with(catalog: Catalog) -> MemoryStore {
    MemoryStore::new(catalog, references(), RetryQueue::default())
}

#[test]
fn test_present_episode_is_skipped_and_absent_one_harvested() {
    let existing = Catalog::from_records(vec![record(
        "S1E01",
        &["https://ent.trekcore.com/gallery/albums/ent/1x01/bb_001.jpg"],
    )]);
    let store = store_with(existing);
    let fetcher = ScriptedFetcher::new()
        .page(LISTING, listing(&[("1x01", "Broken Bow"), ("1x02", "Fight or Flight")]))
        .page(&episode_url("1x02"), episode_page_with_gallery())
        .page(GALLERY, gallery_page(1, 3, Some((3, 1))));
    let config = config();

    let mut harvester = Harvester::new(&fetcher, &store, &config, StdRng::seed_from_u64(1)).unwrap();
    let report = harvester.run();

    assert_eq!(
        fetcher.requests(),
        vec![LISTING.to_string(), episode_url("1x02"), GALLERY.to_string()]
    );
    assert_eq!(fetcher.requested(&episode_url("1x01")), 0);
    assert_eq!(report.written, 1);
    assert_eq!(report.skipped_existing, 1);
    assert!(report.failed.is_empty());

    let catalog = store.catalog.borrow();
    assert_eq!(catalog.len(), 2);
    assert_eq!(catalog.position(&identity("S1E02")), Some(1));
    let harvested = catalog.get(&identity("S1E02")).unwrap();
    assert_eq!(harvested.episode_title, "Fight or Flight");
    assert_eq!(
        harvested.screencaps,
        vec![
            "https://ent.trekcore.com/gallery/albums/ent/1x02/fof_01_000.jpg",
            "https://ent.trekcore.com/gallery/albums/ent/1x02/fof_01_001.jpg",
            "https://ent.trekcore.com/gallery/albums/ent/1x02/fof_01_002.jpg",
        ]
    );
    assert_eq!(*store.catalog_writes.borrow(), 1);

    let refs = store.references.borrow();
    assert_eq!(refs.episodes[0].gallery_refs, Some(vec![0]));
    assert_eq!(refs.episodes[1].gallery_refs, Some(vec![1]));
    assert_eq!(harvester.references(), &*refs);
}

#[test]
fn test_large_gallery_reads_five_random_extra_pages() {
    let mut fetcher = ScriptedFetcher::new()
        .page(LISTING, listing(&[("1x02", "Fight or Flight")]))
        .page(&episode_url("1x02"), episode_page_with_gallery())
        .page(GALLERY, gallery_page(1, 24, Some((738, 31))));
    for page in 2..=31 {
        fetcher = fetcher.page(&gallery_page_url(page), gallery_page(page, 24, None));
    }
    let store = store_with(Catalog::new());
    let config = config();

    let mut harvester = Harvester::new(&fetcher, &store, &config, StdRng::seed_from_u64(31)).unwrap();
    harvester.run();

    let requests = fetcher.requests();
    assert_eq!(requests.len(), 3 + 5);
    let extra: Vec<usize> = requests[3..]
        .iter()
        .map(|u| u.rsplit("page=").next().unwrap().parse().unwrap())
        .collect();
    assert!(extra.windows(2).all(|w| w[0] < w[1]));
    assert!(extra.iter().all(|p| (2..=31).contains(p)));

    let record = store.catalog.borrow().get(&identity("S1E02")).cloned().unwrap();
    assert_eq!(record.screencaps.len(), 20);
    let unique: HashSet<&String> = record.screencaps.iter().collect();
    assert_eq!(unique.len(), 20);
}

#[test]
fn test_single_page_gallery_reads_only_the_index() {
    let fetcher = ScriptedFetcher::new()
        .page(LISTING, listing(&[("1x02", "Fight or Flight")]))
        .page(&episode_url("1x02"), episode_page_with_gallery())
        .page(GALLERY, gallery_page(1, 5, None));
    let store = store_with(Catalog::new());
    let config = config();

    Harvester::new(&fetcher, &store, &config, StdRng::seed_from_u64(2))
        .unwrap()
        .run();

    assert!(fetcher.requests().iter().all(|u| !u.contains("page=")));
    assert_eq!(store.catalog.borrow().records()[0].screencaps.len(), 5);
}

#[test]
fn test_failed_extra_page_is_skipped() {
    let fetcher = ScriptedFetcher::new()
        .page(LISTING, listing(&[("1x02", "Fight or Flight")]))
        .page(&episode_url("1x02"), episode_page_with_gallery())
        .page(GALLERY, gallery_page(1, 2, Some((6, 3))))
        .status(&gallery_page_url(2), 503)
        .page(&gallery_page_url(3), gallery_page(3, 2, None));
    let store = store_with(Catalog::new());
    let config = config();

    let report = Harvester::new(&fetcher, &store, &config, StdRng::seed_from_u64(3))
        .unwrap()
        .run();

    assert_eq!(report.written, 1);
    assert!(report.failed.is_empty());
    let catalog = store.catalog.borrow();
    let shots = &catalog.records()[0].screencaps;
    assert_eq!(shots.len(), 4);
    assert!(shots.iter().all(|u| !u.contains("fof_02_")));
    assert!(shots.iter().any(|u| u.contains("fof_03_")));
}

#[test]
fn test_episode_without_media_is_not_persisted() {
    let fetcher = ScriptedFetcher::new()
        .page(LISTING, listing(&[("1x01", "Broken Bow"), ("1x02", "Fight or Flight")]))
        .page(&episode_url("1x01"), "<html><body><p>Coming soon</p></body></html>")
        .page(&episode_url("1x02"), episode_page_with_gallery())
        .page(GALLERY, "<html><body><p>0 files on 1 page(s)</p></body></html>");
    let store = store_with(Catalog::new());
    let config = config();

    let report = Harvester::new(&fetcher, &store, &config, StdRng::seed_from_u64(4))
        .unwrap()
        .run();

    assert_eq!(report.empty, 2);
    assert_eq!(report.written, 0);
    assert!(store.catalog.borrow().is_empty());
    assert_eq!(*store.catalog_writes.borrow(), 0);
    assert!(store.references.borrow().episodes.iter().all(|e| e.gallery_refs.is_none()));
}

#[test]
fn test_failed_episode_is_retried_first_on_next_run() {
    let first_run = ScriptedFetcher::new()
        .page(LISTING, listing(&[("1x01", "Broken Bow"), ("1x02", "Fight or Flight")]))
        .page(&episode_url("1x01"), "<html><body></body></html>")
        .status(&episode_url("1x02"), 500);
    let store = store_with(Catalog::new());
    let config = config();

    let report = Harvester::new(&first_run, &store, &config, StdRng::seed_from_u64(5))
        .unwrap()
        .run();
    assert_eq!(report.failed.len(), 1);
    assert!(store.retries.borrow().contains(&identity("S1E02")));

    let second_run = ScriptedFetcher::new()
        .page(LISTING, listing(&[("1x01", "Broken Bow"), ("1x02", "Fight or Flight")]))
        .page(&episode_url("1x01"), "<html><body></body></html>")
        .page(&episode_url("1x02"), episode_page_with_gallery())
        .page(GALLERY, gallery_page(1, 2, None));

    let mut harvester = Harvester::new(&second_run, &store, &config, StdRng::seed_from_u64(6)).unwrap();
    let report = harvester.run();

    assert_eq!(
        second_run.requests(),
        vec![
            LISTING.to_string(),
            episode_url("1x02"),
            GALLERY.to_string(),
            episode_url("1x01"),
        ]
    );
    assert_eq!(report.written, 1);
    assert!(harvester.retries().is_empty());
    assert!(store.retries.borrow().is_empty());
}

#[test]
fn test_gallery_index_failure_is_queued_for_retry() {
    let fetcher = ScriptedFetcher::new()
        .page(LISTING, listing(&[("1x02", "Fight or Flight")]))
        .page(&episode_url("1x02"), episode_page_with_gallery())
        .status(GALLERY, 503);
    let store = store_with(Catalog::new());
    let config = config();

    let report = Harvester::new(&fetcher, &store, &config, StdRng::seed_from_u64(10))
        .unwrap()
        .run();

    assert_eq!(
        fetcher.requests(),
        vec![LISTING.to_string(), episode_url("1x02"), GALLERY.to_string()]
    );
    assert_eq!(report.empty, 0);
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].reason.contains("503"));
    assert!(store.retries.borrow().contains(&identity("S1E02")));
    assert!(store.catalog.borrow().is_empty());
}

#[test]
fn test_retry_is_dropped_when_episode_turns_out_empty() {
    let store = store_with(Catalog::new());
    let config = config();
    let failing = ScriptedFetcher::new()
        .page(LISTING, listing(&[("1x02", "Fight or Flight")]))
        .status(&episode_url("1x02"), 500);
    Harvester::new(&failing, &store, &config, StdRng::seed_from_u64(16))
        .unwrap()
        .run();
    assert!(store.retries.borrow().contains(&identity("S1E02")));

    let no_gallery = ScriptedFetcher::new()
        .page(LISTING, listing(&[("1x02", "Fight or Flight")]))
        .page(&episode_url("1x02"), "<html><body><p>Screencaps coming soon</p></body></html>");
    let report = Harvester::new(&no_gallery, &store, &config, StdRng::seed_from_u64(17))
        .unwrap()
        .run();

    assert_eq!(report.empty, 1);
    assert!(report.failed.is_empty());
    assert!(store.retries.borrow().is_empty());
}

#[test]
fn test_force_update_replaces_existing_record_in_place() {
    let existing = Catalog::from_records(vec![record(
        "S1E02",
        &["https://ent.trekcore.com/gallery/albums/ent/1x02/old.jpg"],
    )]);
    let store = store_with(existing);
    let fetcher = ScriptedFetcher::new()
        .page(LISTING, listing(&[("1x02", "Fight or Flight")]))
        .page(&episode_url("1x02"), episode_page_with_gallery())
        .page(GALLERY, gallery_page(1, 2, None));
    let mut config = config();
    config.force_update = true;

    Harvester::new(&fetcher, &store, &config, StdRng::seed_from_u64(7))
        .unwrap()
        .run();

    let catalog = store.catalog.borrow();
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog.position(&identity("S1E02")), Some(0));
    assert!(catalog.records()[0].screencaps.iter().all(|u| !u.ends_with("old.jpg")));
    assert_eq!(store.references.borrow().episodes[1].gallery_refs, Some(vec![0]));
}

#[test]
fn test_placeholder_title_comes_from_references() {
    let fetcher = ScriptedFetcher::new()
        .page(LISTING, listing(&[("1x02", "Episode 102")]))
        .page(&episode_url("1x02"), episode_page_with_gallery())
        .page(GALLERY, gallery_page(1, 1, None));
    let store = store_with(Catalog::new());
    let config = config();

    Harvester::new(&fetcher, &store, &config, StdRng::seed_from_u64(8))
        .unwrap()
        .run();

    assert_eq!(store.catalog.borrow().records()[0].episode_title, "Fight or Flight");
}

#[test]
fn test_listing_failure_ends_series_quietly() {
    let fetcher = ScriptedFetcher::new().status(LISTING, 502);
    let store = store_with(Catalog::new());
    let config = config();

    let report = Harvester::new(&fetcher, &store, &config, StdRng::seed_from_u64(9))
        .unwrap()
        .run();

    assert_eq!(fetcher.requests(), vec![LISTING.to_string()]);
    assert_eq!(report.written + report.empty + report.failed.len(), 0);
}

#[test]
fn test_relink_store_links_without_fetching() {
    let catalog = Catalog::from_records(vec![
        record("S1E02", &["https://ent.trekcore.com/a.jpg"]),
        record("S1E01", &["https://ent.trekcore.com/b.jpg"]),
    ]);
    let store = store_with(catalog);

    assert_eq!(relink_store(&store).unwrap(), 2);
    assert_eq!(relink_store(&store).unwrap(), 0);

    let refs: EpisodeReferences = store.references.borrow().clone();
    assert_eq!(refs.episodes[0].gallery_refs, Some(vec![1]));
    assert_eq!(refs.episodes[1].gallery_refs, Some(vec![0]));
}
