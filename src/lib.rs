pub mod catalog;
pub mod config;
pub mod enumerator;
pub mod episode_code;
mod error;
pub mod gallery;
pub mod harvest;
pub mod locator;
pub mod logging;
pub mod markup;
pub mod reconcile;
pub mod retry;
pub mod store;
pub mod transport;

pub use catalog::{Catalog, EpisodeRecord, EpisodeReference, EpisodeReferences, Identity, SeriesKey, SourceTag};
pub use episode_code::EpisodeCode;
pub use error::{HarvestError, Result};
