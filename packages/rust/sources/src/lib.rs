//! Metadata source clients and per-venue abstract scrapers.
//!
//! This crate provides:
//! - [`catalog`] — Primary publication-catalog client (per-venue yearly listings)
//! - [`scholar`] — Secondary scholarly-metadata API client (abstracts, external IDs)
//! - [`venues`] — Per-venue page adapters that extract abstracts from paper pages

pub mod catalog;
pub mod scholar;
pub mod venues;

pub use catalog::CatalogClient;
pub use scholar::ScholarClient;
pub use venues::{AbstractFetcher, PaperPageInfo, VenueAdapter, adapter_for};
