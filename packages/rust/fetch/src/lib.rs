//! HTTP fetching for article pages.
//!
//! This crate provides:
//! - [`Fetcher`] — a configured `reqwest` client shared across concurrent fetches
//! - [`FetchOutcome`] — page / rate-limited classification of a response

pub mod fetcher;

pub use fetcher::{FetchOutcome, FetchedPage, Fetcher};
