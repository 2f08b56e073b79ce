//! Harvest orchestration for mdharvest.
//!
//! This crate ties together fetching, Markdown conversion, file writing, and
//! the per-domain ledgers into the end-to-end [`pipeline::harvest`] run.

pub mod converter;
pub mod input;
pub mod pipeline;
pub mod writer;

pub use converter::Converter;
pub use input::read_urls_from_csv;
pub use pipeline::{HarvestSummary, ProgressReporter, SilentProgress, harvest};
pub use writer::MarkdownWriter;
