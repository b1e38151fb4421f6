//! Filterable viewer for comma-delimited text.
//!
//! The core is [`csv::parse_delimited_text`], [`filter::filter_rows`] and
//! [`filter::limit_rows`]: pure, total functions with no I/O. The remaining
//! modules load the source on a worker thread and drive a terminal UI.

pub mod app;
pub mod csv;
pub mod debounce;
pub mod filter;
pub mod loader;
pub mod ui;
