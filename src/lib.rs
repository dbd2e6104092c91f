//! Core library for the lakehouse-kb command line application.
//!
//! The crate keeps the team's LakeHouse and Report inventory in sync between
//! a shared remote spreadsheet and a local workbook. Backends live under
//! [`io`] behind the [`source::TableSource`] and [`source::TableSink`]
//! traits, the table representation inside [`model`], cached reads in
//! [`loader`], remote-first writes with local fallback in [`writer`], pure
//! projections in [`views`], and the per-session orchestration in [`sync`].

pub mod config;
pub mod error;
pub mod io;
pub mod loader;
pub mod model;
pub mod source;
pub mod sync;
pub mod views;
pub mod writer;

pub use error::{KbError, Result};
