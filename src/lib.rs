//! maidkit: dataset tooling for maid-style persona fine-tuning.
//!
//! Validates chat datasets (JSON Lines or a top-level JSON array of
//! `{"messages": [...]}` records) and expands small seed sets into
//! category-tagged training files.
//!
//! - **Loader** (`data`): memory-mapped read, container detection, lazy
//!   fail-fast record iteration.
//! - **Validator** (`validator`, `stats`): schema check, canonical-form
//!   duplicate accounting, text length summary.
//! - **Builder** (`builder`): keyword category tagging, style marking,
//!   round-robin padding.

pub mod builder;
pub mod data;
pub mod error;
pub mod stats;
pub mod validator;

pub use data::{Container, Dataset};
pub use error::{DatasetError, Result, Unit};
pub use validator::{validate, Summary, Validator};
