//! Studentsync Core: enrollment records to directory accounts.
//!
//! Derives the account each student should have, diffs it against what the
//! directory holds, and drives the resulting actions.

pub mod config;
pub mod directory;
pub mod error;
pub mod models;
pub mod reconcile;
pub mod source;
pub mod sync;
