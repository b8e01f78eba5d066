//! Studentsync Google: Google Workspace backend for the account directory.
//!
//! Looks up, creates, and updates student accounts through the Admin SDK
//! Directory API and removes suspended students from their groups.

pub mod auth;
pub mod client;
pub mod directory;
pub mod models;
mod retry;

pub use directory::GoogleDirectory;
