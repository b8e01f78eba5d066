//! Seam between the reconciler and the account directory.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::account::{GroupRef, NewAccount, ObservedAccountState, UpdatePatch};

/// Operations the reconciler needs from an account directory.
#[async_trait]
pub trait DirectoryService: Send + Sync {
    /// Fetch the account with this primary email, or `None` if it does not exist.
    ///
    /// More than one match is an error ([`crate::error::SyncError::LookupAmbiguity`]).
    async fn lookup_by_email(&self, email: &str) -> Result<Option<ObservedAccountState>>;

    async fn create_account(&self, account: &NewAccount) -> Result<()>;

    /// Send a sparse update; only fields set on `patch` are touched.
    async fn update_account(&self, email: &str, patch: &UpdatePatch) -> Result<()>;

    async fn list_group_memberships(&self, email: &str) -> Result<Vec<GroupRef>>;

    async fn remove_from_group(&self, group: &GroupRef, email: &str) -> Result<()>;
}
