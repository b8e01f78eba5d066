//! [`DirectoryService`] backed by Google Workspace.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use studentsync_core::config::{CustomAttributeConfig, SyncConfig};
use studentsync_core::directory::DirectoryService;
use studentsync_core::error::{Result, SyncError};
use studentsync_core::models::account::{
    CustomAttributes, GroupRef, NewAccount, ObservedAccountState, UpdatePatch,
};

use crate::auth::GoogleAuth;
use crate::client::GoogleAdminClient;
use crate::models::{
    schema_int, CustomSchemas, GoogleNameUpdate, GoogleUser, GoogleUserName, GoogleUserUpdate,
};

/// Student accounts in a Google Workspace tenant.
pub struct GoogleDirectory {
    client: GoogleAdminClient,
    attributes: CustomAttributeConfig,
}

impl GoogleDirectory {
    pub fn new(client: GoogleAdminClient, attributes: CustomAttributeConfig) -> Self {
        Self { client, attributes }
    }

    /// Build a directory from the loaded configuration.
    ///
    /// A literal access token wins over the token file.
    pub fn from_config(config: &SyncConfig) -> Result<Self> {
        let auth = match (&config.google.access_token, &config.google.token_path) {
            (Some(token), _) => GoogleAuth::new(token.clone()),
            (None, Some(path)) => GoogleAuth::from_token_file(Path::new(path))?,
            (None, None) => {
                return Err(SyncError::Config(
                    "no Google access token or token file configured".into(),
                ))
            }
        };

        let mut client =
            GoogleAdminClient::new(auth, &config.google.customer_id, config.search_domain())
                .with_retry(config.sync.retry.clone());
        if let Some(base) = &config.google.api_base {
            client = client.with_base_url(base);
        }
        Ok(Self::new(client, config.district.custom_attributes.clone()))
    }

    fn schemas_for(&self, attrs: CustomAttributes) -> CustomSchemas {
        let fields = HashMap::from([
            (
                self.attributes.homeschool_field.clone(),
                Value::from(attrs.homeschool_id),
            ),
            (
                self.attributes.graduation_year_field.clone(),
                Value::from(attrs.graduation_year),
            ),
        ]);
        HashMap::from([(self.attributes.category.clone(), fields)])
    }

    fn observed_from(&self, user: GoogleUser) -> ObservedAccountState {
        let schemas = user.custom_schemas.as_ref();
        let category = &self.attributes.category;
        let homeschool = schema_int(schemas, category, &self.attributes.homeschool_field);
        let graduation = schema_int(schemas, category, &self.attributes.graduation_year_field)
            .and_then(|y| i32::try_from(y).ok());
        let custom_attributes = match (homeschool, graduation) {
            (Some(homeschool_id), Some(graduation_year)) => Some(CustomAttributes {
                homeschool_id,
                graduation_year,
            }),
            _ => None,
        };

        ObservedAccountState {
            email: user.primary_email,
            suspended: user.suspended.unwrap_or(false),
            org_unit_path: user.org_unit_path.unwrap_or_else(|| "/".into()),
            given_name: user.name.given_name,
            family_name: user.name.family_name,
            custom_attributes,
            groups: Vec::new(),
        }
    }
}

#[async_trait]
impl DirectoryService for GoogleDirectory {
    async fn lookup_by_email(&self, email: &str) -> Result<Option<ObservedAccountState>> {
        let list = self.client.find_users_by_email(email).await?;
        let mut users = list.users.unwrap_or_default();
        match users.len() {
            0 => Ok(None),
            1 => Ok(users.pop().map(|u| self.observed_from(u))),
            matches => Err(SyncError::LookupAmbiguity {
                email: email.to_string(),
                matches,
            }),
        }
    }

    async fn create_account(&self, account: &NewAccount) -> Result<()> {
        let user = GoogleUser {
            primary_email: account.email.clone(),
            name: GoogleUserName {
                given_name: account.given_name.clone(),
                family_name: account.family_name.clone(),
            },
            suspended: None,
            org_unit_path: Some(account.org_unit_path.clone()),
            id: None,
            password: Some(account.password.clone()),
            change_password_at_next_login: Some(account.change_password_at_next_login),
            custom_schemas: Some(self.schemas_for(account.custom_attributes)),
        };
        let created = self.client.insert_user(&user).await?;
        debug!(email = %created.primary_email, id = ?created.id, "account created");
        Ok(())
    }

    async fn update_account(&self, email: &str, patch: &UpdatePatch) -> Result<()> {
        let name = (patch.given_name.is_some() || patch.family_name.is_some()).then(|| {
            GoogleNameUpdate {
                given_name: patch.given_name.clone(),
                family_name: patch.family_name.clone(),
            }
        });
        let update = GoogleUserUpdate {
            suspended: patch.suspended,
            org_unit_path: patch.org_unit_path.clone(),
            name,
            custom_schemas: patch.custom_attributes.map(|a| self.schemas_for(a)),
        };
        self.client.update_user(email, &update).await
    }

    async fn list_group_memberships(&self, email: &str) -> Result<Vec<GroupRef>> {
        let mut groups = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = self
                .client
                .list_groups(email, page_token.as_deref())
                .await?;
            groups.extend(page.groups.unwrap_or_default().into_iter().map(|g| GroupRef {
                email: g.email,
                name: g.name,
            }));
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        Ok(groups)
    }

    async fn remove_from_group(&self, group: &GroupRef, email: &str) -> Result<()> {
        self.client.delete_member(&group.email, email).await
    }
}
