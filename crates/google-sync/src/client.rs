//! Typed reqwest wrapper for Google Admin Directory API.

use reqwest::Response;
use studentsync_core::config::RetryConfig;
use studentsync_core::error::{Result, SyncError};

use crate::auth::GoogleAuth;
use crate::models::{GoogleApiErrorBody, GoogleGroupList, GoogleUser, GoogleUserList, GoogleUserUpdate};
use crate::retry::send_with_retry;

const GOOGLE_ADMIN_API_BASE: &str = "https://admin.googleapis.com";

/// HTTP client for Google Admin Directory API operations.
pub struct GoogleAdminClient {
    http: reqwest::Client,
    base_url: String,
    auth: GoogleAuth,
    customer_id: String,
    domain: String,
    retry: RetryConfig,
}

impl GoogleAdminClient {
    /// Create a new client for `domain` with the given auth and customer ID.
    pub fn new(auth: GoogleAuth, customer_id: &str, domain: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: GOOGLE_ADMIN_API_BASE.to_string(),
            auth,
            customer_id: customer_id.to_string(),
            domain: domain.to_string(),
            retry: RetryConfig::default(),
        }
    }

    /// Override the base URL (for testing with wiremock).
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn users_url(&self) -> String {
        format!("{}/admin/directory/v1/users", self.base_url)
    }

    fn user_url(&self, email: &str) -> String {
        format!("{}/admin/directory/v1/users/{}", self.base_url, email)
    }

    fn groups_url(&self) -> String {
        format!("{}/admin/directory/v1/groups", self.base_url)
    }

    fn member_url(&self, group: &str, member: &str) -> String {
        format!(
            "{}/admin/directory/v1/groups/{}/members/{}",
            self.base_url, group, member
        )
    }

    /// Search for users whose primary email is exactly `email`.
    ///
    /// At most two results are requested: enough to tell "one" from "many".
    pub async fn find_users_by_email(&self, email: &str) -> Result<GoogleUserList> {
        let query = format!("email={email}");
        let resp = send_with_retry(&self.retry, "find user", || {
            self.http
                .get(self.users_url())
                .bearer_auth(self.auth.token())
                .query(&[
                    ("customer", self.customer_id.as_str()),
                    ("domain", self.domain.as_str()),
                    ("maxResults", "2"),
                    ("orderBy", "email"),
                    ("projection", "full"),
                    ("query", query.as_str()),
                ])
        })
        .await?;

        let resp = check(resp).await?;
        Ok(resp.json::<GoogleUserList>().await?)
    }

    /// Create a new Google Workspace user.
    pub async fn insert_user(&self, user: &GoogleUser) -> Result<GoogleUser> {
        let resp = send_with_retry(&self.retry, "create user", || {
            self.http
                .post(self.users_url())
                .bearer_auth(self.auth.token())
                .json(user)
        })
        .await?;

        let resp = check(resp).await?;
        Ok(resp.json::<GoogleUser>().await?)
    }

    /// Send a sparse update for the user with this primary email.
    pub async fn update_user(&self, email: &str, update: &GoogleUserUpdate) -> Result<()> {
        let resp = send_with_retry(&self.retry, "update user", || {
            self.http
                .put(self.user_url(email))
                .bearer_auth(self.auth.token())
                .json(update)
        })
        .await?;

        check(resp).await?;
        Ok(())
    }

    /// One page of the groups `user_key` is a member of.
    pub async fn list_groups(
        &self,
        user_key: &str,
        page_token: Option<&str>,
    ) -> Result<GoogleGroupList> {
        let resp = send_with_retry(&self.retry, "list groups", || {
            let mut req = self
                .http
                .get(self.groups_url())
                .bearer_auth(self.auth.token())
                .query(&[("userKey", user_key)]);
            if let Some(token) = page_token {
                req = req.query(&[("pageToken", token)]);
            }
            req
        })
        .await?;

        let resp = check(resp).await?;
        Ok(resp.json::<GoogleGroupList>().await?)
    }

    /// Remove `member_key` from the group `group_key`.
    pub async fn delete_member(&self, group_key: &str, member_key: &str) -> Result<()> {
        let resp = send_with_retry(&self.retry, "remove member", || {
            self.http
                .delete(self.member_url(group_key, member_key))
                .bearer_auth(self.auth.token())
        })
        .await?;

        check(resp).await?;
        Ok(())
    }
}

/// Pass successful responses through; turn anything else into `DirectoryApi`.
async fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let (message, reason) = match serde_json::from_str::<GoogleApiErrorBody>(&body) {
        Ok(parsed) => {
            let reason = parsed.error.reason().to_string();
            (parsed.error.message, reason)
        }
        Err(_) => (body, String::new()),
    };
    Err(SyncError::DirectoryApi {
        status: status.as_u16(),
        message,
        reason,
    })
}
