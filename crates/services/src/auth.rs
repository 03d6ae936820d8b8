//! Who is playing. Sessions, progression, and results only need an optional
//! identity; where it comes from (a hosted account service, a test fixture)
//! stays behind `AuthProvider`.

use async_trait::async_trait;
use quiz_core::model::UserId;
use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

/// A signed-in user as the rest of the app sees one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub id: UserId,
    pub name: Option<String>,
    pub email: String,
}

impl UserIdentity {
    #[must_use]
    pub fn new(id: UserId, name: Option<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            name,
            email: email.into(),
        }
    }

    /// The name to show and store on attempts: the account name when set,
    /// otherwise the local part of the email address.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if let Some(name) = self.name.as_deref() {
            if !name.trim().is_empty() {
                return name;
            }
        }
        self.email
            .split('@')
            .next()
            .filter(|part| !part.is_empty())
            .unwrap_or(&self.email)
    }
}

/// Source of the current identity.
///
/// Providers never fail: an unreachable account service is the same as
/// nobody being signed in, and the app keeps running on local state.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn current_user(&self) -> Option<UserIdentity>;
}

//
// ─── STATIC PROVIDER ───────────────────────────────────────────────────────────
//

/// Fixed identity, for tests and single-user setups.
#[derive(Debug, Clone)]
pub struct StaticAuthProvider {
    identity: Option<UserIdentity>,
}

impl StaticAuthProvider {
    #[must_use]
    pub fn signed_in(identity: UserIdentity) -> Self {
        Self {
            identity: Some(identity),
        }
    }

    #[must_use]
    pub fn anonymous() -> Self {
        Self { identity: None }
    }
}

#[async_trait]
impl AuthProvider for StaticAuthProvider {
    async fn current_user(&self) -> Option<UserIdentity> {
        self.identity.clone()
    }
}

//
// ─── HTTP PROVIDER ─────────────────────────────────────────────────────────────
//

/// Connection settings for the hosted account service. Shares the deployment
/// of the document store, so the same environment variables configure it.
#[derive(Debug, Clone)]
struct HttpAuthConfig {
    base_url: String,
    project_id: String,
    api_key: String,
}

impl HttpAuthConfig {
    fn from_env() -> Option<Self> {
        let base_url = non_empty_env("HOPQUIZ_API_BASE_URL")?;
        let project_id = non_empty_env("HOPQUIZ_API_PROJECT")?;
        let api_key = non_empty_env("HOPQUIZ_API_KEY")?;
        Some(Self {
            base_url,
            project_id,
            api_key,
        })
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Asks the hosted account service who is signed in. Unconfigured or
/// unreachable reads degrade to anonymous.
pub struct HttpAuthProvider {
    client: Client,
    config: Option<HttpAuthConfig>,
}

impl HttpAuthProvider {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            client: Client::new(),
            config: HttpAuthConfig::from_env(),
        }
    }

    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        project_id: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            config: Some(HttpAuthConfig {
                base_url: base_url.into(),
                project_id: project_id.into(),
                api_key: api_key.into(),
            }),
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }

    async fn fetch_account(&self, config: &HttpAuthConfig) -> Result<AccountDocument, reqwest::Error> {
        let url = format!("{}/account/me", config.base_url.trim_end_matches('/'));
        self.client
            .get(url)
            .header("X-Project-Id", &config.project_id)
            .header("X-Api-Key", &config.api_key)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

#[async_trait]
impl AuthProvider for HttpAuthProvider {
    async fn current_user(&self) -> Option<UserIdentity> {
        let config = self.config.as_ref()?;
        match self.fetch_account(config).await {
            Ok(account) => Some(UserIdentity::new(
                UserId::new(account.id),
                account.name.filter(|n| !n.trim().is_empty()),
                account.email,
            )),
            Err(err) => {
                warn!(error = %err, "account lookup failed, continuing as anonymous");
                None
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct AccountDocument {
    id: String,
    #[serde(default)]
    name: Option<String>,
    email: String,
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_prefers_account_name() {
        let identity = UserIdentity::new(
            UserId::new("u1"),
            Some("Rabbit".to_string()),
            "rabbit@example.com",
        );
        assert_eq!(identity.display_name(), "Rabbit");
    }

    #[test]
    fn display_name_falls_back_to_email_local_part() {
        let identity = UserIdentity::new(UserId::new("u1"), None, "rabbit@example.com");
        assert_eq!(identity.display_name(), "rabbit");

        let blank_name = UserIdentity::new(
            UserId::new("u1"),
            Some("   ".to_string()),
            "carrot@example.com",
        );
        assert_eq!(blank_name.display_name(), "carrot");
    }

    #[tokio::test]
    async fn static_provider_returns_its_identity() {
        let identity = UserIdentity::new(UserId::new("u1"), None, "r@example.com");
        let provider = StaticAuthProvider::signed_in(identity.clone());
        assert_eq!(provider.current_user().await, Some(identity));

        assert_eq!(StaticAuthProvider::anonymous().current_user().await, None);
    }
}
