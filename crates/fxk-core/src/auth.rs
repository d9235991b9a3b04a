//! Authentication flow
//!
//! Exchanges the active profile's long-lived app credentials for a
//! short-lived corporate access token and stores it back on the profile.

use crate::endpoints;
use crate::error::{Error, Result};
use crate::normalizer::parse_auth_response;
use crate::profile::{Profile, ProfileStore};
use crate::response::Normalized;
use crate::transport::Transport;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Credentials obtained by a successful login
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub access_token: String,
    pub corp_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// State of the token cached on the active profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum TokenStatus {
    Missing,
    #[serde(rename_all = "camelCase")]
    Valid {
        profile: String,
        corp_id: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    },
    #[serde(rename_all = "camelCase")]
    Expired {
        profile: String,
        expired_at: DateTime<Utc>,
    },
}

/// Epoch milliseconds to a UTC timestamp
pub(crate) fn expiry_time(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}

/// `now + secs`, or `None` when the lifetime does not fit a timestamp
fn expiry_after(secs: i64) -> Option<DateTime<Utc>> {
    TimeDelta::try_seconds(secs).and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
}

/// Whether a recorded expiry lies in the past
pub(crate) fn is_expired(profile: &Profile) -> bool {
    profile
        .token_expiry
        .and_then(expiry_time)
        .is_some_and(|at| at <= Utc::now())
}

struct AppCredentials<'a> {
    app_id: &'a str,
    app_secret: &'a str,
    permanent_code: &'a str,
}

impl<'a> AppCredentials<'a> {
    fn from_profile(profile: &'a Profile) -> Result<Self> {
        let field = |value: &'a Option<String>| value.as_deref().filter(|v| !v.trim().is_empty());
        let (app_id, app_secret, permanent_code) = (
            field(&profile.app_id),
            field(&profile.app_secret),
            field(&profile.permanent_code),
        );

        match (app_id, app_secret, permanent_code) {
            (Some(app_id), Some(app_secret), Some(permanent_code)) => Ok(Self {
                app_id,
                app_secret,
                permanent_code,
            }),
            _ => {
                let missing: Vec<&str> = [
                    ("appId", app_id),
                    ("appSecret", app_secret),
                    ("permanentCode", permanent_code),
                ]
                .iter()
                .filter(|(_, v)| v.is_none())
                .map(|(k, _)| *k)
                .collect();
                Err(Error::Validation {
                    message: format!(
                        "Missing authentication parameters: {}",
                        missing.join(", ")
                    ),
                    field: Some(missing.join(",")),
                    value: None,
                })
            }
        }
    }
}

/// Runs the login flow against a transport and persists the result
pub struct Authenticator {
    store: ProfileStore,
    transport: Arc<dyn Transport>,
}

impl Authenticator {
    pub fn new(store: ProfileStore, transport: Arc<dyn Transport>) -> Self {
        Self { store, transport }
    }

    /// Log in with the active profile's app credentials
    pub async fn authenticate(&self) -> Normalized<AuthSession> {
        Normalized::from_result(self.try_authenticate().await)
    }

    #[instrument(skip(self))]
    async fn try_authenticate(&self) -> Result<AuthSession> {
        let profile = self
            .store
            .get_active_profile()?
            .ok_or_else(|| Error::config("No current profile set"))?;
        let credentials = AppCredentials::from_profile(&profile)?;

        let body = json!({
            "appId": credentials.app_id,
            "appSecret": credentials.app_secret,
            "permanentCode": credentials.permanent_code,
        });
        let raw = self.transport.post(endpoints::AUTH_TOKEN, &body).await?;
        let token = parse_auth_response(&raw).into_result()?;

        self.store
            .set_profile_value(&profile.name, "accessToken", &token.access_token)?;
        self.store
            .set_profile_value(&profile.name, "corpId", &token.corp_id)?;

        let expires_at = token.expires_in.and_then(expiry_after);
        match expires_at {
            Some(at) => self.store.set_profile_value(
                &profile.name,
                "tokenExpiry",
                &at.timestamp_millis().to_string(),
            )?,
            None => {
                self.store.unset_profile_value(&profile.name, "tokenExpiry")?;
            }
        }

        info!(profile = %profile.name, corp_id = %token.corp_id, "Authenticated");
        Ok(AuthSession {
            access_token: token.access_token,
            corp_id: token.corp_id,
            expires_at,
        })
    }

    /// Cached access token of the active profile
    pub fn get_token(&self) -> Result<Option<String>> {
        Ok(self
            .store
            .get_active_profile()?
            .and_then(|p| p.access_token))
    }

    /// Cached corp id of the active profile
    pub fn get_corp_id(&self) -> Result<Option<String>> {
        Ok(self.store.get_active_profile()?.and_then(|p| p.corp_id))
    }

    pub fn token_status(&self) -> Result<TokenStatus> {
        token_status(&self.store)
    }

    /// Drop the cached token from the active profile; returns whether one was set
    pub fn logout(&self) -> Result<bool> {
        logout(&self.store)
    }
}

/// State of the active profile's cached token. Reads local state only.
pub fn token_status(store: &ProfileStore) -> Result<TokenStatus> {
    let Some(profile) = store.get_active_profile()? else {
        return Ok(TokenStatus::Missing);
    };
    if profile.access_token.as_deref().map_or(true, str::is_empty) {
        return Ok(TokenStatus::Missing);
    }

    let expires_at = profile.token_expiry.and_then(expiry_time);
    match expires_at {
        Some(at) if is_expired(&profile) => Ok(TokenStatus::Expired {
            profile: profile.name,
            expired_at: at,
        }),
        _ => Ok(TokenStatus::Valid {
            profile: profile.name,
            corp_id: profile.corp_id,
            expires_at,
        }),
    }
}

/// Clear the active profile's token, corp id and expiry
pub fn logout(store: &ProfileStore) -> Result<bool> {
    let profile = store
        .get_active_profile()?
        .ok_or_else(|| Error::config("No current profile set"))?;

    let had_token = store.unset_profile_value(&profile.name, "accessToken")?;
    store.unset_profile_value(&profile.name, "corpId")?;
    store.unset_profile_value(&profile.name, "tokenExpiry")?;

    if !had_token {
        warn!(profile = %profile.name, "Logout requested but no token was stored");
    }
    Ok(had_token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::profile::DEFAULT_PROFILE;
    use crate::test_support::StubTransport;
    use crate::transport::TransportError;
    use tempfile::{tempdir, TempDir};

    fn setup(transport: StubTransport) -> (TempDir, ProfileStore, Arc<StubTransport>, Authenticator) {
        let dir = tempdir().unwrap();
        let store = ProfileStore::new(dir.path().join("config.json"));
        let transport = Arc::new(transport);
        let auth = Authenticator::new(store.clone(), transport.clone());
        (dir, store, transport, auth)
    }

    fn with_credentials(store: &ProfileStore) {
        store.set_profile_value(DEFAULT_PROFILE, "appId", "app").unwrap();
        store.set_profile_value(DEFAULT_PROFILE, "appSecret", "secret").unwrap();
        store.set_profile_value(DEFAULT_PROFILE, "permanentCode", "perm").unwrap();
    }

    #[tokio::test]
    async fn test_missing_parameters_short_circuit() {
        let (_dir, store, transport, auth) = setup(StubTransport::new());
        store.set_profile_value(DEFAULT_PROFILE, "appId", "app").unwrap();

        let result = auth.authenticate().await;
        assert_eq!(
            result.error(),
            Some("Missing authentication parameters: appSecret, permanentCode")
        );
        assert_eq!(result.error_kind(), Some(ErrorKind::Validation));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_successful_login_persists_token() {
        let (_dir, store, transport, auth) = setup(StubTransport::new().respond(Ok(json!({
            "errorCode": 0,
            "errorMessage": "success",
            "accessToken": "tok",
            "corpId": "corp",
            "expiresIn": 7200
        }))));
        with_credentials(&store);

        let session = auth.authenticate().await.into_result().unwrap();
        assert_eq!(session.access_token, "tok");
        assert_eq!(session.corp_id, "corp");
        assert!(session.expires_at.is_some());

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].path, endpoints::AUTH_TOKEN);
        assert_eq!(
            requests[0].body,
            Some(json!({"appId": "app", "appSecret": "secret", "permanentCode": "perm"}))
        );

        assert_eq!(auth.get_token().unwrap().as_deref(), Some("tok"));
        assert_eq!(auth.get_corp_id().unwrap().as_deref(), Some("corp"));
        assert!(matches!(auth.token_status().unwrap(), TokenStatus::Valid { .. }));
    }

    #[tokio::test]
    async fn test_unrepresentable_lifetime_leaves_no_expiry() {
        for expires_in in [json!(1e300), json!(i64::MAX)] {
            let (_dir, store, _transport, auth) = setup(StubTransport::new().respond(Ok(json!({
                "errorCode": 0,
                "errorMessage": "success",
                "accessToken": "tok",
                "corpId": "corp",
                "expiresIn": expires_in
            }))));
            with_credentials(&store);
            store.set_profile_value(DEFAULT_PROFILE, "tokenExpiry", "1000").unwrap();

            let session = auth.authenticate().await.into_result().unwrap();
            assert_eq!(session.expires_at, None);
            assert_eq!(
                store.get_profile_value(DEFAULT_PROFILE, "tokenExpiry").unwrap(),
                None
            );
            assert!(matches!(
                auth.token_status().unwrap(),
                TokenStatus::Valid { expires_at: None, .. }
            ));
        }
    }

    #[test]
    fn test_expiry_after_bounds() {
        assert!(expiry_after(7200).is_some_and(|at| at > Utc::now()));
        assert_eq!(expiry_after(i64::MAX), None);
        assert_eq!(expiry_after(i64::MIN), None);
    }

    #[tokio::test]
    async fn test_transport_failure_message_is_surfaced() {
        let (_dir, store, _transport, auth) = setup(
            StubTransport::new().respond(Err(TransportError::NoResponse("connection refused".into()))),
        );
        with_credentials(&store);

        let result = auth.authenticate().await;
        assert_eq!(
            result.error(),
            Some("No response received from server: connection refused")
        );
        assert_eq!(result.error_kind(), Some(ErrorKind::Network));
        assert_eq!(auth.get_token().unwrap(), None);
    }

    #[tokio::test]
    async fn test_normalizer_failure_is_propagated_unchanged() {
        let (_dir, store, _transport, auth) = setup(StubTransport::new().respond(Ok(json!({
            "errorCode": 20001,
            "errorMessage": "invalid appSecret"
        }))));
        with_credentials(&store);

        let result = auth.authenticate().await;
        assert_eq!(result.error(), Some("API Error (20001): invalid appSecret"));
    }

    #[tokio::test]
    async fn test_logout_and_status() {
        let (_dir, store, _transport, auth) = setup(StubTransport::new());
        assert_eq!(auth.token_status().unwrap(), TokenStatus::Missing);
        assert!(!auth.logout().unwrap());

        store.set_profile_value(DEFAULT_PROFILE, "accessToken", "tok").unwrap();
        store.set_profile_value(DEFAULT_PROFILE, "corpId", "corp").unwrap();
        store.set_profile_value(DEFAULT_PROFILE, "tokenExpiry", "1000").unwrap();
        assert!(matches!(auth.token_status().unwrap(), TokenStatus::Expired { .. }));

        assert!(auth.logout().unwrap());
        assert_eq!(auth.get_token().unwrap(), None);
        assert_eq!(auth.get_corp_id().unwrap(), None);
        assert_eq!(
            store.get_profile_value(DEFAULT_PROFILE, "tokenExpiry").unwrap(),
            None
        );
    }
}
