//! CRM object operations
//!
//! Every call runs the same preamble: check the active profile holds a
//! usable token, then resolve the acting user's open id through the
//! identity lookup endpoint. List responses come in several shapes
//! depending on the endpoint version, so [`reshape_object_page`] pulls a
//! single [`ObjectPage`] out of whichever one arrives.

use crate::auth::is_expired;
use crate::endpoints;
use crate::error::{Error, Result, MALFORMED_RESPONSE_CODE};
use crate::normalizer::{as_integer, parse};
use crate::profile::ProfileStore;
use crate::response::Normalized;
use crate::transport::Transport;
use chrono::{DateTime, SecondsFormat};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, instrument};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const DEFAULT_PAGE_NUMBER: u32 = 1;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub object_type: Option<String>,
    pub page_size: Option<u32>,
    pub page_number: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetOptions {
    pub object_type: Option<String>,
}

/// One page of CRM objects
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectPage {
    pub objects: Vec<Value>,
    pub total_count: u64,
    pub page_size: u32,
    pub page_number: u32,
    pub has_more: bool,
}

/// Object description in the shape callers see
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct ObjectSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    object_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated_at: Option<String>,
}

struct Session {
    access_token: String,
    corp_id: String,
    lookup_key: Option<String>,
}

/// Client for the CRM object endpoints
pub struct ObjectClient {
    store: ProfileStore,
    transport: Arc<dyn Transport>,
}

impl ObjectClient {
    pub fn new(store: ProfileStore, transport: Arc<dyn Transport>) -> Self {
        Self { store, transport }
    }

    /// List object descriptions visible to the acting user
    pub async fn list_objects(&self, options: &ListOptions) -> Normalized<ObjectPage> {
        Normalized::from_result(self.try_list_objects(options).await)
    }

    /// Fetch a single object by id
    pub async fn get_object(&self, id: &str, options: &GetOptions) -> Normalized<Value> {
        match self.try_get_object(id, options).await {
            Ok(raw) => parse(&raw),
            Err(e) => Normalized::from_error(&e),
        }
    }

    #[instrument(skip(self))]
    async fn try_list_objects(&self, options: &ListOptions) -> Result<ObjectPage> {
        let session = self.session()?;
        let open_user_id = self.resolve_open_user_id(&session).await?;

        let page_size = options.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        let page_number = options.page_number.unwrap_or(DEFAULT_PAGE_NUMBER);
        let mut body = json!({
            "accessToken": session.access_token,
            "corpId": session.corp_id,
            "currentOpenUserId": open_user_id,
            "pageSize": page_size,
            "pageNumber": page_number,
        });
        if let Some(object_type) = &options.object_type {
            body["objectType"] = json!(object_type);
        }

        let raw = self.transport.post(endpoints::OBJECT_LIST, &body).await?;
        // surface error envelopes before reshaping
        parse(&raw).into_result()?;

        let page = reshape_object_page(&raw, page_size, page_number);
        debug!(count = page.objects.len(), total = page.total_count, "Listed objects");
        Ok(page)
    }

    #[instrument(skip(self))]
    async fn try_get_object(&self, id: &str, options: &GetOptions) -> Result<Value> {
        if id.trim().is_empty() {
            return Err(Error::validation(
                "Object id must not be empty",
                "objectId",
                Some(id.to_string()),
            ));
        }
        let session = self.session()?;
        let open_user_id = self.resolve_open_user_id(&session).await?;

        let mut body = json!({
            "accessToken": session.access_token,
            "corpId": session.corp_id,
            "currentOpenUserId": open_user_id,
            "objectId": id,
        });
        if let Some(object_type) = &options.object_type {
            body["objectType"] = json!(object_type);
        }

        Ok(self.transport.post(endpoints::OBJECT_GET, &body).await?)
    }

    fn session(&self) -> Result<Session> {
        let profile = self
            .store
            .get_active_profile()?
            .ok_or_else(|| Error::auth("Not authenticated"))?;

        let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());
        let (Some(access_token), Some(corp_id)) =
            (non_empty(&profile.access_token), non_empty(&profile.corp_id))
        else {
            return Err(Error::auth("Not authenticated"));
        };
        if is_expired(&profile) {
            return Err(Error::auth("Not authenticated: access token expired"));
        }

        Ok(Session {
            access_token,
            corp_id,
            lookup_key: non_empty(&profile.lookup_key),
        })
    }

    async fn resolve_open_user_id(&self, session: &Session) -> Result<String> {
        self.lookup_open_user_id(session)
            .await
            .map_err(|e| e.with_context("Failed to get currentOpenUserId"))
    }

    async fn lookup_open_user_id(&self, session: &Session) -> Result<String> {
        let lookup_key = session.lookup_key.as_deref().ok_or_else(|| {
            Error::config("No lookupKey set on the active profile")
        })?;
        let body = json!({
            "accessToken": session.access_token,
            "corpId": session.corp_id,
            "lookupKey": lookup_key,
        });

        let raw = self.transport.post(endpoints::USER_LOOKUP, &body).await?;
        parse(&raw).into_result()?;

        extract_open_user_id(&raw).ok_or_else(|| {
            Error::api(MALFORMED_RESPONSE_CODE, "Response missing currentOpenUserId")
        })
    }
}

/// First non-empty open user id in a lookup response
pub fn extract_open_user_id(raw: &Value) -> Option<String> {
    let from_list = raw
        .get("empList")
        .and_then(Value::as_array)
        .and_then(|list| list.first())
        .and_then(|emp| emp.get("openUserId"))
        .and_then(id_string);

    from_list.or_else(|| {
        ["currentOpenUserId", "userId", "id"]
            .iter()
            .find_map(|key| raw.get(*key).and_then(id_string))
    })
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Build an [`ObjectPage`] from any of the list response shapes.
///
/// Missing or malformed fields fall back to defaults; this never fails.
pub fn reshape_object_page(raw: &Value, page_size: u32, page_number: u32) -> ObjectPage {
    let data = raw.get("data").filter(|d| d.is_object());
    let field = |key: &str| data.and_then(|d| d.get(key)).or_else(|| raw.get(key));

    let objects = match data.and_then(|d| d.get("objects")).and_then(Value::as_array) {
        Some(items) => items.iter().map(summarize_object).collect(),
        None => [
            data.and_then(|d| d.get("list")),
            raw.get("objects"),
            raw.get("list"),
        ]
        .into_iter()
        .flatten()
        .find_map(Value::as_array)
        .cloned()
        .unwrap_or_default(),
    };

    let total_count = ["totalCount", "total", "count"]
        .iter()
        .find_map(|key| field(*key).and_then(as_integer))
        .and_then(|n| u64::try_from(n).ok())
        .unwrap_or(objects.len() as u64);

    let has_more = ["hasMore", "nextPage"]
        .iter()
        .find_map(|key| field(*key).and_then(truthy))
        .unwrap_or(false);

    ObjectPage {
        objects,
        total_count,
        page_size,
        page_number,
        has_more,
    }
}

fn summarize_object(item: &Value) -> Value {
    let Some(fields) = item.as_object() else {
        return item.clone();
    };
    let text = |key: &str| fields.get(key).and_then(Value::as_str).map(str::to_string);

    let summary = ObjectSummary {
        id: text("describeApiName"),
        name: text("describeDisplayName"),
        object_type: text("defineType"),
        created_at: iso_timestamp(fields, "createTime"),
        updated_at: iso_timestamp(fields, "updateTime"),
    };
    serde_json::to_value(summary).unwrap_or(Value::Null)
}

/// Epoch-millisecond field rendered as RFC 3339
fn iso_timestamp(fields: &Map<String, Value>, key: &str) -> Option<String> {
    let millis = fields.get(key).and_then(as_integer)?;
    DateTime::from_timestamp_millis(millis).map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Boolean reading of a pagination flag; `null` counts as absent
fn truthy(value: &Value) -> Option<bool> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(*b),
        Value::Number(n) => Some(n.as_f64().is_some_and(|f| f != 0.0)),
        Value::String(s) => Some(!s.is_empty()),
        Value::Array(_) | Value::Object(_) => Some(true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::profile::DEFAULT_PROFILE;
    use crate::test_support::StubTransport;
    use crate::transport::TransportError;
    use tempfile::{tempdir, TempDir};

    fn lookup_ok() -> Value {
        json!({"errorCode": 0, "errorMessage": "success", "empList": [{"openUserId": "FSUID_1"}]})
    }

    fn setup(transport: StubTransport) -> (TempDir, ProfileStore, Arc<StubTransport>, ObjectClient) {
        let dir = tempdir().unwrap();
        let store = ProfileStore::new(dir.path().join("config.json"));
        store.set_profile_value(DEFAULT_PROFILE, "accessToken", "tok").unwrap();
        store.set_profile_value(DEFAULT_PROFILE, "corpId", "corp").unwrap();
        store.set_profile_value(DEFAULT_PROFILE, "lookupKey", "13800000000").unwrap();
        let transport = Arc::new(transport);
        let client = ObjectClient::new(store.clone(), transport.clone());
        (dir, store, transport, client)
    }

    #[test]
    fn test_reshape_remaps_described_objects() {
        let raw = json!({
            "errorCode": 0,
            "errorMessage": "success",
            "data": {
                "objects": [{
                    "describeApiName": "acct_1",
                    "describeDisplayName": "Acct One",
                    "defineType": "custom",
                    "createTime": 1700000000000i64
                }]
            }
        });
        let page = reshape_object_page(&raw, 20, 1);
        assert_eq!(page.objects.len(), 1);
        let object = &page.objects[0];
        assert_eq!(object["id"], "acct_1");
        assert_eq!(object["name"], "Acct One");
        assert_eq!(object["objectType"], "custom");
        assert_eq!(object["createdAt"], "2023-11-14T22:13:20.000Z");
        assert!(object.get("updatedAt").is_none());
        assert_eq!(page.total_count, 1);
        assert!(!page.has_more);
    }

    #[test]
    fn test_reshape_fallback_shapes() {
        let page = reshape_object_page(&json!({"data": {"list": [{"a": 1}], "total": 40, "nextPage": 2}}), 10, 3);
        assert_eq!(page.objects, vec![json!({"a": 1})]);
        assert_eq!(page.total_count, 40);
        assert!(page.has_more);
        assert_eq!((page.page_size, page.page_number), (10, 3));

        let page = reshape_object_page(&json!({"objects": [1, 2], "count": "7"}), 20, 1);
        assert_eq!(page.objects.len(), 2);
        assert_eq!(page.total_count, 7);

        let page = reshape_object_page(&json!({"list": [1, 2, 3], "hasMore": false, "nextPage": 2}), 20, 1);
        assert_eq!(page.total_count, 3);
        assert!(!page.has_more);
    }

    #[test]
    fn test_reshape_degrades_to_defaults() {
        for raw in [Value::Null, json!("text"), json!({"data": "x", "totalCount": -5})] {
            let page = reshape_object_page(&raw, 20, 1);
            assert!(page.objects.is_empty());
            assert_eq!(page.total_count, 0);
            assert!(!page.has_more);
        }
    }

    #[test]
    fn test_extract_open_user_id_order() {
        assert_eq!(extract_open_user_id(&lookup_ok()).as_deref(), Some("FSUID_1"));
        assert_eq!(
            extract_open_user_id(&json!({"empList": [], "userId": "", "id": 42})).as_deref(),
            Some("42")
        );
        assert_eq!(
            extract_open_user_id(&json!({"currentOpenUserId": "a", "userId": "b"})).as_deref(),
            Some("a")
        );
        assert_eq!(extract_open_user_id(&json!({"empList": [{}]})), None);
    }

    #[tokio::test]
    async fn test_list_requires_token() {
        let (_dir, store, transport, client) = setup(StubTransport::new());
        store.unset_profile_value(DEFAULT_PROFILE, "accessToken").unwrap();

        let result = client.list_objects(&ListOptions::default()).await;
        assert_eq!(result.error(), Some("Not authenticated"));
        assert_eq!(result.error_kind(), Some(ErrorKind::Auth));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_list_rejects_expired_token() {
        let (_dir, store, _transport, client) = setup(StubTransport::new());
        store.set_profile_value(DEFAULT_PROFILE, "tokenExpiry", "1").unwrap();

        let result = client.list_objects(&ListOptions::default()).await;
        assert_eq!(result.error(), Some("Not authenticated: access token expired"));
    }

    #[tokio::test]
    async fn test_list_sends_defaults_and_reshapes() {
        let (_dir, _store, transport, client) = setup(
            StubTransport::new()
                .respond(Ok(lookup_ok()))
                .respond(Ok(json!({"errorCode": 0, "errorMessage": "success", "data": {"objects": []}}))),
        );

        let page = client
            .list_objects(&ListOptions::default())
            .await
            .into_result()
            .unwrap();
        assert_eq!(page.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(page.page_number, DEFAULT_PAGE_NUMBER);

        let requests = transport.requests();
        assert_eq!(requests[0].path, endpoints::USER_LOOKUP);
        assert_eq!(
            requests[0].body,
            Some(json!({"accessToken": "tok", "corpId": "corp", "lookupKey": "13800000000"}))
        );
        assert_eq!(requests[1].path, endpoints::OBJECT_LIST);
        assert_eq!(
            requests[1].body,
            Some(json!({
                "accessToken": "tok",
                "corpId": "corp",
                "currentOpenUserId": "FSUID_1",
                "pageSize": 20,
                "pageNumber": 1
            }))
        );
    }

    #[tokio::test]
    async fn test_list_includes_object_type_when_given() {
        let (_dir, _store, transport, client) = setup(
            StubTransport::new()
                .respond(Ok(lookup_ok()))
                .respond(Ok(json!({"objects": []}))),
        );
        let options = ListOptions {
            object_type: Some("custom".into()),
            page_size: Some(5),
            page_number: Some(2),
        };
        assert!(client.list_objects(&options).await.is_success());

        let body = transport.requests()[1].body.clone().unwrap();
        assert_eq!(body["objectType"], "custom");
        assert_eq!(body["pageSize"], 5);
        assert_eq!(body["pageNumber"], 2);
    }

    #[tokio::test]
    async fn test_identity_failures_are_wrapped() {
        let (_dir, _store, _transport, client) = setup(
            StubTransport::new().respond(Ok(json!({"errorCode": 20016, "errorMessage": "token expired"}))),
        );
        let result = client.list_objects(&ListOptions::default()).await;
        assert_eq!(
            result.error(),
            Some("Failed to get currentOpenUserId: API Error (20016): token expired")
        );

        let (_dir, _store, _transport, client) =
            setup(StubTransport::new().respond(Err(TransportError::NoResponse("timeout".into()))));
        let result = client.list_objects(&ListOptions::default()).await;
        assert_eq!(
            result.error(),
            Some("Failed to get currentOpenUserId: No response received from server: timeout")
        );
        assert_eq!(result.error_kind(), Some(ErrorKind::Network));

        let (_dir, _store, _transport, client) =
            setup(StubTransport::new().respond(Ok(json!({"errorCode": 0, "errorMessage": "ok"}))));
        let result = client.list_objects(&ListOptions::default()).await;
        assert_eq!(
            result.error(),
            Some("Failed to get currentOpenUserId: Response missing currentOpenUserId")
        );
        match result {
            Normalized::Failure { error_code, kind, .. } => {
                assert_eq!(error_code, Some(MALFORMED_RESPONSE_CODE));
                assert_ne!(error_code, Some(0));
                assert_eq!(kind, ErrorKind::Api);
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_list_error_envelope_is_not_reshaped() {
        let (_dir, _store, _transport, client) = setup(
            StubTransport::new()
                .respond(Ok(lookup_ok()))
                .respond(Ok(json!({"errorCode": 10002, "errorMessage": "busy"}))),
        );
        let result = client.list_objects(&ListOptions::default()).await;
        assert_eq!(result.error(), Some("API Error (10002): busy"));
        assert!(result.into_result().unwrap_err().is_retryable());
    }

    #[tokio::test]
    async fn test_get_object_uses_generic_parse() {
        let (_dir, _store, transport, client) = setup(
            StubTransport::new()
                .respond(Ok(lookup_ok()))
                .respond(Ok(json!({"errorCode": 0, "errorMessage": "success", "data": {"_id": "o1"}}))),
        );
        let result = client.get_object("o1", &GetOptions::default()).await;
        assert_eq!(result.data(), Some(&json!({"_id": "o1"})));

        let body = transport.requests()[1].body.clone().unwrap();
        assert_eq!(body["objectId"], "o1");
        assert_eq!(body["currentOpenUserId"], "FSUID_1");
        assert!(body.get("objectType").is_none());
    }

    #[tokio::test]
    async fn test_get_object_rejects_empty_id() {
        let (_dir, _store, transport, client) = setup(StubTransport::new());
        let result = client.get_object(" ", &GetOptions::default()).await;
        assert_eq!(result.error_kind(), Some(ErrorKind::Validation));
        assert!(transport.requests().is_empty());
    }
}
