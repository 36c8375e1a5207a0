//! Wire models for the management API resources the CLI understands.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::pagination::{Page, PageTotals};

/// A role that can be assigned to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Role {
    /// Role identifier, e.g. `rol_1eKJp3jV04SiU04h`.
    pub(crate) id: String,
    /// Display name.
    pub(crate) name: String,
    /// Optional free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) description: Option<String>,
}

/// Paged role listing.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RoleList {
    #[serde(flatten)]
    pub(crate) totals: PageTotals,
    #[serde(default)]
    pub(crate) roles: Vec<Role>,
}

impl From<RoleList> for Page<Role> {
    fn from(list: RoleList) -> Self {
        let has_more = list.totals.has_more(list.roles.len());
        Self {
            items: list.roles,
            has_more,
        }
    }
}

/// Payload for the role assignment and removal endpoints.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct RoleIds<'a> {
    pub(crate) roles: &'a [String],
}

/// One tenant log event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct LogRecord {
    /// When the event happened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) date: Option<DateTime<Utc>>,
    /// Event type code; `s…` codes are successes, `f…` failures.
    #[serde(rename = "type", default)]
    pub(crate) log_type: String,
    /// Name of the application involved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) client_name: Option<String>,
    /// Identifier of the application involved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) client_id: Option<String>,
    /// Free-form nested details.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub(crate) details: Option<LogDetails>,
}

/// Optional nested details attached to a log event.
///
/// Every field tolerates missing or wrongly-typed data by decoding to `None`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct LogDetails {
    /// The originating HTTP request.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub(crate) request: Option<RequestDetails>,
    /// Error raised while handling the event.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub(crate) error: Option<ErrorDetails>,
}

/// Request metadata recorded with a log event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct RequestDetails {
    /// Client user agent.
    #[serde(
        rename = "userAgent",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub(crate) user_agent: Option<String>,
}

/// Error metadata recorded with a log event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct ErrorDetails {
    /// Machine-readable error type.
    #[serde(
        rename = "type",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub(crate) error_type: Option<String>,
    /// Human-readable message.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub(crate) message: Option<String>,
}

impl LogRecord {
    /// User agent of the originating request, when recorded.
    #[must_use]
    pub(crate) fn user_agent(&self) -> Option<&str> {
        self.details
            .as_ref()
            .and_then(|details| details.request.as_ref())
            .and_then(|request| request.user_agent.as_deref())
            .filter(|agent| !agent.is_empty())
    }

    /// Error type and message, when either is recorded.
    #[must_use]
    pub(crate) fn error(&self) -> Option<(&str, &str)> {
        let error = self.details.as_ref()?.error.as_ref()?;
        let error_type = error.error_type.as_deref().unwrap_or_default();
        let message = error.message.as_deref().unwrap_or_default();
        if error_type.is_empty() && message.is_empty() {
            None
        } else {
            Some((error_type, message))
        }
    }
}

/// Paged log listing.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LogList {
    #[serde(flatten)]
    pub(crate) totals: PageTotals,
    #[serde(default)]
    pub(crate) logs: Vec<LogRecord>,
}

impl From<LogList> for Page<LogRecord> {
    fn from(list: LogList) -> Self {
        let has_more = list.totals.has_more(list.logs.len());
        Self {
            items: list.logs,
            has_more,
        }
    }
}

/// Decode `T` if the value has the expected shape, otherwise `None`.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> LogRecord {
        serde_json::from_value(value).expect("log record should decode")
    }

    #[test]
    fn nested_details_are_decoded() {
        let log = record(json!({
            "date": "2024-03-01T10:20:30.123Z",
            "type": "f",
            "client_id": "abc",
            "details": {
                "request": {"userAgent": "curl/7.0"},
                "error": {"type": "invalid_grant", "message": "Wrong password"}
            }
        }));
        assert_eq!(log.user_agent(), Some("curl/7.0"));
        assert_eq!(log.error(), Some(("invalid_grant", "Wrong password")));
    }

    #[test]
    fn wrongly_typed_details_degrade_to_none() {
        let log = record(json!({
            "type": "s",
            "details": {"request": "not-a-map", "error": {"type": 42, "message": "boom"}}
        }));
        assert_eq!(log.user_agent(), None);
        assert_eq!(log.error(), Some(("", "boom")));

        let log = record(json!({"type": "s", "details": "unexpected"}));
        assert!(log.details.is_none());
        assert_eq!(log.error(), None);
    }

    #[test]
    fn role_list_reports_remaining_pages() {
        let list: RoleList = serde_json::from_value(json!({
            "start": 0,
            "limit": 2,
            "total": 3,
            "roles": [
                {"id": "rol_1", "name": "Admin"},
                {"id": "rol_2", "name": "Reader", "description": "Read only"}
            ]
        }))
        .expect("role list should decode");
        let page = Page::from(list);
        assert!(page.has_more);
        assert_eq!(page.items[1].description.as_deref(), Some("Read only"));
    }
}
