//! Request bodies.

use std::collections::BTreeMap;

use serde::Serialize;
use zeroize::Zeroizing;

/// Login request body: `{"data": {...}}`.
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub data: LoginData<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct LoginData<'a> {
    pub client_app_id: &'a str,
    pub client_app_version: &'a str,
    pub account_name: &'a str,
    pub login_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<&'a str>,
    pub authenticator: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext_authn_duo_method: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passcode: Option<&'a str>,
    pub client_environment: ClientEnvironment<'a>,
    pub session_parameters: SessionParameters,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ClientEnvironment<'a> {
    pub application: &'a str,
    pub os: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct SessionParameters {
    pub autocommit: bool,
}

impl LoginRequest<'_> {
    /// Serialize into a buffer that is wiped on drop, since it holds credentials.
    pub fn to_body(&self) -> serde_json::Result<Zeroizing<String>> {
        serde_json::to_string(self).map(Zeroizing::new)
    }
}

/// Query request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest<'a> {
    pub sql_text: &'a str,
    pub sequence_id: u64,
    /// Keyed by the 1-based parameter index
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub bindings: BTreeMap<String, Binding>,
}

impl QueryRequest<'_> {
    pub fn to_body(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// One bound parameter; `value: null` is SQL NULL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Binding {
    #[serde(rename = "type")]
    pub type_name: &'static str,
    pub value: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn login<'a>(password: Option<&'a str>, passcode: Option<&'a str>) -> LoginRequest<'a> {
        LoginRequest {
            data: LoginData {
                client_app_id: "sfclient",
                client_app_version: "0.1.0",
                account_name: "acme",
                login_name: "loader",
                password,
                authenticator: "snowflake",
                ext_authn_duo_method: passcode.map(|_| "passcode"),
                passcode,
                client_environment: ClientEnvironment {
                    application: "sfclient",
                    os: "linux",
                },
                session_parameters: SessionParameters { autocommit: false },
            },
        }
    }

    #[test]
    fn test_login_body_shape() {
        let body = login(Some("pw"), None).to_body().unwrap();
        let v: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(
            v,
            json!({"data": {
                "CLIENT_APP_ID": "sfclient",
                "CLIENT_APP_VERSION": "0.1.0",
                "ACCOUNT_NAME": "acme",
                "LOGIN_NAME": "loader",
                "PASSWORD": "pw",
                "AUTHENTICATOR": "snowflake",
                "CLIENT_ENVIRONMENT": {"APPLICATION": "sfclient", "OS": "linux"},
                "SESSION_PARAMETERS": {"AUTOCOMMIT": false},
            }})
        );
    }

    #[test]
    fn test_login_body_with_passcode() {
        let body = login(None, Some("123456")).to_body().unwrap();
        let v: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(v["data"]["EXT_AUTHN_DUO_METHOD"], "passcode");
        assert_eq!(v["data"]["PASSCODE"], "123456");
        assert!(v["data"].get("PASSWORD").is_none());
    }

    #[test]
    fn test_query_body_without_bindings() {
        let req = QueryRequest {
            sql_text: "select 1",
            sequence_id: 3,
            bindings: BTreeMap::new(),
        };
        let v: Value = serde_json::from_str(&req.to_body().unwrap()).unwrap();
        assert_eq!(v, json!({"sqlText": "select 1", "sequenceId": 3}));
    }

    #[test]
    fn test_query_body_with_bindings() {
        let mut bindings = BTreeMap::new();
        bindings.insert(
            "1".to_string(),
            Binding {
                type_name: "FIXED",
                value: Some("42".to_string()),
            },
        );
        bindings.insert(
            "2".to_string(),
            Binding {
                type_name: "TEXT",
                value: None,
            },
        );
        let req = QueryRequest {
            sql_text: "insert into t values (?, ?)",
            sequence_id: 1,
            bindings,
        };
        let v: Value = serde_json::from_str(&req.to_body().unwrap()).unwrap();
        assert_eq!(v["bindings"]["1"], json!({"type": "FIXED", "value": "42"}));
        assert_eq!(v["bindings"]["2"], json!({"type": "TEXT", "value": null}));
    }
}
