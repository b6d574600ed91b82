//! HTTP transport.
//!
//! The driver talks to the service through the [`Transport`] trait so the
//! session and statement logic can run against a scripted transport in
//! tests. [`HttpTransport`] is the production implementation on top of a
//! blocking `reqwest` client with rustls.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use sfclient_core::{ConnectionError, ConnectionErrorKind, Error};

use crate::config::{TlsVersion, TransportConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One outgoing request. Borrowed parts stay owned by the caller so that
/// credentials in the body can be wiped after the call.
pub struct HttpRequest<'a> {
    pub method: Method,
    /// Full URL without the query string
    pub url: String,
    pub query: Vec<(&'static str, &'a str)>,
    pub headers: Vec<(&'static str, &'a str)>,
    pub body: Option<&'a str>,
    /// Per-request timeout, `None` for no limit
    pub timeout: Option<Duration>,
}

impl fmt::Debug for HttpRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: Vec<(&str, &str)> = self
            .headers
            .iter()
            .map(|&(name, value)| {
                if name.eq_ignore_ascii_case(crate::protocol::headers::AUTHORIZATION) {
                    (name, "<redacted>")
                } else {
                    (name, value)
                }
            })
            .collect();
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("query", &self.query)
            .field("headers", &headers)
            .field("body_len", &self.body.map(str::len))
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The request did not complete in time
    Timeout,
    /// Connection, TLS or I/O failure
    Io,
    /// The transport could not be built from its configuration
    Setup,
}

#[derive(Debug)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|err| err as &(dyn std::error::Error + 'static))
    }
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        let kind = match err.kind {
            TransportErrorKind::Timeout => ConnectionErrorKind::Timeout,
            TransportErrorKind::Io | TransportErrorKind::Setup => ConnectionErrorKind::Transport,
        };
        Error::Connection(ConnectionError {
            kind,
            message: err.message.clone(),
            source: Some(Box::new(err)),
        })
    }
}

/// Sends one request and returns the status and body.
///
/// Non-2xx statuses are returned as responses, not errors.
pub trait Transport: Send + Sync {
    fn send(&self, request: &HttpRequest<'_>) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, request: &HttpRequest<'_>) -> Result<HttpResponse, TransportError> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&self, request: &HttpRequest<'_>) -> Result<HttpResponse, TransportError> {
        (**self).send(request)
    }
}

/// Blocking HTTPS transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Build a client from the given settings.
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let mut builder = reqwest::blocking::Client::builder()
            .use_rustls_tls()
            .user_agent(config.user_agent.clone())
            .danger_accept_invalid_certs(config.disable_verify_peer)
            .min_tls_version(match config.min_tls_version {
                TlsVersion::Tls12 => reqwest::tls::Version::TLS_1_2,
                TlsVersion::Tls13 => reqwest::tls::Version::TLS_1_3,
            })
            // Timeouts are set per request.
            .timeout(None::<Duration>);

        if let Some(path) = &config.ca_bundle_file {
            let pem = std::fs::read(path).map_err(|e| TransportError {
                kind: TransportErrorKind::Setup,
                message: format!("Failed to read CA bundle {}: {}", path.display(), e),
                source: Some(Box::new(e)),
            })?;
            let certs = reqwest::Certificate::from_pem_bundle(&pem).map_err(|e| TransportError {
                kind: TransportErrorKind::Setup,
                message: format!("Invalid CA bundle {}: {}", path.display(), e),
                source: Some(Box::new(e)),
            })?;
            tracing::debug!(path = %path.display(), count = certs.len(), "Loaded CA bundle");
            for cert in certs {
                builder = builder.add_root_certificate(cert);
            }
        }

        if config.disable_verify_peer {
            tracing::warn!("Server certificate verification is disabled");
        }

        let client = builder.build().map_err(|e| TransportError {
            kind: TransportErrorKind::Setup,
            message: format!("Failed to build HTTP client: {}", e),
            source: Some(Box::new(e)),
        })?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &HttpRequest<'_>) -> Result<HttpResponse, TransportError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };
        tracing::trace!(url = %request.url, method = ?request.method, "Sending request");

        let mut builder = self
            .client
            .request(method, &request.url)
            .query(&request.query);
        for (name, value) in &request.headers {
            builder = builder.header(*name, *value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body.to_string());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().map_err(request_error)?;
        let status = response.status().as_u16();
        let body = response.text().map_err(request_error)?;
        tracing::trace!(status, bytes = body.len(), "Received response");
        Ok(HttpResponse { status, body })
    }
}

fn request_error(err: reqwest::Error) -> TransportError {
    let kind = if err.is_timeout() {
        TransportErrorKind::Timeout
    } else {
        TransportErrorKind::Io
    };
    TransportError {
        kind,
        message: format!("HTTP request failed: {}", err),
        source: Some(Box::new(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sfclient_core::codes;

    #[test]
    fn test_request_debug_hides_credentials() {
        let request = HttpRequest {
            method: Method::Post,
            url: "https://acme.example.com/session/v1/login-request".to_string(),
            query: vec![("request_id", "r-1")],
            headers: vec![
                ("Accept", "application/snowflake"),
                ("Authorization", "Snowflake Token=\"tok-123\""),
            ],
            body: Some(r#"{"data":{"PASSWORD":"hunter2"}}"#),
            timeout: None,
        };
        let printed = format!("{request:?}");
        assert!(!printed.contains("tok-123"));
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("<redacted>"));
        assert!(printed.contains("application/snowflake"));
        assert!(printed.contains("r-1"));
    }

    #[test]
    fn test_error_mapping() {
        let err: Error = TransportError::new(TransportErrorKind::Timeout, "timed out").into();
        assert_eq!(err.code(), codes::REQUEST_TIMEOUT);
        assert!(err.is_retryable());

        let err: Error = TransportError::new(TransportErrorKind::Io, "reset").into();
        assert_eq!(err.code(), codes::TRANSPORT);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_response_status() {
        let ok = HttpResponse {
            status: 200,
            body: String::new(),
        };
        let bad = HttpResponse {
            status: 503,
            body: String::new(),
        };
        assert!(ok.is_success());
        assert!(!bad.is_success());
    }

    #[test]
    fn test_build_default_transport() {
        assert!(HttpTransport::new(&TransportConfig::default()).is_ok());
    }

    #[test]
    fn test_missing_ca_bundle() {
        let config = TransportConfig::new().ca_bundle_file("/nonexistent/ca.pem");
        let err = HttpTransport::new(&config).unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::Setup);
    }
}
