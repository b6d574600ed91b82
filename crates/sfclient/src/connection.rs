//! Session management.
//!
//! A [`Connection`] holds the configuration, the server-confirmed session
//! context and, after [`Connection::connect`], the session tokens. Statements
//! borrow the connection they were created from.
//!
//! A connection and its statements are meant for one thread at a time. The
//! session context and the error record sit in `RefCell`s, so the type is not
//! `Sync` and the compiler enforces this.

use std::cell::{RefCell, RefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::Value;
use sfclient_core::{
    ConnectionError, ConnectionErrorKind, Error, ErrorRecord, ProtocolError, QueryError, Result,
    SqlState, codes,
};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::config::{AttributeKind, AttributeValue, ConnectionConfig, TransportConfig};
use crate::protocol::{
    self, ClientEnvironment, LoginData, LoginRequest, SessionParameters, fields, get_bool,
    get_code, get_str, headers, params,
};
use crate::statement::Statement;
use crate::transport::{HttpRequest, HttpTransport, Method, Transport};

/// Database, schema, warehouse and role as last confirmed by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    pub database: Option<String>,
    pub schema: Option<String>,
    pub warehouse: Option<String>,
    pub role: Option<String>,
}

impl SessionContext {
    fn from_config(config: &ConnectionConfig) -> Self {
        Self {
            database: config.database.clone(),
            schema: config.schema.clone(),
            warehouse: config.warehouse.clone(),
            role: config.role.clone(),
        }
    }

    /// Overwrite each field present in `object` under the given names.
    ///
    /// Returns the names that were missing; their old values are kept.
    pub(crate) fn refresh(
        &mut self,
        object: Option<&Value>,
        names: [&'static str; 4],
    ) -> Vec<&'static str> {
        let mut missing = Vec::new();
        let slots = [
            &mut self.database,
            &mut self.schema,
            &mut self.warehouse,
            &mut self.role,
        ];
        for (slot, name) in slots.into_iter().zip(names) {
            match get_str(object, name) {
                Ok(v) => *slot = Some(v.to_string()),
                Err(_) => missing.push(name),
            }
        }
        missing
    }
}

struct SessionTokens {
    token: Zeroizing<String>,
    master_token: Zeroizing<String>,
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No session tokens yet, or the last login failed
    Disconnected,
    /// Logged in; statements can be executed
    Connected,
}

/// An authenticated session.
pub struct Connection {
    config: ConnectionConfig,
    context: RefCell<SessionContext>,
    tokens: Option<SessionTokens>,
    /// Correlation id for login requests
    request_id: String,
    sequence_counter: AtomicU64,
    error: RefCell<ErrorRecord>,
    transport: Box<dyn Transport>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.state())
            .field("account", &self.config.account)
            .field("host", &self.config.effective_host())
            .field("request_id", &self.request_id)
            .field("context", &self.context.borrow())
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Create a connection with the default HTTPS transport.
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        Self::with_transport_config(config, &TransportConfig::default())
    }

    /// Create a connection with an HTTPS transport built from `transport`.
    pub fn with_transport_config(
        config: ConnectionConfig,
        transport: &TransportConfig,
    ) -> Result<Self> {
        let transport = HttpTransport::new(transport)?;
        Ok(Self::with_transport(config, transport))
    }

    /// Create a connection over any [`Transport`].
    pub fn with_transport(config: ConnectionConfig, transport: impl Transport + 'static) -> Self {
        Self {
            context: RefCell::new(SessionContext::from_config(&config)),
            config,
            tokens: None,
            request_id: Uuid::new_v4().to_string(),
            sequence_counter: AtomicU64::new(0),
            error: RefCell::new(ErrorRecord::new()),
            transport: Box::new(transport),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        if self.session_token().is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// The server-confirmed session context.
    pub fn context(&self) -> SessionContext {
        self.context.borrow().clone()
    }

    /// The last sequence number handed to a statement, 0 if none.
    pub fn sequence(&self) -> u64 {
        self.sequence_counter.load(Ordering::SeqCst)
    }

    /// A copy of the connection's error record.
    pub fn error(&self) -> ErrorRecord {
        self.error.borrow().clone()
    }

    /// Set one attribute.
    ///
    /// Fails with a bad-attribute error if the value does not fit the key;
    /// nothing is changed in that case.
    pub fn set_attribute(&mut self, kind: AttributeKind, value: AttributeValue) -> Result<()> {
        self.error.get_mut().clear();
        let result = self
            .config
            .apply(kind, value)
            .map_err(|e| attribute_error(e.to_string()));
        if result.is_ok() {
            let context = self.context.get_mut();
            match kind {
                AttributeKind::Database => context.database.clone_from(&self.config.database),
                AttributeKind::Schema => context.schema.clone_from(&self.config.schema),
                AttributeKind::Warehouse => context.warehouse.clone_from(&self.config.warehouse),
                AttributeKind::Role => context.role.clone_from(&self.config.role),
                _ => {}
            }
            tracing::trace!(attribute = %kind, "Attribute set");
        }
        self.record(result)
    }

    /// Set one attribute by its name, e.g. `"warehouse"`.
    pub fn set_attribute_by_name(&mut self, name: &str, value: AttributeValue) -> Result<()> {
        self.error.get_mut().clear();
        match name.parse::<AttributeKind>() {
            Ok(kind) => self.set_attribute(kind, value),
            Err(e) => self.record(Err(attribute_error(e.to_string()))),
        }
    }

    /// Read one attribute back.
    ///
    /// Password and passcode are never returned. Database, schema, warehouse
    /// and role reflect what the server last confirmed.
    pub fn get_attribute(&self, kind: AttributeKind) -> Option<AttributeValue> {
        self.error.borrow_mut().clear();
        let context = self.context.borrow();
        let text = |v: &Option<String>| v.clone().map(AttributeValue::Text);
        match kind {
            AttributeKind::Database => text(&context.database),
            AttributeKind::Schema => text(&context.schema),
            AttributeKind::Warehouse => text(&context.warehouse),
            AttributeKind::Role => text(&context.role),
            other => self.config.get(other),
        }
    }

    /// Log in and store the session tokens.
    ///
    /// The password and passcode are wiped when this returns, whatever the
    /// outcome; a second attempt needs them set again.
    #[tracing::instrument(level = "debug", skip(self), fields(account = ?self.config.account))]
    pub fn connect(&mut self) -> Result<()> {
        self.error.get_mut().clear();
        let result = self.login();
        self.config.wipe_credentials();
        if result.is_ok() {
            tracing::info!(
                account = ?self.config.account,
                request_id = %self.request_id,
                "Connected"
            );
        }
        self.record(result)
    }

    fn login(&mut self) -> Result<()> {
        let user = self.config.user.as_deref().unwrap_or_default();
        let account = self.config.account.as_deref().unwrap_or_default();
        if user.is_empty() || account.is_empty() {
            tracing::error!("Missing essential connection parameters");
            return Err(bad_parameters(
                "Missing essential connection parameters. Either user or account (or both) are missing",
            ));
        }
        let base_url = self.base_url()?;
        if self.config.insecure_mode {
            tracing::warn!("insecure_mode is set but has no effect: OCSP checks are not performed");
        }

        let passcode = self.config.passcode.as_ref().map(|p| p.as_str());
        let duo_method = (self.config.passcode_in_password || passcode.is_some())
            .then_some("passcode");
        let request = LoginRequest {
            data: LoginData {
                client_app_id: crate::CLIENT_APP_ID,
                client_app_version: crate::CLIENT_APP_VERSION,
                account_name: account,
                login_name: user,
                password: self.config.password.as_ref().map(|p| p.as_str()),
                authenticator: &self.config.authenticator,
                ext_authn_duo_method: duo_method,
                passcode: if self.config.passcode_in_password {
                    None
                } else {
                    passcode
                },
                client_environment: ClientEnvironment {
                    application: self
                        .config
                        .application
                        .as_deref()
                        .unwrap_or(crate::CLIENT_APP_ID),
                    os: std::env::consts::OS,
                },
                session_parameters: SessionParameters {
                    autocommit: self.config.autocommit,
                },
            },
        };
        let body = request.to_body().map_err(|e| {
            protocol_error("Failed to encode login request", SqlState::UNABLE_TO_CONNECT, Some(e))
        })?;
        tracing::debug!("Created login request body");

        let context = self.context.borrow().clone();
        let mut query = vec![(params::REQUEST_ID, self.request_id.as_str())];
        let optional = [
            (params::DATABASE, &context.database),
            (params::SCHEMA, &context.schema),
            (params::WAREHOUSE, &context.warehouse),
            (params::ROLE, &context.role),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                query.push((name, value.as_str()));
            }
        }

        let request = HttpRequest {
            method: Method::Post,
            url: format!("{}{}", base_url, protocol::LOGIN_PATH),
            query,
            headers: vec![
                (headers::CONTENT_TYPE, headers::APPLICATION_JSON),
                (headers::ACCEPT, headers::APPLICATION_SNOWFLAKE),
            ],
            body: Some(body.as_str()),
            timeout: non_zero(self.config.login_timeout),
        };
        let response = self.send_json(&request, SqlState::UNABLE_TO_CONNECT)?;
        drop(body);

        let success = get_bool(Some(&response), fields::SUCCESS).map_err(|e| {
            tracing::error!(error = %e, "Login response has no success flag");
            protocol_error("No valid JSON response", SqlState::UNABLE_TO_CONNECT, Some(e))
        })?;
        if !success {
            return Err(rejection(
                &response,
                SqlState::UNABLE_TO_CONNECT,
                None,
            ));
        }

        let data = response.get(fields::DATA);
        let token = get_str(data, fields::TOKEN).map_err(|e| missing_token(fields::TOKEN, e))?;
        let master_token =
            get_str(data, fields::MASTER_TOKEN).map_err(|e| missing_token(fields::MASTER_TOKEN, e))?;
        self.tokens = Some(SessionTokens {
            token: Zeroizing::new(token.to_string()),
            master_token: Zeroizing::new(master_token.to_string()),
        });

        let session_info = data.and_then(|d| d.get(fields::SESSION_INFO));
        let missing = self.context.get_mut().refresh(
            session_info,
            [
                fields::DATABASE_NAME,
                fields::SCHEMA_NAME,
                fields::WAREHOUSE_NAME,
                fields::ROLE_NAME,
            ],
        );
        if !missing.is_empty() {
            tracing::debug!(?missing, "Session info incomplete in login response");
        }
        Ok(())
    }

    /// Create a statement with the next sequence number.
    pub fn statement(&self) -> Statement<'_> {
        Statement::new(self)
    }

    /// Copy a statement's error record into this connection's record.
    pub fn propagate_error(&self, statement: &Statement<'_>) {
        *self.error.borrow_mut() = statement.error().clone();
    }

    /// Does nothing but clear the error record.
    pub fn begin(&self) -> Result<()> {
        self.error.borrow_mut().clear();
        Ok(())
    }

    /// Does nothing but clear the error record.
    pub fn commit(&self) -> Result<()> {
        self.error.borrow_mut().clear();
        Ok(())
    }

    /// Does nothing but clear the error record.
    pub fn rollback(&self) -> Result<()> {
        self.error.borrow_mut().clear();
        Ok(())
    }

    pub(crate) fn next_sequence(&self) -> u64 {
        self.sequence_counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// The session token, if both tokens are present and non-empty.
    pub(crate) fn session_token(&self) -> Option<&str> {
        self.tokens
            .as_ref()
            .filter(|t| !t.token.is_empty() && !t.master_token.is_empty())
            .map(|t| t.token.as_str())
    }

    pub(crate) fn context_mut(&self) -> RefMut<'_, SessionContext> {
        self.context.borrow_mut()
    }

    pub(crate) fn network_timeout(&self) -> Option<Duration> {
        non_zero(self.config.network_timeout)
    }

    pub(crate) fn base_url(&self) -> Result<String> {
        self.config
            .base_url()
            .ok_or_else(|| bad_parameters("Neither host nor account is set"))
    }

    /// Send a request and parse the 2xx response body as JSON.
    pub(crate) fn send_json(&self, request: &HttpRequest<'_>, sqlstate: SqlState) -> Result<Value> {
        let response = self.transport.send(request)?;
        if !response.is_success() {
            tracing::warn!(status = response.status, url = %request.url, "Unexpected HTTP status");
            return Err(Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Transport,
                message: format!("HTTP status {} from {}", response.status, request.url),
                source: None,
            }));
        }
        serde_json::from_str(&response.body)
            .map_err(|e| protocol_error("No valid JSON response", sqlstate, Some(e)))
    }

    fn record<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.error.borrow_mut().set(e);
        }
        result
    }
}

fn non_zero(d: Duration) -> Option<Duration> {
    (!d.is_zero()).then_some(d)
}

/// Build the error for a `success: false` response.
pub(crate) fn rejection(response: &Value, sqlstate: SqlState, query_id: Option<&str>) -> Error {
    let code = get_code(Some(response), fields::CODE).unwrap_or_else(|| {
        tracing::debug!("No code element in response");
        codes::UNKNOWN_SERVER_CODE
    });
    let message = get_str(Some(response), fields::MESSAGE)
        .unwrap_or(protocol::DEFAULT_FAILURE_MESSAGE)
        .to_string();
    Error::Query(QueryError {
        code,
        message,
        sqlstate,
        query_id: query_id.filter(|id| !id.is_empty()).map(str::to_string),
    })
}

pub(crate) fn protocol_error(
    msg: impl Into<String>,
    sqlstate: SqlState,
    source: Option<impl std::error::Error + Send + Sync + 'static>,
) -> Error {
    Error::Protocol(ProtocolError {
        message: msg.into(),
        sqlstate,
        query_id: None,
        source: source.map(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
    })
}

pub(crate) fn bad_parameters(msg: impl Into<String>) -> Error {
    Error::Connection(ConnectionError {
        kind: ConnectionErrorKind::BadParameters,
        message: msg.into(),
        source: None,
    })
}

fn attribute_error(msg: impl Into<String>) -> Error {
    Error::Connection(ConnectionError {
        kind: ConnectionErrorKind::BadAttribute,
        message: msg.into(),
        source: None,
    })
}

fn missing_token(name: &str, err: protocol::JsonError) -> Error {
    tracing::error!(field = name, "Login response has no session token");
    protocol_error(
        format!("Missing {name} in login response"),
        SqlState::UNABLE_TO_CONNECT,
        Some(err),
    )
}
