//! Connection and transport configuration.
//!
//! [`ConnectionConfig`] carries the per-connection parameters (endpoint,
//! credentials, session context, timeouts). [`TransportConfig`] carries the
//! TLS settings handed to the HTTP transport when it is built.
//! [`AttributeKind`] and [`AttributeValue`] are the enumerated attribute
//! interface used by `Connection::set_attribute`.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use zeroize::Zeroizing;

/// Host suffix used when only an account name is configured.
pub const DEFAULT_HOST_SUFFIX: &str = "snowflakecomputing.com";

/// Default authenticator name.
pub const DEFAULT_AUTHENTICATOR: &str = "snowflake";

/// Minimum TLS protocol version accepted by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsVersion {
    #[default]
    Tls12,
    Tls13,
}

/// Settings for building the HTTP transport.
///
/// Built once and never changed afterwards; a transport built from it keeps
/// its own copy of everything it needs.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Skip server certificate verification
    pub disable_verify_peer: bool,
    /// Extra PEM bundle of trusted root certificates
    pub ca_bundle_file: Option<PathBuf>,
    pub min_tls_version: TlsVersion,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            disable_verify_peer: false,
            ca_bundle_file: None,
            min_tls_version: TlsVersion::default(),
            user_agent: crate::USER_AGENT.to_string(),
        }
    }
}

impl TransportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable certificate verification.
    ///
    /// # Security Warning
    /// Only use this against test servers you control.
    pub fn disable_verify_peer(mut self, disable: bool) -> Self {
        self.disable_verify_peer = disable;
        self
    }

    pub fn ca_bundle_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_bundle_file = Some(path.into());
        self
    }

    pub fn min_tls_version(mut self, version: TlsVersion) -> Self {
        self.min_tls_version = version;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }
}

/// Connection parameters.
///
/// Password and passcode are wiped from memory when replaced, when the
/// config is dropped, and when a connect attempt finishes.
#[derive(Clone)]
pub struct ConnectionConfig {
    /// Hostname; derived from the account when unset
    pub host: Option<String>,
    /// Port; derived from the protocol when unset
    pub port: Option<u16>,
    /// URL scheme (default: https)
    pub protocol: String,
    pub account: Option<String>,
    pub user: Option<String>,
    pub password: Option<Zeroizing<String>>,
    /// One-time passcode for multi-factor login
    pub passcode: Option<Zeroizing<String>>,
    /// The passcode is appended to the password instead of sent separately
    pub passcode_in_password: bool,
    pub database: Option<String>,
    pub schema: Option<String>,
    pub warehouse: Option<String>,
    pub role: Option<String>,
    /// Application name reported to the server
    pub application: Option<String>,
    pub authenticator: String,
    /// Skip certificate revocation (OCSP) checks. The HTTPS transport does
    /// not perform OCSP checks, so this changes nothing on the wire.
    pub insecure_mode: bool,
    pub login_timeout: Duration,
    /// Per-request timeout for queries, zero for none
    pub network_timeout: Duration,
    pub autocommit: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            protocol: "https".to_string(),
            account: None,
            user: None,
            password: None,
            passcode: None,
            passcode_in_password: false,
            database: None,
            schema: None,
            warehouse: None,
            role: None,
            application: None,
            authenticator: DEFAULT_AUTHENTICATOR.to_string(),
            insecure_mode: false,
            login_timeout: Duration::from_secs(120),
            network_timeout: Duration::ZERO,
            autocommit: false,
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("protocol", &self.protocol)
            .field("account", &self.account)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("passcode", &self.passcode.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("warehouse", &self.warehouse)
            .field("role", &self.role)
            .field("login_timeout", &self.login_timeout)
            .field("network_timeout", &self.network_timeout)
            .finish_non_exhaustive()
    }
}

impl ConnectionConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    pub fn account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(Zeroizing::new(password.into()));
        self
    }

    pub fn passcode(mut self, passcode: impl Into<String>) -> Self {
        self.passcode = Some(Zeroizing::new(passcode.into()));
        self
    }

    pub fn passcode_in_password(mut self, enabled: bool) -> Self {
        self.passcode_in_password = enabled;
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn warehouse(mut self, warehouse: impl Into<String>) -> Self {
        self.warehouse = Some(warehouse.into());
        self
    }

    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn application(mut self, application: impl Into<String>) -> Self {
        self.application = Some(application.into());
        self
    }

    pub fn insecure_mode(mut self, enabled: bool) -> Self {
        self.insecure_mode = enabled;
        self
    }

    pub fn login_timeout(mut self, timeout: Duration) -> Self {
        self.login_timeout = timeout;
        self
    }

    pub fn network_timeout(mut self, timeout: Duration) -> Self {
        self.network_timeout = timeout;
        self
    }

    pub fn autocommit(mut self, enabled: bool) -> Self {
        self.autocommit = enabled;
        self
    }

    /// Host to connect to: the configured one, or `<account>.snowflakecomputing.com`.
    pub fn effective_host(&self) -> Option<String> {
        match (&self.host, &self.account) {
            (Some(host), _) if !host.is_empty() => Some(host.clone()),
            (_, Some(account)) if !account.is_empty() => {
                Some(format!("{}.{}", account, DEFAULT_HOST_SUFFIX))
            }
            _ => None,
        }
    }

    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or(if self.protocol.eq_ignore_ascii_case("http") {
            80
        } else {
            443
        })
    }

    /// Base URL for all endpoints, e.g. `https://acme.snowflakecomputing.com:443`.
    pub fn base_url(&self) -> Option<String> {
        let host = self.effective_host()?;
        Some(format!(
            "{}://{}:{}",
            self.protocol,
            host,
            self.effective_port()
        ))
    }

    /// Overwrite and drop the password and passcode.
    pub fn wipe_credentials(&mut self) {
        // Zeroizing clears the buffers as they drop.
        self.password = None;
        self.passcode = None;
    }

    /// Apply one attribute. Leaves the config untouched on error.
    pub(crate) fn apply(
        &mut self,
        kind: AttributeKind,
        value: AttributeValue,
    ) -> Result<(), AttributeError> {
        match (kind, value) {
            (AttributeKind::Account, AttributeValue::Text(v)) => self.account = Some(v),
            (AttributeKind::User, AttributeValue::Text(v)) => self.user = Some(v),
            (AttributeKind::Password, AttributeValue::Text(v)) => {
                self.password = Some(Zeroizing::new(v));
            }
            (AttributeKind::Passcode, AttributeValue::Text(v)) => {
                self.passcode = Some(Zeroizing::new(v));
            }
            (AttributeKind::Database, AttributeValue::Text(v)) => self.database = Some(v),
            (AttributeKind::Schema, AttributeValue::Text(v)) => self.schema = Some(v),
            (AttributeKind::Warehouse, AttributeValue::Text(v)) => self.warehouse = Some(v),
            (AttributeKind::Role, AttributeValue::Text(v)) => self.role = Some(v),
            (AttributeKind::Host, AttributeValue::Text(v)) => self.host = Some(v),
            (AttributeKind::Port, AttributeValue::Text(v)) => {
                self.port = Some(v.parse().map_err(|_| AttributeError::value(kind))?);
            }
            (AttributeKind::Port, AttributeValue::Int(v)) => {
                self.port = Some(u16::try_from(v).map_err(|_| AttributeError::value(kind))?);
            }
            (AttributeKind::Protocol, AttributeValue::Text(v)) => self.protocol = v,
            (AttributeKind::PasscodeInPassword, AttributeValue::Bool(v)) => {
                self.passcode_in_password = v;
            }
            (AttributeKind::Application, AttributeValue::Text(v)) => self.application = Some(v),
            (AttributeKind::Authenticator, AttributeValue::Text(v)) => self.authenticator = v,
            (AttributeKind::InsecureMode, AttributeValue::Bool(v)) => self.insecure_mode = v,
            (AttributeKind::LoginTimeout, AttributeValue::Int(v)) => {
                self.login_timeout = seconds(kind, v)?;
            }
            (AttributeKind::NetworkTimeout, AttributeValue::Int(v)) => {
                self.network_timeout = seconds(kind, v)?;
            }
            (AttributeKind::Autocommit, AttributeValue::Bool(v)) => self.autocommit = v,
            (kind, _) => return Err(AttributeError::value(kind)),
        }
        Ok(())
    }

    /// Read one attribute back. Secrets are never returned.
    pub(crate) fn get(&self, kind: AttributeKind) -> Option<AttributeValue> {
        let text = |v: &Option<String>| v.clone().map(AttributeValue::Text);
        match kind {
            AttributeKind::Account => text(&self.account),
            AttributeKind::User => text(&self.user),
            AttributeKind::Password | AttributeKind::Passcode => None,
            AttributeKind::Database => text(&self.database),
            AttributeKind::Schema => text(&self.schema),
            AttributeKind::Warehouse => text(&self.warehouse),
            AttributeKind::Role => text(&self.role),
            AttributeKind::Host => self.effective_host().map(AttributeValue::Text),
            AttributeKind::Port => Some(AttributeValue::Int(i64::from(self.effective_port()))),
            AttributeKind::Protocol => Some(AttributeValue::Text(self.protocol.clone())),
            AttributeKind::PasscodeInPassword => {
                Some(AttributeValue::Bool(self.passcode_in_password))
            }
            AttributeKind::Application => text(&self.application),
            AttributeKind::Authenticator => Some(AttributeValue::Text(self.authenticator.clone())),
            AttributeKind::InsecureMode => Some(AttributeValue::Bool(self.insecure_mode)),
            AttributeKind::LoginTimeout => Some(AttributeValue::Int(duration_secs(
                self.login_timeout,
            ))),
            AttributeKind::NetworkTimeout => Some(AttributeValue::Int(duration_secs(
                self.network_timeout,
            ))),
            AttributeKind::Autocommit => Some(AttributeValue::Bool(self.autocommit)),
        }
    }
}

fn seconds(kind: AttributeKind, v: i64) -> Result<Duration, AttributeError> {
    u64::try_from(v)
        .map(Duration::from_secs)
        .map_err(|_| AttributeError::value(kind))
}

fn duration_secs(d: Duration) -> i64 {
    i64::try_from(d.as_secs()).unwrap_or(i64::MAX)
}

/// Enumerated connection attribute keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Account,
    User,
    Password,
    Database,
    Schema,
    Warehouse,
    Role,
    Host,
    Port,
    Protocol,
    Passcode,
    PasscodeInPassword,
    Application,
    Authenticator,
    InsecureMode,
    LoginTimeout,
    NetworkTimeout,
    Autocommit,
}

impl AttributeKind {
    pub const ALL: [AttributeKind; 18] = [
        AttributeKind::Account,
        AttributeKind::User,
        AttributeKind::Password,
        AttributeKind::Database,
        AttributeKind::Schema,
        AttributeKind::Warehouse,
        AttributeKind::Role,
        AttributeKind::Host,
        AttributeKind::Port,
        AttributeKind::Protocol,
        AttributeKind::Passcode,
        AttributeKind::PasscodeInPassword,
        AttributeKind::Application,
        AttributeKind::Authenticator,
        AttributeKind::InsecureMode,
        AttributeKind::LoginTimeout,
        AttributeKind::NetworkTimeout,
        AttributeKind::Autocommit,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            AttributeKind::Account => "account",
            AttributeKind::User => "user",
            AttributeKind::Password => "password",
            AttributeKind::Database => "database",
            AttributeKind::Schema => "schema",
            AttributeKind::Warehouse => "warehouse",
            AttributeKind::Role => "role",
            AttributeKind::Host => "host",
            AttributeKind::Port => "port",
            AttributeKind::Protocol => "protocol",
            AttributeKind::Passcode => "passcode",
            AttributeKind::PasscodeInPassword => "passcode_in_password",
            AttributeKind::Application => "application",
            AttributeKind::Authenticator => "authenticator",
            AttributeKind::InsecureMode => "insecure_mode",
            AttributeKind::LoginTimeout => "login_timeout",
            AttributeKind::NetworkTimeout => "network_timeout",
            AttributeKind::Autocommit => "autocommit",
        }
    }
}

impl FromStr for AttributeKind {
    type Err = AttributeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AttributeKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| AttributeError {
                reason: format!("Invalid attribute type: {s}"),
            })
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value passed to `Connection::set_attribute`.
#[derive(Clone, PartialEq, Eq)]
pub enum AttributeValue {
    Text(String),
    Bool(bool),
    Int(i64),
}

impl fmt::Debug for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Text values may be secrets.
            AttributeValue::Text(_) => f.write_str("Text(..)"),
            AttributeValue::Bool(v) => f.debug_tuple("Bool").field(v).finish(),
            AttributeValue::Int(v) => f.debug_tuple("Int").field(v).finish(),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::Text(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::Text(v)
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Bool(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Int(v)
    }
}

/// Unknown attribute key, or a value that does not fit the key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeError {
    pub(crate) reason: String,
}

impl AttributeError {
    fn value(kind: AttributeKind) -> Self {
        Self {
            reason: format!("Invalid value for attribute {kind}"),
        }
    }
}

impl std::error::Error for AttributeError {}

impl fmt::Display for AttributeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}
