//! Client core for a SQL service reachable over HTTPS/JSON.
//!
//! This crate drives an authenticated session and the statement lifecycle
//! over it:
//!
//! - Login with account, user and password (optionally a one-time passcode)
//! - Positional parameter binding with typed input values
//! - Typed output buffers filled row by row, all-or-nothing
//! - A per-handle error record that can be copied from a statement to its
//!   connection
//!
//! # Protocol Overview
//!
//! Every exchange is one `POST` with a JSON body:
//! - `/session/v1/login-request` returns the session token pair
//! - `/queries/v1/query-request` returns column metadata and all result
//!   rows as JSON text, which are queued on the statement and converted on
//!   fetch
//!
//! # Example
//!
//! ```rust,ignore
//! use sfclient::{Connection, ConnectionConfig, FetchStatus, NativeType, OutputBuffer};
//!
//! let config = ConnectionConfig::new()
//!     .account("acme")
//!     .user("loader")
//!     .password("secret")
//!     .warehouse("LOAD_WH");
//!
//! let mut conn = Connection::new(config)?;
//! conn.connect()?;
//!
//! let mut stmt = conn.statement();
//! stmt.prepare("select id from orders where region = ?")?;
//! stmt.bind_param(1, "EMEA")?;
//! stmt.bind_result(1, OutputBuffer::new(NativeType::Int64))?;
//! stmt.execute()?;
//! while stmt.fetch()? == FetchStatus::Row {
//!     println!("{:?}", stmt.result(1).and_then(OutputBuffer::as_i64));
//! }
//! ```

pub mod config;
pub mod connection;
pub mod logging;
pub mod protocol;
pub mod statement;
pub mod transport;
pub mod types;

pub use config::{
    AttributeError, AttributeKind, AttributeValue, ConnectionConfig, TlsVersion, TransportConfig,
};
pub use connection::{Connection, ConnectionState, SessionContext};
pub use statement::{FetchStatus, Statement, StatementState};
pub use transport::{
    HttpRequest, HttpResponse, HttpTransport, Method, Transport, TransportError,
    TransportErrorKind,
};
pub use types::{ColumnDesc, WireType};

pub use sfclient_core::{
    Error, ErrorRecord, InputValue, NativeType, OutputBuffer, OutputValue, Result, SqlState,
    Timestamp, codes,
};

/// Client application id sent on login.
pub const CLIENT_APP_ID: &str = "C API";

/// Client application version sent on login.
pub const CLIENT_APP_VERSION: &str = "0.1";

/// Default `User-Agent` header.
pub const USER_AGENT: &str = concat!("sfclient/", env!("CARGO_PKG_VERSION"));
