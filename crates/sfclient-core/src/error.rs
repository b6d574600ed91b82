//! Error types for sfclient operations.
//!
//! Two layers live here:
//!
//! - [`Error`], the value returned in `Err` by every fallible operation.
//! - [`ErrorRecord`], the flattened copy a connection or statement handle keeps
//!   so the last failure can be inspected after the call returned.

use std::fmt;

use crate::types::NativeType;

/// Numeric error codes reported by the client itself.
///
/// Errors rejected by the server carry the server-assigned code instead.
pub mod codes {
    /// No error.
    pub const NONE: i64 = 0;
    pub const REQUEST_TIMEOUT: i64 = 240_001;
    pub const DATA_CONVERSION: i64 = 240_002;
    pub const BAD_ATTRIBUTE_TYPE: i64 = 240_003;
    pub const BAD_CONNECTION_PARAMS: i64 = 240_004;
    pub const BAD_REQUEST: i64 = 240_007;
    pub const BAD_JSON: i64 = 240_008;
    pub const TRANSPORT: i64 = 240_010;
    pub const TYPE_MISMATCH: i64 = 240_011;
    /// Code used when the server rejected a request without sending one.
    pub const UNKNOWN_SERVER_CODE: i64 = -1;
}

/// A five character SQL-state code.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SqlState([u8; 5]);

impl SqlState {
    pub const SUCCESS: SqlState = SqlState(*b"00000");
    pub const UNABLE_TO_CONNECT: SqlState = SqlState(*b"08001");
    pub const APP_REJECT_CONNECTION: SqlState = SqlState(*b"08004");
    pub const INVALID_BUFFER_TYPE: SqlState = SqlState(*b"HY003");
    pub const GENERAL_ERROR: SqlState = SqlState(*b"HY000");

    /// Parse a SQL-state from text.
    ///
    /// Returns `None` unless the text is exactly five ASCII alphanumerics.
    pub fn parse(text: &str) -> Option<Self> {
        let bytes = text.as_bytes();
        if bytes.len() != 5 || !bytes.iter().all(u8::is_ascii_alphanumeric) {
            return None;
        }
        let mut code = [0u8; 5];
        code.copy_from_slice(bytes);
        Some(SqlState(code))
    }

    pub fn as_str(&self) -> &str {
        // Only ever built from ASCII bytes.
        std::str::from_utf8(&self.0).unwrap_or("HY000")
    }

    pub fn is_success(&self) -> bool {
        *self == Self::SUCCESS
    }
}

impl Default for SqlState {
    fn default() -> Self {
        Self::SUCCESS
    }
}

impl fmt::Display for SqlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for SqlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SqlState").field(&self.as_str()).finish()
    }
}

/// The primary error type for all sfclient operations.
#[derive(Debug)]
pub enum Error {
    /// Configuration, credential and transport failures
    Connection(ConnectionError),
    /// The server answered `success: false`
    Query(QueryError),
    /// The response was not JSON or did not have the expected shape
    Protocol(ProtocolError),
    /// A bound output buffer cannot receive a column value
    Type(TypeError),
    /// The statement handle was used out of order
    Statement(StatementError),
}

#[derive(Debug)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Required credentials or session tokens are missing
    BadParameters,
    /// Unknown attribute key, or a value of the wrong shape for it
    BadAttribute,
    /// The HTTP exchange failed
    Transport,
    /// The HTTP exchange timed out
    Timeout,
}

#[derive(Debug)]
pub struct QueryError {
    /// Server-assigned code, `-1` if the server sent none
    pub code: i64,
    pub message: String,
    pub sqlstate: SqlState,
    pub query_id: Option<String>,
}

#[derive(Debug)]
pub struct ProtocolError {
    pub message: String,
    pub sqlstate: SqlState,
    pub query_id: Option<String>,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug)]
pub struct TypeError {
    pub kind: TypeErrorKind,
    /// 1-based column index
    pub column: usize,
    pub expected: NativeType,
    pub actual: NativeType,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeErrorKind {
    /// The output binding type is neither the column's native type nor string
    Mismatch,
    /// The wire text could not be converted to the native type
    Conversion,
}

#[derive(Debug)]
pub struct StatementError {
    pub kind: StatementErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementErrorKind {
    /// Execute called without SQL text
    NotPrepared,
    /// Bind index outside the 1-based range
    InvalidIndex,
    /// SQL text is not valid UTF-8 or the length is out of range
    InvalidSqlText,
    /// No result row is available for the requested operation
    NoResult,
}

impl Error {
    /// The numeric code reported for this error.
    pub fn code(&self) -> i64 {
        match self {
            Error::Connection(e) => match e.kind {
                ConnectionErrorKind::BadParameters => codes::BAD_CONNECTION_PARAMS,
                ConnectionErrorKind::BadAttribute => codes::BAD_ATTRIBUTE_TYPE,
                ConnectionErrorKind::Transport => codes::TRANSPORT,
                ConnectionErrorKind::Timeout => codes::REQUEST_TIMEOUT,
            },
            Error::Query(e) => e.code,
            Error::Protocol(_) => codes::BAD_JSON,
            Error::Type(e) => match e.kind {
                TypeErrorKind::Mismatch => codes::TYPE_MISMATCH,
                TypeErrorKind::Conversion => codes::DATA_CONVERSION,
            },
            Error::Statement(_) => codes::BAD_REQUEST,
        }
    }

    /// The SQL-state reported for this error.
    pub fn sqlstate(&self) -> SqlState {
        match self {
            Error::Connection(_) => SqlState::UNABLE_TO_CONNECT,
            Error::Query(e) => e.sqlstate,
            Error::Protocol(e) => e.sqlstate,
            Error::Type(_) => SqlState::INVALID_BUFFER_TYPE,
            Error::Statement(_) => SqlState::GENERAL_ERROR,
        }
    }

    /// The query id the server assigned to the failing execution, if any.
    pub fn query_id(&self) -> Option<&str> {
        match self {
            Error::Query(e) => e.query_id.as_deref(),
            Error::Protocol(e) => e.query_id.as_deref(),
            _ => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Error::Connection(e) => &e.message,
            Error::Query(e) => &e.message,
            Error::Protocol(e) => &e.message,
            Error::Type(e) => &e.message,
            Error::Statement(e) => &e.message,
        }
    }

    /// Is this the server turning the request down?
    pub fn is_server_rejection(&self) -> bool {
        matches!(self, Error::Query(_))
    }

    /// Is this a transport failure that might succeed on another attempt?
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Transport | ConnectionErrorKind::Timeout,
                ..
            })
        )
    }

    /// Attach a query id to errors that can carry one and do not have one yet.
    #[must_use]
    pub fn with_query_id(mut self, id: &str) -> Self {
        if id.is_empty() {
            return self;
        }
        match &mut self {
            Error::Query(e) if e.query_id.is_none() => e.query_id = Some(id.to_string()),
            Error::Protocol(e) if e.query_id.is_none() => e.query_id = Some(id.to_string()),
            _ => {}
        }
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(e) => write!(f, "Connection error: {}", e.message),
            Error::Query(e) => write!(f, "Query error: {}", e),
            Error::Protocol(e) => write!(f, "Protocol error: {}", e.message),
            Error::Type(e) => write!(f, "Type error: {}", e),
            Error::Statement(e) => write!(f, "Statement error: {}", e.message),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connection(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Protocol(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {}, SQLSTATE {})", self.message, self.code, self.sqlstate)?;
        if let Some(id) = &self.query_id {
            write!(f, " [query id {}]", id)?;
        }
        Ok(())
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "column {}: {} (binding {}, column {})",
            self.column,
            self.message,
            self.expected.name(),
            self.actual.name()
        )
    }
}

impl fmt::Display for StatementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Error::Connection(err)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<ProtocolError> for Error {
    fn from(err: ProtocolError) -> Self {
        Error::Protocol(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<StatementError> for Error {
    fn from(err: StatementError) -> Self {
        Error::Statement(err)
    }
}

/// Result type alias for sfclient operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The last error seen on a connection or statement handle.
///
/// Every fallible operation clears its handle's record on entry and fills it
/// on failure, so a record never describes anything but the latest call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorRecord {
    code: i64,
    message: Option<String>,
    sqlstate: SqlState,
    query_id: Option<String>,
}

impl ErrorRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Replace the record with the contents of `err`.
    pub fn set(&mut self, err: &Error) {
        self.code = err.code();
        self.message = Some(err.message().to_string());
        self.sqlstate = err.sqlstate();
        self.query_id = err.query_id().map(str::to_string);
    }

    /// Fill in the query id if the error did not bring one.
    pub fn set_query_id_if_missing(&mut self, id: &str) {
        if self.query_id.is_none() && !id.is_empty() {
            self.query_id = Some(id.to_string());
        }
    }

    /// True once an error was stored, even one whose server code is 0.
    pub fn is_set(&self) -> bool {
        self.code != codes::NONE || self.message.is_some()
    }

    pub fn code(&self) -> i64 {
        self.code
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn sqlstate(&self) -> SqlState {
        self.sqlstate
    }

    pub fn query_id(&self) -> Option<&str> {
        self.query_id.as_deref()
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_set() {
            return write!(f, "no error");
        }
        write!(
            f,
            "{} (code {}, SQLSTATE {})",
            self.message.as_deref().unwrap_or(""),
            self.code,
            self.sqlstate
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlstate_parse() {
        assert_eq!(SqlState::parse("08001"), Some(SqlState::UNABLE_TO_CONNECT));
        assert_eq!(SqlState::parse("42S02").map(|s| s.to_string()), Some("42S02".into()));
        assert_eq!(SqlState::parse("0800"), None);
        assert_eq!(SqlState::parse("080011"), None);
        assert_eq!(SqlState::parse("08-01"), None);
        assert!(SqlState::default().is_success());
    }

    #[test]
    fn codes_follow_the_error_kind() {
        let err = Error::Connection(ConnectionError {
            kind: ConnectionErrorKind::BadParameters,
            message: "missing user".to_string(),
            source: None,
        });
        assert_eq!(err.code(), codes::BAD_CONNECTION_PARAMS);
        assert_eq!(err.sqlstate(), SqlState::UNABLE_TO_CONNECT);

        let err = Error::Protocol(ProtocolError {
            message: "no rowset".to_string(),
            sqlstate: SqlState::APP_REJECT_CONNECTION,
            query_id: Some("01a2".to_string()),
            source: None,
        });
        assert_eq!(err.code(), codes::BAD_JSON);
        assert_eq!(err.query_id(), Some("01a2"));

        let err = Error::Type(TypeError {
            kind: TypeErrorKind::Mismatch,
            column: 1,
            expected: NativeType::Int64,
            actual: NativeType::String,
            message: "incompatible".to_string(),
        });
        assert_eq!(err.code(), codes::TYPE_MISMATCH);
        assert_eq!(err.sqlstate(), SqlState::INVALID_BUFFER_TYPE);
    }

    #[test]
    fn server_code_is_passed_through() {
        let err = Error::Query(QueryError {
            code: 2003,
            message: "Object does not exist".to_string(),
            sqlstate: SqlState::parse("02000").unwrap(),
            query_id: None,
        })
        .with_query_id("abc");
        assert_eq!(err.code(), 2003);
        assert_eq!(err.query_id(), Some("abc"));
        assert!(err.is_server_rejection());
        assert!(!err.is_retryable());
    }

    #[test]
    fn record_set_and_clear() {
        let mut record = ErrorRecord::new();
        assert!(!record.is_set());
        assert_eq!(record.message(), None);

        let err = Error::Statement(StatementError {
            kind: StatementErrorKind::NotPrepared,
            message: "no sql".to_string(),
        });
        record.set(&err);
        assert!(record.is_set());
        assert_eq!(record.code(), codes::BAD_REQUEST);
        assert_eq!(record.message(), Some("no sql"));

        record.set_query_id_if_missing("q1");
        assert_eq!(record.query_id(), Some("q1"));
        record.set_query_id_if_missing("q2");
        assert_eq!(record.query_id(), Some("q1"));

        record.clear();
        assert_eq!(record, ErrorRecord::default());
        assert_eq!(record.to_string(), "no error");
    }

    #[test]
    fn record_with_zero_server_code_is_set() {
        let err = Error::Query(QueryError {
            code: 0,
            message: "Query was not successful".to_string(),
            sqlstate: SqlState::GENERAL_ERROR,
            query_id: None,
        });
        let mut record = ErrorRecord::new();
        record.set(&err);
        assert!(record.is_set());
        assert_eq!(record.code(), 0);
        assert_ne!(record.to_string(), "no error");
    }

    #[test]
    fn retryable_flags() {
        let timeout = Error::Connection(ConnectionError {
            kind: ConnectionErrorKind::Timeout,
            message: "timed out".to_string(),
            source: None,
        });
        assert!(timeout.is_retryable());
        assert_eq!(timeout.code(), codes::REQUEST_TIMEOUT);

        let attr = Error::Connection(ConnectionError {
            kind: ConnectionErrorKind::BadAttribute,
            message: "bad attribute".to_string(),
            source: None,
        });
        assert!(!attr.is_retryable());
    }
}
