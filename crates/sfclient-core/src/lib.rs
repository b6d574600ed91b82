//! Core types for sfclient.
//!
//! This crate provides the pieces shared by every layer of the driver:
//!
//! - `Error` and the per-handle `ErrorRecord`
//! - `NativeType`, the closed set of native buffer types
//! - `InputValue` and `OutputBuffer` for parameter and result binding

pub mod error;
pub mod types;
pub mod value;

pub use error::{
    ConnectionError, ConnectionErrorKind, Error, ErrorRecord, ProtocolError, QueryError, Result,
    SqlState, StatementError, StatementErrorKind, TypeError, TypeErrorKind, codes,
};
pub use types::NativeType;
pub use value::{InputValue, OutputBuffer, OutputValue, Timestamp};
