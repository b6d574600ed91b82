//! Statement lifecycle: prepare, bind, execute, fetch.
//!
//! ```text
//! Uninitialized --prepare--> Prepared --execute--> Executed
//!                                                     |
//!                                                   fetch
//!                                                     v
//!                       Exhausted <--end of data-- Draining
//! ```
//!
//! `prepare` is also the reset transition: from any state it drops the SQL
//! text, the bindings and everything the last execute produced.

use std::collections::{BTreeMap, VecDeque};

use serde_json::Value;
use sfclient_core::{
    Error, ErrorRecord, InputValue, NativeType, OutputBuffer, OutputValue, Result, SqlState,
    StatementError, StatementErrorKind, TypeError, TypeErrorKind,
};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::connection::{Connection, bad_parameters, protocol_error, rejection};
use crate::protocol::{
    self, Binding, QueryRequest, detach_array, fields, get_bool, get_int, get_str, headers, params,
};
use crate::transport::{HttpRequest, Method};
use crate::types::{ColumnDesc, decode_value, render_input};

/// Where a statement is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementState {
    Uninitialized,
    Prepared,
    Executed,
    /// At least one row fetched
    Draining,
    /// A fetch reported end of data
    Exhausted,
}

/// Outcome of a successful [`Statement::fetch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    /// A row was written into the bound buffers
    Row,
    /// No rows are left
    EndOfData,
}

/// A SQL statement bound to a connection.
#[derive(Debug)]
pub struct Statement<'c> {
    connection: &'c Connection,
    sql_text: Option<String>,
    params: BTreeMap<usize, InputValue>,
    results: BTreeMap<usize, OutputBuffer>,
    columns: Vec<ColumnDesc>,
    rows: VecDeque<Value>,
    total_rowcount: i64,
    total_fieldcount: i64,
    query_id: String,
    is_dml: bool,
    /// Fixed at creation
    sequence: u64,
    /// Correlation id for query requests, distinct from the connection's
    request_id: String,
    state: StatementState,
    error: ErrorRecord,
}

/// The pieces of a successful query response kept by the statement.
struct ExecuteOutcome {
    columns: Option<Vec<ColumnDesc>>,
    rows: VecDeque<Value>,
    total_rowcount: i64,
    is_dml: bool,
}

impl<'c> Statement<'c> {
    pub(crate) fn new(connection: &'c Connection) -> Self {
        let sequence = connection.next_sequence();
        tracing::trace!(sequence, "Statement created");
        Self {
            connection,
            sql_text: None,
            params: BTreeMap::new(),
            results: BTreeMap::new(),
            columns: Vec::new(),
            rows: VecDeque::new(),
            total_rowcount: -1,
            total_fieldcount: -1,
            query_id: String::new(),
            is_dml: false,
            sequence,
            request_id: Uuid::new_v4().to_string(),
            state: StatementState::Uninitialized,
            error: ErrorRecord::new(),
        }
    }

    pub fn connection(&self) -> &'c Connection {
        self.connection
    }

    /// Drop the SQL text, the bindings and all execute results.
    fn reset(&mut self) {
        self.error.clear();
        self.query_id.clear();
        self.request_id = Uuid::new_v4().to_string();
        self.sql_text = None;
        self.params.clear();
        self.results.clear();
        self.clear_results();
        self.state = StatementState::Uninitialized;
    }

    fn clear_results(&mut self) {
        self.columns.clear();
        self.rows.clear();
        self.total_rowcount = -1;
        self.total_fieldcount = -1;
        self.is_dml = false;
    }

    /// Install new SQL text. Nothing is sent to the server.
    pub fn prepare(&mut self, sql: &str) -> Result<()> {
        self.reset();
        self.sql_text = Some(sql.to_string());
        self.state = StatementState::Prepared;
        tracing::debug!(sequence = self.sequence, len = sql.len(), "Statement prepared");
        Ok(())
    }

    /// Install SQL text from a byte buffer.
    ///
    /// With `len == 0` the text runs up to the first NUL byte (or the end of
    /// the buffer); otherwise exactly `len` bytes are used, NULs included.
    pub fn prepare_bytes(&mut self, sql: &[u8], len: usize) -> Result<()> {
        self.error.clear();
        let bytes = if len == 0 {
            let end = sql.iter().position(|b| *b == 0).unwrap_or(sql.len());
            &sql[..end]
        } else if let Some(bytes) = sql.get(..len) {
            bytes
        } else {
            return self.fail(statement_error(
                StatementErrorKind::InvalidSqlText,
                format!("SQL length {} exceeds the buffer size {}", len, sql.len()),
            ));
        };
        match std::str::from_utf8(bytes) {
            Ok(text) => self.prepare(text),
            Err(e) => self.fail(statement_error(
                StatementErrorKind::InvalidSqlText,
                format!("SQL text is not valid UTF-8: {}", e),
            )),
        }
    }

    /// Bind a parameter value at a 1-based index, replacing any earlier one.
    pub fn bind_param(&mut self, index: usize, value: impl Into<InputValue>) -> Result<()> {
        self.error.clear();
        if index == 0 {
            return self.fail(invalid_index());
        }
        self.params.insert(index, value.into());
        Ok(())
    }

    /// Bind an output buffer to a 1-based result column, replacing any earlier one.
    pub fn bind_result(&mut self, index: usize, buffer: OutputBuffer) -> Result<()> {
        self.error.clear();
        if index == 0 {
            return self.fail(invalid_index());
        }
        self.results.insert(index, buffer);
        Ok(())
    }

    /// The buffer bound at `index`, holding the last fetched value.
    pub fn result(&self, index: usize) -> Option<&OutputBuffer> {
        self.results.get(&index)
    }

    /// Unbind and return the buffer at `index`.
    pub fn take_result(&mut self, index: usize) -> Option<OutputBuffer> {
        self.results.remove(&index)
    }

    /// Prepare and execute in one call.
    ///
    /// Since prepare clears the bindings, this is for statements without
    /// parameters.
    pub fn query(&mut self, sql: &str) -> Result<()> {
        self.prepare(sql)?;
        self.execute()
    }

    /// Run the prepared SQL with the bound parameters.
    ///
    /// The previous results are replaced only when the new execute succeeds;
    /// output buffers are written by [`fetch`](Statement::fetch) alone.
    #[tracing::instrument(level = "debug", skip(self), fields(sequence = self.sequence))]
    pub fn execute(&mut self) -> Result<()> {
        self.error.clear();
        self.query_id.clear();

        match self.run_query() {
            Ok(outcome) => {
                match outcome.columns {
                    Some(columns) => {
                        self.total_fieldcount = len_i64(columns.len());
                        self.columns = columns;
                    }
                    None => {
                        self.total_fieldcount = -1;
                        self.columns.clear();
                    }
                }
                self.rows = outcome.rows;
                self.total_rowcount = outcome.total_rowcount;
                self.is_dml = outcome.is_dml;
                self.state = StatementState::Executed;
                tracing::debug!(
                    query_id = %self.query_id,
                    rows = self.total_rowcount,
                    fields = self.total_fieldcount,
                    is_dml = self.is_dml,
                    "Statement executed"
                );
                Ok(())
            }
            Err(e) => {
                let e = e.with_query_id(&self.query_id);
                self.fail(e)
            }
        }
    }

    fn run_query(&mut self) -> Result<ExecuteOutcome> {
        let Some(token) = self.connection.session_token() else {
            tracing::error!("Missing session token or master token");
            return Err(bad_parameters(
                "Missing session or master token. Try running connect.",
            ));
        };
        let Some(sql_text) = self.sql_text.as_deref() else {
            return Err(statement_error(
                StatementErrorKind::NotPrepared,
                "No SQL text. Call prepare before execute.",
            ));
        };

        let bindings = self
            .params
            .iter()
            .map(|(index, value)| {
                let (wire_type, text) = render_input(value);
                (
                    index.to_string(),
                    Binding {
                        type_name: wire_type.name(),
                        value: text,
                    },
                )
            })
            .collect();
        let body = QueryRequest {
            sql_text,
            sequence_id: self.sequence,
            bindings,
        }
        .to_body()
        .map_err(|e| {
            protocol_error("Failed to encode query request", SqlState::GENERAL_ERROR, Some(e))
        })?;
        tracing::trace!(body = %body, "Created query request body");

        let authorization = Zeroizing::new(headers::authorization(token));
        let request = HttpRequest {
            method: Method::Post,
            url: format!("{}{}", self.connection.base_url()?, protocol::QUERY_PATH),
            query: vec![(params::QUERY_REQUEST_ID, self.request_id.as_str())],
            headers: vec![
                (headers::CONTENT_TYPE, headers::APPLICATION_JSON),
                (headers::ACCEPT, headers::APPLICATION_SNOWFLAKE),
                (headers::AUTHORIZATION, authorization.as_str()),
            ],
            body: Some(&body),
            timeout: self.connection.network_timeout(),
        };
        let mut response = self
            .connection
            .send_json(&request, SqlState::APP_REJECT_CONNECTION)?;

        match get_str(response.get(fields::DATA), fields::QUERY_ID) {
            Ok(id) => self.query_id = id.to_string(),
            Err(_) => tracing::debug!("No valid query id found in response"),
        }

        match get_bool(Some(&response), fields::SUCCESS) {
            Ok(true) => self.read_success(&mut response),
            Ok(false) => {
                let sqlstate = get_str(response.get(fields::DATA), fields::SQL_STATE)
                    .ok()
                    .and_then(SqlState::parse)
                    .unwrap_or_else(|| {
                        tracing::debug!("No valid sqlstate found in response");
                        SqlState::GENERAL_ERROR
                    });
                Err(rejection(&response, sqlstate, Some(self.query_id.as_str())))
            }
            Err(e) => Err(protocol_error(
                format!("Success code: {}", e),
                SqlState::APP_REJECT_CONNECTION,
                Some(e),
            )),
        }
    }

    fn read_success(&self, response: &mut Value) -> Result<ExecuteOutcome> {
        let data = response.get(fields::DATA);

        let missing = self.connection.context_mut().refresh(
            data,
            [
                fields::FINAL_DATABASE_NAME,
                fields::FINAL_SCHEMA_NAME,
                fields::FINAL_WAREHOUSE_NAME,
                fields::FINAL_ROLE_NAME,
            ],
        );
        for field in missing {
            tracing::warn!(field, "No valid session context field found in response");
        }

        let is_dml = get_int(data, fields::STATEMENT_TYPE_ID).is_ok_and(protocol::is_dml);

        let columns = match data.and_then(|d| d.get(fields::ROWTYPE)) {
            Some(Value::Array(entries)) => Some(
                entries
                    .iter()
                    .map(ColumnDesc::from_json)
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|e| {
                        protocol_error(
                            "Invalid rowtype entry in response",
                            SqlState::APP_REJECT_CONNECTION,
                            Some(e),
                        )
                    })?,
            ),
            _ => None,
        };
        let total = get_int(data, fields::TOTAL).ok();

        let rows = detach_array(response.get_mut(fields::DATA), fields::ROWSET).map_err(|e| {
            tracing::error!("No valid rowset found in response");
            protocol_error(
                "Missing rowset from response. No results found.",
                SqlState::APP_REJECT_CONNECTION,
                Some(e),
            )
        })?;
        let total_rowcount = total.unwrap_or_else(|| {
            tracing::warn!("No total count found in response, using the rowset size");
            len_i64(rows.len())
        });

        Ok(ExecuteOutcome {
            columns,
            rows,
            total_rowcount,
            is_dml,
        })
    }

    /// Write the next row into the bound output buffers.
    ///
    /// Either every bound buffer receives its column value and the row is
    /// consumed, or the call fails and neither buffers nor rows change.
    pub fn fetch(&mut self) -> Result<FetchStatus> {
        self.error.clear();
        let Some(row) = self.rows.front() else {
            if matches!(
                self.state,
                StatementState::Executed | StatementState::Draining
            ) {
                self.state = StatementState::Exhausted;
            }
            return Ok(FetchStatus::EndOfData);
        };

        match self.stage_row(row) {
            Ok(staged) => {
                self.rows.pop_front();
                for (index, value) in staged {
                    if let Some(buffer) = self.results.get_mut(&index) {
                        buffer.write(value);
                    }
                }
                self.state = StatementState::Draining;
                Ok(FetchStatus::Row)
            }
            Err(e) => {
                let e = e.with_query_id(&self.query_id);
                self.fail(e)
            }
        }
    }

    /// Check every bound buffer against its column, then convert the row.
    fn stage_row(&self, row: &Value) -> Result<Vec<(usize, Option<OutputValue>)>> {
        let bound: Vec<(usize, &ColumnDesc, NativeType)> = self
            .columns
            .iter()
            .enumerate()
            .filter_map(|(i, column)| {
                self.results
                    .get(&(i + 1))
                    .map(|buffer| (i + 1, column, buffer.native_type()))
            })
            .collect();

        for &(index, column, target) in &bound {
            if !target.accepts(column.native_type) {
                return Err(Error::Type(TypeError {
                    kind: TypeErrorKind::Mismatch,
                    column: index,
                    expected: target,
                    actual: column.native_type,
                    message: format!(
                        "Cannot fetch {} column '{}' into a {} buffer",
                        column.wire_type, column.name, target
                    ),
                }));
            }
        }

        let Value::Array(cells) = row else {
            return Err(protocol_error(
                "Result row is not an array",
                SqlState::GENERAL_ERROR,
                None::<serde_json::Error>,
            ));
        };
        bound
            .into_iter()
            .map(|(index, column, target)| {
                let cell = cells.get(index - 1).unwrap_or(&Value::Null);
                decode_value(target, column, index, cell).map(|value| (index, value))
            })
            .collect()
    }

    /// Number of rows the statement affected.
    ///
    /// For DML this consumes the single result row and returns the sum of its
    /// counters. Otherwise it returns the total row count and consumes nothing.
    pub fn affected_rows(&mut self) -> Result<i64> {
        self.error.clear();
        if !self.is_dml {
            return Ok(self.total_rowcount);
        }
        let Some(row) = self.rows.front() else {
            return self.fail(statement_error(
                StatementErrorKind::NoResult,
                "No result row to count affected rows from",
            ));
        };
        match self.sum_counters(row) {
            Ok(count) => {
                self.rows.pop_front();
                Ok(count)
            }
            Err(e) => {
                let e = e.with_query_id(&self.query_id);
                self.fail(e)
            }
        }
    }

    fn sum_counters(&self, row: &Value) -> Result<i64> {
        let cells = match row {
            Value::Array(cells) => cells.as_slice(),
            _ => std::slice::from_ref(row),
        };
        let mut total: i64 = 0;
        for (i, cell) in cells.iter().enumerate() {
            let count = match cell {
                Value::Null => Some(0),
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            };
            total = count
                .and_then(|c| total.checked_add(c))
                .ok_or_else(|| {
                    Error::Type(TypeError {
                        kind: TypeErrorKind::Conversion,
                        column: i + 1,
                        expected: NativeType::Int64,
                        actual: self
                            .columns
                            .get(i)
                            .map_or(NativeType::String, |c| c.native_type),
                        message: format!("'{}' is not a row count", cell),
                    })
                })?;
        }
        Ok(total)
    }

    /// Total rows in the result, -1 before a successful execute.
    pub fn row_count(&self) -> i64 {
        self.total_rowcount
    }

    /// Number of result columns, -1 before a successful execute.
    pub fn field_count(&self) -> i64 {
        self.total_fieldcount
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    pub fn columns(&self) -> &[ColumnDesc] {
        &self.columns
    }

    /// Rows not yet fetched.
    pub fn pending_rows(&self) -> usize {
        self.rows.len()
    }

    /// Server id of the last execute, kept even when it failed.
    pub fn query_id(&self) -> Option<&str> {
        (!self.query_id.is_empty()).then_some(self.query_id.as_str())
    }

    pub fn sqlstate(&self) -> SqlState {
        self.error.sqlstate()
    }

    pub fn error(&self) -> &ErrorRecord {
        &self.error
    }

    pub fn is_dml(&self) -> bool {
        self.is_dml
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn sql_text(&self) -> Option<&str> {
        self.sql_text.as_deref()
    }

    pub fn state(&self) -> StatementState {
        self.state
    }

    fn fail<T>(&mut self, err: Error) -> Result<T> {
        self.error.set(&err);
        self.error.set_query_id_if_missing(&self.query_id);
        Err(err)
    }
}

fn len_i64(len: usize) -> i64 {
    i64::try_from(len).unwrap_or(i64::MAX)
}

fn statement_error(kind: StatementErrorKind, msg: impl Into<String>) -> Error {
    Error::Statement(StatementError {
        kind,
        message: msg.into(),
    })
}

fn invalid_index() -> Error {
    statement_error(
        StatementErrorKind::InvalidIndex,
        "Bind indices start at 1",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionConfig;
    use crate::transport::{HttpResponse, Transport, TransportError};
    use serde_json::json;
    use sfclient_core::codes;

    struct Unreachable;

    impl Transport for Unreachable {
        fn send(&self, _: &HttpRequest<'_>) -> std::result::Result<HttpResponse, TransportError> {
            panic!("no request expected");
        }
    }

    fn connection() -> Connection {
        Connection::with_transport(ConnectionConfig::new().account("a").user("u"), Unreachable)
    }

    fn executed<'c>(conn: &'c Connection, columns: Value, rows: Value, dml: bool) -> Statement<'c> {
        let mut stmt = conn.statement();
        stmt.prepare("select").unwrap();
        let mut response = json!({"data": {"rowtype": columns, "rowset": rows}});
        if dml {
            response["data"]["statementTypeId"] = json!(protocol::statement_type::INSERT);
        }
        let outcome = stmt.read_success(&mut response).unwrap();
        stmt.columns = outcome.columns.unwrap_or_default();
        stmt.total_fieldcount = len_i64(stmt.columns.len());
        stmt.rows = outcome.rows;
        stmt.total_rowcount = outcome.total_rowcount;
        stmt.is_dml = outcome.is_dml;
        stmt.state = StatementState::Executed;
        stmt
    }

    #[test]
    fn test_new_statement() {
        let conn = connection();
        let a = conn.statement();
        let b = conn.statement();
        assert_eq!(a.sequence(), 1);
        assert_eq!(b.sequence(), 2);
        assert_ne!(a.request_id(), b.request_id());
        assert_eq!(a.row_count(), -1);
        assert_eq!(a.field_count(), -1);
        assert_eq!(a.state(), StatementState::Uninitialized);
        assert_eq!(a.query_id(), None);
    }

    #[test]
    fn test_prepare_bytes() {
        let conn = connection();
        let mut stmt = conn.statement();
        stmt.prepare_bytes(b"select 1\0garbage", 0).unwrap();
        assert_eq!(stmt.sql_text(), Some("select 1"));

        stmt.prepare_bytes(b"select '\0'", 10).unwrap();
        assert_eq!(stmt.sql_text(), Some("select '\0'"));

        let err = stmt.prepare_bytes(b"select", 99).unwrap_err();
        assert!(matches!(
            err,
            Error::Statement(StatementError {
                kind: StatementErrorKind::InvalidSqlText,
                ..
            })
        ));
        assert!(stmt.error().is_set());

        assert!(stmt.prepare_bytes(&[0xff, 0xfe], 2).is_err());
    }

    #[test]
    fn test_bind_index_zero() {
        let conn = connection();
        let mut stmt = conn.statement();
        let err = stmt.bind_param(0, 1_i64).unwrap_err();
        assert_eq!(err.code(), codes::BAD_REQUEST);
        assert!(stmt.bind_result(0, OutputBuffer::new(NativeType::Int64)).is_err());

        stmt.bind_param(2, "x").unwrap();
        stmt.bind_param(2, "y").unwrap();
        assert_eq!(stmt.param_count(), 1);
        assert!(!stmt.error().is_set());
    }

    #[test]
    fn test_prepare_clears_bindings() {
        let conn = connection();
        let mut stmt = conn.statement();
        stmt.prepare("select ?").unwrap();
        stmt.bind_param(1, 5_i64).unwrap();
        stmt.bind_result(1, OutputBuffer::string(8)).unwrap();
        stmt.prepare("select 2").unwrap();
        assert_eq!(stmt.param_count(), 0);
        assert!(stmt.result(1).is_none());
        assert_eq!(stmt.state(), StatementState::Prepared);
    }

    #[test]
    fn test_execute_without_session() {
        let conn = connection();
        let mut stmt = conn.statement();
        stmt.prepare("select 1").unwrap();
        let err = stmt.execute().unwrap_err();
        assert_eq!(err.code(), codes::BAD_CONNECTION_PARAMS);
        assert_eq!(stmt.error().code(), codes::BAD_CONNECTION_PARAMS);
        assert_eq!(stmt.sqlstate(), SqlState::UNABLE_TO_CONNECT);
    }

    #[test]
    fn test_fetch_in_order_then_end_of_data() {
        let conn = connection();
        let mut stmt = executed(
            &conn,
            json!([{"name": "N", "type": "fixed", "scale": 0}]),
            json!([["1"], ["2"]]),
            false,
        );
        stmt.bind_result(1, OutputBuffer::new(NativeType::Int64)).unwrap();

        assert_eq!(stmt.fetch().unwrap(), FetchStatus::Row);
        assert_eq!(stmt.result(1).unwrap().as_i64(), Some(1));
        assert_eq!(stmt.state(), StatementState::Draining);
        assert_eq!(stmt.fetch().unwrap(), FetchStatus::Row);
        assert_eq!(stmt.result(1).unwrap().as_i64(), Some(2));
        assert_eq!(stmt.fetch().unwrap(), FetchStatus::EndOfData);
        assert_eq!(stmt.state(), StatementState::Exhausted);
        assert_eq!(stmt.fetch().unwrap(), FetchStatus::EndOfData);
    }

    #[test]
    fn test_fetch_mismatch_changes_nothing() {
        let conn = connection();
        let mut stmt = executed(
            &conn,
            json!([
                {"name": "A", "type": "fixed", "scale": 0},
                {"name": "B", "type": "text"}
            ]),
            json!([["7", "x"]]),
            false,
        );
        stmt.bind_result(1, OutputBuffer::new(NativeType::Int64)).unwrap();
        stmt.bind_result(2, OutputBuffer::new(NativeType::Float64)).unwrap();

        let err = stmt.fetch().unwrap_err();
        assert_eq!(err.code(), codes::TYPE_MISMATCH);
        assert_eq!(stmt.error().sqlstate(), SqlState::INVALID_BUFFER_TYPE);
        assert!(stmt.result(1).unwrap().is_empty());
        assert_eq!(stmt.pending_rows(), 1);

        // A string buffer accepts any column.
        stmt.bind_result(2, OutputBuffer::string(16)).unwrap();
        assert_eq!(stmt.fetch().unwrap(), FetchStatus::Row);
        assert_eq!(stmt.result(1).unwrap().as_i64(), Some(7));
        assert_eq!(stmt.result(2).unwrap().as_str(), Some("x"));
    }

    #[test]
    fn test_fetch_conversion_failure_changes_nothing() {
        let conn = connection();
        let mut stmt = executed(
            &conn,
            json!([
                {"name": "A", "type": "text"},
                {"name": "B", "type": "fixed", "scale": 0}
            ]),
            json!([["ok", "not a number"]]),
            false,
        );
        stmt.bind_result(1, OutputBuffer::string(8)).unwrap();
        stmt.bind_result(2, OutputBuffer::new(NativeType::Int64)).unwrap();

        let err = stmt.fetch().unwrap_err();
        assert_eq!(err.code(), codes::DATA_CONVERSION);
        assert!(stmt.result(1).unwrap().is_empty());
        assert_eq!(stmt.pending_rows(), 1);
    }

    #[test]
    fn test_fetch_skips_unbound_columns_and_nulls() {
        let conn = connection();
        let mut stmt = executed(
            &conn,
            json!([
                {"name": "A", "type": "text"},
                {"name": "B", "type": "real"}
            ]),
            json!([["skip me", null]]),
            false,
        );
        stmt.bind_result(2, OutputBuffer::new(NativeType::Float64)).unwrap();
        assert_eq!(stmt.fetch().unwrap(), FetchStatus::Row);
        assert!(stmt.result(2).unwrap().is_null());
    }

    #[test]
    fn test_fetch_truncates_strings() {
        let conn = connection();
        let mut stmt = executed(
            &conn,
            json!([{"name": "A", "type": "text"}]),
            json!([["abcdefgh"]]),
            false,
        );
        stmt.bind_result(1, OutputBuffer::string(3)).unwrap();
        stmt.fetch().unwrap();
        let buf = stmt.take_result(1).unwrap();
        assert_eq!(buf.as_str(), Some("abc"));
        assert_eq!(buf.len(), 8);
        assert!(buf.is_truncated());
        assert!(stmt.result(1).is_none());
    }

    #[test]
    fn test_affected_rows_dml() {
        let conn = connection();
        let mut stmt = executed(
            &conn,
            json!([
                {"name": "inserted", "type": "fixed", "scale": 0},
                {"name": "updated", "type": "fixed", "scale": 0}
            ]),
            json!([["3", "4"]]),
            true,
        );
        assert!(stmt.is_dml());
        assert_eq!(stmt.affected_rows().unwrap(), 7);
        assert_eq!(stmt.pending_rows(), 0);

        let err = stmt.affected_rows().unwrap_err();
        assert!(matches!(
            err,
            Error::Statement(StatementError {
                kind: StatementErrorKind::NoResult,
                ..
            })
        ));
    }

    #[test]
    fn test_affected_rows_bad_counter() {
        let conn = connection();
        let mut stmt = executed(
            &conn,
            json!([{"name": "n", "type": "fixed", "scale": 0}]),
            json!([["many"]]),
            true,
        );
        assert_eq!(stmt.affected_rows().unwrap_err().code(), codes::DATA_CONVERSION);
        assert_eq!(stmt.pending_rows(), 1);
    }

    #[test]
    fn test_affected_rows_non_dml() {
        let conn = connection();
        let mut stmt = executed(
            &conn,
            json!([{"name": "n", "type": "fixed", "scale": 0}]),
            json!([["1"], ["2"], ["3"]]),
            false,
        );
        assert_eq!(stmt.affected_rows().unwrap(), 3);
        assert_eq!(stmt.pending_rows(), 3);
    }

    #[test]
    fn test_missing_rowset() {
        let conn = connection();
        let stmt = conn.statement();
        let mut response = json!({"data": {"rowtype": []}});
        let err = stmt.read_success(&mut response).err().unwrap();
        assert_eq!(err.code(), codes::BAD_JSON);
        assert_eq!(err.sqlstate(), SqlState::APP_REJECT_CONNECTION);
    }

    #[test]
    fn test_total_falls_back_to_rowset_size() {
        let conn = connection();
        let stmt = conn.statement();
        let mut response = json!({"data": {"rowset": [["a"], ["b"]]}});
        let outcome = stmt.read_success(&mut response).unwrap();
        assert_eq!(outcome.total_rowcount, 2);
        assert!(outcome.columns.is_none());

        let mut response = json!({"data": {"rowset": [], "total": 10}});
        assert_eq!(stmt.read_success(&mut response).unwrap().total_rowcount, 10);
    }
}
