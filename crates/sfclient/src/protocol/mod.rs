//! Request/response contract for the login and query endpoints.
//!
//! Both exchanges are a single `POST` with a JSON body. The response is a
//! JSON object whose `success` flag decides how the rest is read:
//!
//! ```text
//! {"success": true,  "data": {...}}
//! {"success": false, "code": "390100", "message": "...", "data": {...}}
//! ```

pub mod json;
pub mod request;

pub use json::{JsonError, detach_array, get_bool, get_code, get_int, get_str};
pub use request::{Binding, ClientEnvironment, LoginData, LoginRequest, QueryRequest, SessionParameters};

/// Login endpoint path.
pub const LOGIN_PATH: &str = "/session/v1/login-request";

/// Query endpoint path.
pub const QUERY_PATH: &str = "/queries/v1/query-request";

/// Query-string parameter names.
pub mod params {
    pub const REQUEST_ID: &str = "request_id";
    pub const DATABASE: &str = "databaseName";
    pub const SCHEMA: &str = "schemaName";
    pub const WAREHOUSE: &str = "warehouse";
    pub const ROLE: &str = "roleName";
    /// The query endpoint spells it differently.
    pub const QUERY_REQUEST_ID: &str = "requestId";
}

/// Header names and values.
pub mod headers {
    pub const CONTENT_TYPE: &str = "Content-Type";
    pub const ACCEPT: &str = "Accept";
    pub const AUTHORIZATION: &str = "Authorization";
    pub const APPLICATION_JSON: &str = "application/json";
    pub const APPLICATION_SNOWFLAKE: &str = "application/snowflake";

    /// Value of the `Authorization` header for a session token.
    pub fn authorization(token: &str) -> String {
        format!("Snowflake Token=\"{token}\"")
    }
}

/// Statement type ids that mark a data-modification statement.
pub mod statement_type {
    pub const DML: i64 = 0x3000;
    pub const INSERT: i64 = DML + 0x100;
    pub const UPDATE: i64 = DML + 0x200;
    pub const DELETE: i64 = DML + 0x300;
    pub const MERGE: i64 = DML + 0x400;
    pub const MULTI_TABLE_INSERT: i64 = DML + 0x500;
}

/// Is this statement type id one of the DML ids?
///
/// Exact match only: ids in between (e.g. `0x3001`) are not DML.
pub const fn is_dml(statement_type_id: i64) -> bool {
    matches!(
        statement_type_id,
        statement_type::DML
            | statement_type::INSERT
            | statement_type::UPDATE
            | statement_type::DELETE
            | statement_type::MERGE
            | statement_type::MULTI_TABLE_INSERT
    )
}

/// Response field names.
pub mod fields {
    pub const SUCCESS: &str = "success";
    pub const CODE: &str = "code";
    pub const MESSAGE: &str = "message";
    pub const DATA: &str = "data";
    pub const TOKEN: &str = "token";
    pub const MASTER_TOKEN: &str = "masterToken";
    pub const SESSION_INFO: &str = "sessionInfo";
    pub const DATABASE_NAME: &str = "databaseName";
    pub const SCHEMA_NAME: &str = "schemaName";
    pub const WAREHOUSE_NAME: &str = "warehouseName";
    pub const ROLE_NAME: &str = "roleName";
    pub const QUERY_ID: &str = "queryId";
    pub const FINAL_DATABASE_NAME: &str = "finalDatabaseName";
    pub const FINAL_SCHEMA_NAME: &str = "finalSchemaName";
    pub const FINAL_WAREHOUSE_NAME: &str = "finalWarehouseName";
    pub const FINAL_ROLE_NAME: &str = "finalRoleName";
    pub const STATEMENT_TYPE_ID: &str = "statementTypeId";
    pub const ROWTYPE: &str = "rowtype";
    pub const ROWSET: &str = "rowset";
    pub const TOTAL: &str = "total";
    pub const SQL_STATE: &str = "sqlState";
}

/// Message used when a rejected request carries none.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Query was not successful";
