use std::fmt::{self, Display};

use potion::Error;
use serde_json::{Map, Value};

pub struct QueryError {
    info: String,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self { info }
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Configuration(e) => Self::new(format!("{e}")),
            sqlx::Error::Database(e) => Self::new(format!("{e}")),
            sqlx::Error::Io(e) => Self::new(format!("{e}")),
            sqlx::Error::Tls(e) => Self::new(format!("{e}")),
            sqlx::Error::Protocol(e) => Self::new(format!("{e}")),
            sqlx::Error::RowNotFound => Self::new(format!("RowNotFound")),
            sqlx::Error::TypeNotFound { type_name } => {
                Self::new(format!("Type not found: {type_name}"))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => {
                Self::new(format!("Column index out of bounds {index} ({len})"))
            }
            sqlx::Error::ColumnNotFound(e) => Self::new(format!("{e}")),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::new(format!("Column decode {index} ({source})"))
            }
            sqlx::Error::Decode(e) => Self::new(format!("{e}")),
            sqlx::Error::PoolTimedOut => Self::new(format!("Pool timed out")),
            sqlx::Error::PoolClosed => Self::new(format!("Pool closed")),
            sqlx::Error::WorkerCrashed => Self::new(format!("Worker crashed")),
            sqlx::Error::Migrate(e) => Self::new(format!("{e}")),
            _ => Self::new(format!("Unknown error")),
        }
    }
}

impl From<QueryError> for Error {
    fn from(value: QueryError) -> Self {
        log::error!("Query failed: {}", value.info);
        Error {
            code: 500,
            info: Some(value.info),
            redirect: None,
        }
    }
}

/// Name of the violated constraint, when the database rejected a write because of one.
pub fn violated_constraint(error: &sqlx::Error) -> Option<String> {
    error
        .as_database_error()
        .and_then(|e| e.constraint())
        .map(|c| c.to_string())
}

pub fn bad_request(info: &str) -> Error {
    Error {
        code: 400,
        info: Some(info.to_string()),
        redirect: None,
    }
}

pub fn forbidden(info: &str) -> Error {
    Error {
        code: 403,
        info: Some(info.to_string()),
        redirect: None,
    }
}

pub fn not_found(info: &str) -> Error {
    Error {
        code: 404,
        info: Some(info.to_string()),
        redirect: None,
    }
}

#[derive(Debug)]
pub struct TypeError {
    info: String,
}

impl TypeError {
    pub fn new(info: &str) -> Self {
        Self {
            info: info.to_string(),
        }
    }
}

impl From<TypeError> for Error {
    fn from(value: TypeError) -> Self {
        bad_request(&value.info)
    }
}

impl Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.info)
    }
}

impl std::error::Error for TypeError {}

/// A rejected input field. Rendered as `{"<field>": ["<message>"]}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: &str) -> Self {
        Self {
            field,
            message: message.to_string(),
        }
    }

    pub fn to_json(&self) -> Value {
        let mut body = Map::new();
        body.insert(
            self.field.to_string(),
            Value::Array(vec![Value::String(self.message.clone())]),
        );
        Value::Object(body)
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validation_error_renders_field_map() {
        let error = ValidationError::new("tags", "At least one tag is required");
        assert_eq!(
            error.to_json(),
            json!({ "tags": ["At least one tag is required"] })
        );
    }

    #[test]
    fn helpers_carry_status_codes() {
        assert!(bad_request("x").code == 400);
        assert!(forbidden("x").code == 403);
        assert!(not_found("x").code == 404);
        assert!(not_found("missing").info == Some(String::from("missing")));
    }
}
