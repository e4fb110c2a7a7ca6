//! Callback log model.
//!
//! Every inbound gateway callback is appended here, whatever its outcome.
//! Rows are never updated.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Row of the `callback_logs` table.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct CallbackLog {
    pub id: i64,
    pub client_id: i64,
    pub provider: String,
    pub transaction_no: Option<String>,
    pub request: Value,
    pub response: Value,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Values to insert for one callback attempt.
#[derive(Debug, Clone)]
pub struct NewCallbackLog {
    pub client_id: i64,
    pub provider: String,
    pub transaction_no: Option<String>,
    pub request: Value,
    pub response: Value,
    pub status: String,
}

impl NewCallbackLog {
    pub fn new(client_id: i64, provider: impl Into<String>, request: Value) -> Self {
        Self {
            client_id,
            provider: provider.into(),
            transaction_no: None,
            request,
            response: Value::Null,
            status: String::new(),
        }
    }

    pub fn with_outcome(
        mut self,
        transaction_no: Option<String>,
        status: impl Into<String>,
        response: Value,
    ) -> Self {
        self.transaction_no = transaction_no;
        self.status = status.into();
        self.response = response;
        self
    }
}
