//! Remote Store Abstraction
//!
//! The remote source of truth is an opaque request/response client. The core
//! only ever issues two kinds of calls: a filtered table `select`, and a named
//! `rpc` returning rows. Rows come back as JSON objects and are decoded by the
//! caller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// A single row returned by the remote store.
pub type RemoteRow = Value;

/// Equality filter applied to a remote select.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }
}

/// Sort order for a remote select.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// Table select request
///
/// # Example
///
/// ```ignore
/// let request = SelectRequest::new("songs")
///     .filter("user_id", "user-1")
///     .order_by("created_at", false);
/// let rows = client.select(request).await?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectRequest {
    pub table: String,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<u32>,
}

impl SelectRequest {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    pub fn filter(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::eq(column, value));
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.into(),
            ascending,
        });
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Remote store client trait
///
/// Implemented by the host with whatever transport it uses. Implementations
/// should map connectivity problems to [`BridgeError::Transport`] and
/// deadline expiry to [`BridgeError::Timeout`] so the core can decide
/// whether a retry is worthwhile.
///
/// [`BridgeError::Transport`]: crate::error::BridgeError::Transport
/// [`BridgeError::Timeout`]: crate::error::BridgeError::Timeout
#[async_trait]
pub trait RemoteStoreClient: Send + Sync {
    /// Run a filtered select against a remote table.
    async fn select(&self, request: SelectRequest) -> Result<Vec<RemoteRow>>;

    /// Invoke a named remote procedure returning rows.
    async fn rpc(&self, name: &str, args: Value) -> Result<Vec<RemoteRow>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_select_request_builder() {
        let request = SelectRequest::new("songs")
            .filter("user_id", "user-1")
            .order_by("created_at", false)
            .limit(50);

        assert_eq!(request.table, "songs");
        assert_eq!(request.filters, vec![Filter::eq("user_id", json!("user-1"))]);
        assert_eq!(
            request.order,
            Some(Order {
                column: "created_at".to_string(),
                ascending: false
            })
        );
        assert_eq!(request.limit, Some(50));
    }
}
