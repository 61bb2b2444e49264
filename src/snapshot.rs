//! Point-in-time copies of tracked state.
//!
//! Snapshots are plain data: once taken they never change, no matter how many times
//! the underlying callbacks are invoked afterwards. They serialize to the JSON
//! served by the query listener.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::call_site::CallSite;

/// Copy of one callback record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackSnapshot {
    /// Declared name of the callback (empty for closures)
    pub name: String,
    /// Declared parameter count
    pub arity: usize,
    /// Position in the registry's ordered collection
    pub index: usize,
    /// When the callback was first wrapped
    pub created_at: DateTime<Utc>,
    /// Invocations across all handlers
    pub total_called: u64,
    /// One entry per hand-off, in wrap order
    pub handlers: Vec<HandlerSnapshot>,
}

impl CallbackSnapshot {
    /// No handler has called back yet.
    pub fn is_pending(&self) -> bool {
        self.total_called == 0
    }

    /// At least one handler has called back.
    pub fn is_complete(&self) -> bool {
        self.total_called > 0
    }
}

/// Copy of one hand-off of a callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerSnapshot {
    /// Call site the callback was handed off from
    pub meta: CallSite,
    /// Invocations through this hand-off
    pub called: u64,
    /// Free-form entries appended through the handler's log
    pub log: Vec<String>,
    pub created_at: DateTime<Utc>,
}
