//! Two-lane request pipeline.
//!
//! Structural rewrites (create, rebuild) run in the exclusive lane; reads
//! and local mutations (find, insert, split, merge, enumerate) run in the
//! concurrent lane. The lanes share one reader/writer gate: any number of
//! concurrent-lane operations may overlap, and an exclusive-lane operation
//! overlaps with nothing.
//!
//! Concurrent-lane operations that write pages additionally queue on a
//! writer turnstile. Writers lock pages top-down (insert) as well as
//! bottom-up (split and merge by page id), so two of them running at once
//! could each wait on a page the other holds. Readers never hold more than
//! the page they are loading and keep overlapping with the writer.

use std::future::Future;

use tokio::sync::{Mutex, RwLock};

use crate::common::Result;

/// Which side of the gate an operation runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    Exclusive,
    Concurrent,
}

/// The gate shared by both lanes of one manager.
///
/// `tokio::sync::RwLock` queues waiters fairly, so a waiting exclusive
/// request is not starved by a stream of concurrent ones.
#[derive(Debug, Default)]
pub struct Pipeline {
    gate: RwLock<()>,
    writer: Mutex<()>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `operation` with the whole manager to itself.
    pub async fn exclusive<T, F>(&self, op: &'static str, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let _permit = self.gate.write().await;
        tracing::debug!(target: "blinkdex::pipeline", op, lane = ?Lane::Exclusive, "lane entered");
        operation.await
    }

    /// Run `operation` alongside other concurrent-lane operations.
    pub async fn concurrent<T, F>(&self, op: &'static str, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let _permit = self.gate.read().await;
        tracing::debug!(target: "blinkdex::pipeline", op, lane = ?Lane::Concurrent, "lane entered");
        operation.await
    }

    /// Run a page-writing `operation` in the concurrent lane, one writer at
    /// a time.
    pub async fn concurrent_writer<T, F>(&self, op: &'static str, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let _permit = self.gate.read().await;
        let _turn = self.writer.lock().await;
        tracing::debug!(target: "blinkdex::pipeline", op, lane = ?Lane::Concurrent, writer = true, "lane entered");
        operation.await
    }
}
