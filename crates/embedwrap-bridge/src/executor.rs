// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// UI executor handoff.
//
// The embedded runtime's channel may only be driven from its own UI thread.
// Rather than relying on an implicit "main thread", every runtime hands the
// bridge an explicit `UiExecutor` and outbound invocations are posted to it.

use std::thread::ThreadId;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use embedwrap_core::error::{BridgeError, Result};

/// Unit of work run on a UI executor.
pub type UiTask = Box<dyn FnOnce() + Send + 'static>;

/// A single-threaded executor owned by the embedded runtime.
pub trait UiExecutor: Send + Sync {
    /// Queue `task` to run later on the executor's thread. Returns
    /// immediately. Fails only once the executor has shut down.
    fn post(&self, task: UiTask) -> Result<()>;

    /// Whether the calling thread is the executor's thread.
    fn is_current(&self) -> bool;
}

/// `UiExecutor` backed by a dedicated, named OS thread.
///
/// Tasks run in posting order. The thread exits once every handle to the
/// executor has been dropped and the backlog is empty.
pub struct ThreadExecutor {
    tx: mpsc::UnboundedSender<UiTask>,
    thread_id: ThreadId,
    name: String,
}

impl ThreadExecutor {
    /// Spawn the executor thread.
    pub fn spawn(name: &str) -> Result<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<UiTask>();
        let thread_name = name.to_owned();
        let handle = std::thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                while let Some(task) = rx.blocking_recv() {
                    task();
                }
                debug!(thread = %thread_name, "UI executor stopped");
            })?;

        debug!(thread = %name, "UI executor started");
        Ok(Self {
            tx,
            thread_id: handle.thread().id(),
            name: name.to_owned(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Block until every task posted before this call has run.
    ///
    /// Fails when called from the executor's own thread, which could never
    /// observe its own backlog drain.
    pub fn flush(&self) -> Result<()> {
        if self.is_current() {
            warn!(thread = %self.name, "flush called from the UI executor itself");
            return Err(BridgeError::Bridge("flush on UI executor".into()));
        }
        let (done_tx, done_rx) = oneshot::channel();
        self.post(Box::new(move || {
            let _ = done_tx.send(());
        }))?;
        done_rx.blocking_recv().map_err(|_| BridgeError::ExecutorClosed)
    }
}

impl UiExecutor for ThreadExecutor {
    fn post(&self, task: UiTask) -> Result<()> {
        self.tx.send(task).map_err(|_| BridgeError::ExecutorClosed)
    }

    fn is_current(&self) -> bool {
        std::thread::current().id() == self.thread_id
    }
}
