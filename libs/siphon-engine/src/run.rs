use std::future::Future;

use redis::aio::ConnectionLike;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use siphon_api::{Resource, TransferError};
use siphon_pipeline::bus;
use siphon_pipeline::{Sink, SnapshotReader, SnapshotWriter, Source, StoreReader, StoreWriter};

use crate::config::MigrationConfig;
use crate::connect::{StoreConn, open_store};
use crate::signal;

// ════════════════════════════════════════════════════════════════
//  Outcome
// ════════════════════════════════════════════════════════════════

/// Terminal result of a migration that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Every task returned without error.
    Completed { records: u64 },
    /// An operator interrupt drained the pipeline cleanly.
    Cancelled,
}

/// Orchestrator state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

// ════════════════════════════════════════════════════════════════
//  Migration — supervision of source, sink and signal tasks
// ════════════════════════════════════════════════════════════════

/// Wires a source and a sink to one shared bus and one shared cancellation
/// token, supervises the tasks, and aggregates the outcome.
pub struct Migration {
    bus_capacity: usize,
    state: RunState,
}

enum TaskEnd {
    Read(Result<u64, TransferError>),
    Write(Result<u64, TransferError>),
}

impl Migration {
    pub fn new(bus_capacity: usize) -> Self {
        Self {
            bus_capacity: bus_capacity.max(1),
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Run to a terminal state.
    ///
    /// The first task to fail with a non-cancellation error cancels the
    /// shared token; siblings unwind at their next suspension point and the
    /// first real error is surfaced. An interrupt travels the same
    /// cancellation path but terminates as clean [`Outcome::Cancelled`].
    pub async fn run<C, F>(
        &mut self,
        source: Source<C>,
        sink: Sink<C>,
        interrupt: F,
    ) -> Result<Outcome, TransferError>
    where
        C: ConnectionLike + Clone + Send + 'static,
        F: Future<Output = ()> + Send + 'static,
    {
        self.state = RunState::Running;
        let (tx, rx) = bus::bounded(self.bus_capacity);
        let token = CancellationToken::new();

        let listener = tokio::spawn(signal::listen(interrupt, token.clone()));

        let mut tasks = JoinSet::new();
        {
            let token = token.clone();
            tasks.spawn(async move { TaskEnd::Read(source.read(tx, token).await) });
        }
        {
            let token = token.clone();
            tasks.spawn(async move { TaskEnd::Write(sink.write(rx, token).await) });
        }

        let mut installed = 0u64;
        let mut first_err: Option<TransferError> = None;
        while let Some(joined) = tasks.join_next().await {
            let end = match joined {
                Ok(end) => end,
                Err(e) => {
                    token.cancel();
                    if first_err.is_none() {
                        first_err = Some(TransferError::new(format!("task failed: {e}")));
                    }
                    continue;
                }
            };
            match end {
                TaskEnd::Read(Ok(n)) => tracing::debug!(records = n, "source drained"),
                TaskEnd::Write(Ok(n)) => installed = n,
                TaskEnd::Read(Err(e)) | TaskEnd::Write(Err(e)) => {
                    if !e.is_cancelled() {
                        token.cancel();
                        if first_err.is_none() {
                            first_err = Some(e);
                        } else {
                            tracing::debug!(error = %e, "subsequent task failure");
                        }
                    }
                }
            }
        }

        // Interrupt-driven cancellation must be read before the token is
        // fired again just to release the listener.
        let interrupted = first_err.is_none() && token.is_cancelled();
        token.cancel();
        let _ = listener.await;

        match first_err {
            Some(e) => {
                self.state = RunState::Failed;
                tracing::error!(error = %e, "migration failed");
                Err(e)
            }
            None if interrupted => {
                self.state = RunState::Cancelled;
                tracing::info!("migration cancelled");
                Ok(Outcome::Cancelled)
            }
            None => {
                self.state = RunState::Completed;
                tracing::info!(records = installed, "migration complete");
                Ok(Outcome::Completed { records: installed })
            }
        }
    }
}

// ════════════════════════════════════════════════════════════════
//  Config-driven entry point
// ════════════════════════════════════════════════════════════════

/// Open whatever clients the endpoints need, wire the pipeline, and run it
/// under `ctrl_c` as the interrupt source.
pub async fn run(cfg: MigrationConfig) -> Result<Outcome, TransferError> {
    tracing::info!(source = %cfg.source, target = %cfg.target, "migration starting");

    let source = build_source(&cfg).await?;
    let sink = build_sink(&cfg).await?;

    Migration::new(cfg.bus_capacity)
        .run(source, sink, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}

async fn build_source(cfg: &MigrationConfig) -> Result<Source<StoreConn>, TransferError> {
    match &cfg.source {
        Resource::Store(endpoint) => {
            let conn = open_store(endpoint).await?;
            Ok(Source::Store(StoreReader::new(conn, cfg.scan_options())))
        }
        Resource::File(endpoint) => Ok(Source::File(
            SnapshotReader::new(endpoint).with_batch_hint(cfg.scan_count),
        )),
    }
}

async fn build_sink(cfg: &MigrationConfig) -> Result<Sink<StoreConn>, TransferError> {
    match &cfg.target {
        Resource::Store(endpoint) => {
            let conn = open_store(endpoint).await?;
            Ok(Sink::Store(StoreWriter::new(conn, cfg.write_workers)))
        }
        Resource::File(endpoint) => Ok(Sink::File(SnapshotWriter::new(endpoint))),
    }
}
