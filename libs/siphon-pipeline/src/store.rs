use redis::Value;
use redis::aio::ConnectionLike;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use siphon_api::{Record, RecordBatch, TransferError, normalize_pttl};

use crate::bus::{self, BusReceiver, BusSender};

// ════════════════════════════════════════════════════════════════
//  Scan options
// ════════════════════════════════════════════════════════════════

/// Keyspace extraction tuning.
#[derive(Clone, Debug)]
pub struct ScanOptions {
    /// Glob pattern limiting which keys are migrated.
    pub pattern: String,
    /// Page size hint passed to the cursor enumeration.
    pub count: usize,
    /// Query each key's remaining TTL instead of assuming the default.
    pub ttl_sync: bool,
    /// TTL applied to every key when TTL sync is off (0 = no expiration).
    pub default_ttl_ms: i64,
    /// Concurrent extraction workers.
    pub workers: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            pattern: "*".to_string(),
            count: 100,
            ttl_sync: false,
            default_ttl_ms: 0,
            workers: 1,
        }
    }
}

// ════════════════════════════════════════════════════════════════
//  StoreReader — SCAN → pipelined DUMP/PTTL → bus
// ════════════════════════════════════════════════════════════════

/// Enumerates the full keyspace of an opened store and produces one record
/// per surviving key onto the bus.
pub struct StoreReader<C> {
    conn: C,
    opts: ScanOptions,
}

impl<C: ConnectionLike + Clone + Send + 'static> StoreReader<C> {
    pub fn new(conn: C, opts: ScanOptions) -> Self {
        Self { conn, opts }
    }

    /// Drive the cursor enumeration to exhaustion, handing pages of key
    /// names to a fixed pool of extraction workers. Each worker resolves a
    /// page with one pipelined round trip and submits the surviving batch
    /// as one send. The bus closes once every worker has exited, on every
    /// outcome.
    ///
    /// Any store round-trip error is fatal: it cancels the shared token and
    /// is returned once the pool has unwound. Records already on the bus
    /// are not rolled back.
    pub async fn read(
        self,
        bus: BusSender<RecordBatch>,
        token: CancellationToken,
    ) -> Result<u64, TransferError> {
        let workers = self.opts.workers.max(1);
        tracing::info!(pattern = %self.opts.pattern, workers, ttl_sync = self.opts.ttl_sync, "store read starting");

        let (page_tx, page_rx) = bus::bounded::<Vec<Vec<u8>>>(workers * 2);

        let mut pool = JoinSet::new();
        for _ in 0..workers {
            pool.spawn(extract_pages(
                self.conn.clone(),
                page_rx.clone(),
                bus.clone(),
                self.opts.clone(),
                token.clone(),
            ));
        }
        // Workers hold the only bus handles now; the last one to exit
        // closes the bus.
        drop(page_rx);
        drop(bus);

        let scan = scan_keyspace(self.conn, page_tx, &self.opts, &token).await;
        let mut first_err = match scan {
            Err(e) if !e.is_cancelled() => {
                token.cancel();
                Some(e)
            }
            Err(e) => Some(e),
            Ok(()) => None,
        };

        let mut produced = 0u64;
        while let Some(joined) = pool.join_next().await {
            let result = joined
                .unwrap_or_else(|e| Err(TransferError::new(format!("reader worker failed: {e}"))));
            match result {
                Ok(n) => produced += n,
                Err(e) => first_err = Some(prefer(first_err, e)),
            }
        }

        if let Some(e) = first_err {
            return Err(e);
        }
        tracing::info!(records = produced, "store read complete");
        Ok(produced)
    }
}

/// Keep the first real error; a cancelled marker only stands in while no
/// real failure has been seen.
fn prefer(current: Option<TransferError>, new: TransferError) -> TransferError {
    match current {
        Some(c) if !c.is_cancelled() || new.is_cancelled() => c,
        _ => new,
    }
}

/// Cursor loop: one `SCAN` round trip per page, pages handed to the worker
/// pool. Runs until the store reports cursor 0.
async fn scan_keyspace<C: ConnectionLike + Send>(
    mut conn: C,
    pages: BusSender<Vec<Vec<u8>>>,
    opts: &ScanOptions,
    token: &CancellationToken,
) -> Result<(), TransferError> {
    let mut cursor: u64 = 0;
    loop {
        if token.is_cancelled() {
            return Err(TransferError::cancelled("store scan: token fired"));
        }

        let mut cmd = redis::cmd("SCAN");
        cmd.arg(cursor)
            .arg("MATCH")
            .arg(&opts.pattern)
            .arg("COUNT")
            .arg(opts.count);
        let (next, keys): (u64, Vec<Vec<u8>>) = cmd
            .query_async(&mut conn)
            .await
            .map_err(|e| TransferError::store(format!("scan: {e}")))?;

        if !keys.is_empty() {
            tracing::debug!(keys = keys.len(), cursor = next, "scanned page");
            tokio::select! {
                _ = token.cancelled() => {
                    return Err(TransferError::cancelled("store scan: token fired"));
                }
                sent = pages.send(keys) => {
                    if sent.is_err() {
                        return Err(TransferError::cancelled("store scan: workers gone"));
                    }
                }
            }
        }

        cursor = next;
        if cursor == 0 {
            return Ok(());
        }
    }
}

/// Worker loop: take a page of key names, resolve it with one pipelined
/// round trip, submit the surviving batch as one send. A fatal store error
/// cancels the shared token so the scan loop and sibling workers unwind.
async fn extract_pages<C: ConnectionLike + Send>(
    mut conn: C,
    pages: BusReceiver<Vec<Vec<u8>>>,
    bus: BusSender<RecordBatch>,
    opts: ScanOptions,
    token: CancellationToken,
) -> Result<u64, TransferError> {
    let mut produced = 0u64;
    loop {
        let page = tokio::select! {
            _ = token.cancelled() => {
                return Err(TransferError::cancelled("store read: token fired"));
            }
            page = pages.recv() => match page {
                Some(page) => page,
                None => return Ok(produced),
            },
        };

        let batch = match dump_page(&mut conn, &page, &opts).await {
            Ok(batch) => batch,
            Err(e) => {
                token.cancel();
                return Err(e);
            }
        };
        if batch.is_empty() {
            continue;
        }

        let n = batch.len();
        tokio::select! {
            _ = token.cancelled() => {
                return Err(TransferError::cancelled("store read: token fired"));
            }
            sent = bus.send(batch) => {
                if sent.is_err() {
                    return Err(TransferError::cancelled("store read: bus closed"));
                }
            }
        }
        produced += n as u64;
        tracing::debug!(records = n, "page extracted");
    }
}

/// One pipelined round trip for a page: `DUMP` per key, plus `PTTL` per key
/// when TTL sync is enabled. Keys that vanished between scan and dump, and
/// keys whose TTL says "already expired", are silently dropped.
async fn dump_page<C: ConnectionLike + Send>(
    conn: &mut C,
    keys: &[Vec<u8>],
    opts: &ScanOptions,
) -> Result<RecordBatch, TransferError> {
    let mut pipe = redis::pipe();
    for key in keys {
        pipe.cmd("DUMP").arg(key);
    }
    if opts.ttl_sync {
        for key in keys {
            pipe.cmd("PTTL").arg(key);
        }
    }

    let replies: Vec<Value> = pipe
        .query_async(conn)
        .await
        .map_err(|e| TransferError::store(format!("dump: {e}")))?;
    let expected = if opts.ttl_sync { keys.len() * 2 } else { keys.len() };
    if replies.len() != expected {
        return Err(TransferError::store(format!(
            "dump: short pipeline reply ({} of {expected})",
            replies.len()
        )));
    }

    let mut batch = Vec::with_capacity(keys.len());
    for (i, key) in keys.iter().enumerate() {
        let value: Option<Vec<u8>> = redis::from_redis_value(&replies[i])
            .map_err(|e| TransferError::store(format!("dump reply: {e}")))?;
        let Some(value) = value else {
            continue;
        };

        let raw_ttl = if opts.ttl_sync {
            redis::from_redis_value::<i64>(&replies[keys.len() + i])
                .map_err(|e| TransferError::store(format!("pttl reply: {e}")))?
        } else {
            opts.default_ttl_ms
        };
        let Some(ttl_ms) = normalize_pttl(raw_ttl) else {
            continue;
        };

        batch.push(Record::new(key.clone(), value, ttl_ms));
    }
    Ok(batch)
}

// ════════════════════════════════════════════════════════════════
//  StoreWriter — bus → pipelined RESTORE
// ════════════════════════════════════════════════════════════════

/// Drains record batches off the bus and installs them, unconditionally
/// overwriting any existing value at each key.
pub struct StoreWriter<C> {
    conn: C,
    workers: usize,
}

impl<C: ConnectionLike + Clone + Send + 'static> StoreWriter<C> {
    pub fn new(conn: C, workers: usize) -> Self {
        Self { conn, workers }
    }

    /// Run the install pool until the bus reports closed-and-drained; every
    /// worker is joined before completion is declared. An install error is
    /// fatal for its worker and cancels the shared token so siblings unwind.
    pub async fn write(
        self,
        bus: BusReceiver<RecordBatch>,
        token: CancellationToken,
    ) -> Result<u64, TransferError> {
        let workers = self.workers.max(1);
        tracing::info!(workers, "store write starting");

        let mut pool = JoinSet::new();
        for _ in 0..workers {
            pool.spawn(install_batches(self.conn.clone(), bus.clone(), token.clone()));
        }
        drop(bus);

        let mut installed = 0u64;
        let mut first_err: Option<TransferError> = None;
        while let Some(joined) = pool.join_next().await {
            let result = joined
                .unwrap_or_else(|e| Err(TransferError::new(format!("writer worker failed: {e}"))));
            match result {
                Ok(n) => installed += n,
                Err(e) => first_err = Some(prefer(first_err, e)),
            }
        }

        if let Some(e) = first_err {
            return Err(e);
        }
        tracing::info!(records = installed, "store write complete");
        Ok(installed)
    }
}

async fn install_batches<C: ConnectionLike + Send>(
    mut conn: C,
    bus: BusReceiver<RecordBatch>,
    token: CancellationToken,
) -> Result<u64, TransferError> {
    let mut installed = 0u64;
    loop {
        let batch = tokio::select! {
            _ = token.cancelled() => {
                return Err(TransferError::cancelled("store write: token fired"));
            }
            batch = bus.recv() => match batch {
                Some(batch) => batch,
                None => return Ok(installed),
            },
        };

        if let Err(e) = restore_batch(&mut conn, &batch).await {
            token.cancel();
            return Err(e);
        }
        installed += batch.len() as u64;
        tracing::debug!(records = batch.len(), "batch installed");
    }
}

/// One pipelined round trip: `RESTORE key ttl value REPLACE` per record.
async fn restore_batch<C: ConnectionLike + Send>(
    conn: &mut C,
    batch: &RecordBatch,
) -> Result<(), TransferError> {
    let mut pipe = redis::pipe();
    for record in batch {
        pipe.cmd("RESTORE")
            .arg(&record.key)
            .arg(record.ttl_ms)
            .arg(&record.value)
            .arg("REPLACE");
    }
    let _: Vec<Value> = pipe
        .query_async(conn)
        .await
        .map_err(|e| TransferError::store(format!("restore: {e}")))?;
    Ok(())
}
