use std::path::PathBuf;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;

use siphon_api::{FileEndpoint, Record, RecordBatch, TTL_NONE, TransferError, normalize_pttl};

use crate::bus::{BusReceiver, BusSender};

/// Field terminator: two U+271D crosses, 6 bytes. Chosen because the
/// sequence is exceedingly unlikely inside store-serialized binary
/// payloads; the format is sentinel-framed, not length-prefixed.
pub const SEPARATOR: &[u8] = "✝✝".as_bytes();

const READ_CHUNK: usize = 8 * 1024;
const DEFAULT_BATCH: usize = 100;

// ════════════════════════════════════════════════════════════════
//  SnapshotReader — file → bus
// ════════════════════════════════════════════════════════════════

/// Streams a snapshot file, splitting on the separator and reconstructing
/// successive key/value/ttl triples into records.
pub struct SnapshotReader {
    path: PathBuf,
    max_field: usize,
    batch_hint: usize,
}

impl SnapshotReader {
    pub fn new(endpoint: &FileEndpoint) -> Self {
        Self {
            path: endpoint.path.clone(),
            max_field: endpoint.max_field,
            batch_hint: DEFAULT_BATCH,
        }
    }

    /// Records per bus submission.
    pub fn with_batch_hint(mut self, batch_hint: usize) -> Self {
        self.batch_hint = batch_hint.max(1);
        self
    }

    /// Tokenize the file into records and forward them in batches. A stream
    /// ending mid-triple is treated as end-of-stream, never as synthesized
    /// data. The bus closes when this task returns, on every outcome.
    pub async fn read(
        self,
        bus: BusSender<RecordBatch>,
        token: CancellationToken,
    ) -> Result<u64, TransferError> {
        let mut file = File::open(&self.path)
            .await
            .map_err(|e| TransferError::codec(format!("open {}: {e}", self.path.display())))?;
        tracing::info!(path = %self.path.display(), "snapshot read starting");

        let mut buf: Vec<u8> = Vec::with_capacity(READ_CHUNK * 2);
        let mut chunk = [0u8; READ_CHUNK];
        let mut scanned = 0usize;
        let mut triple: Vec<Vec<u8>> = Vec::with_capacity(3);
        let mut batch: RecordBatch = Vec::new();
        let mut produced = 0u64;

        loop {
            // Drain every complete field currently buffered.
            while let Some(pos) = find_separator(&buf, scanned) {
                let field = buf[..pos].to_vec();
                buf.drain(..pos + SEPARATOR.len());
                scanned = 0;

                if field.len() > self.max_field {
                    return Err(TransferError::codec(format!(
                        "field of {} bytes exceeds the {} byte cap",
                        field.len(),
                        self.max_field
                    )));
                }

                triple.push(field);
                if triple.len() == 3 {
                    let ttl_field = triple.pop().unwrap();
                    let value = triple.pop().unwrap();
                    let key = triple.pop().unwrap();
                    if let Some(ttl_ms) = normalize_pttl(parse_ttl(&ttl_field)?) {
                        batch.push(Record::new(key, value, ttl_ms));
                        if batch.len() >= self.batch_hint {
                            produced += batch.len() as u64;
                            send_batch(&bus, std::mem::take(&mut batch), &token).await?;
                        }
                    }
                }
            }
            // No separator in the tail; remember where the search stopped
            // so a large value is not rescanned on every chunk.
            scanned = buf.len().saturating_sub(SEPARATOR.len() - 1);

            if buf.len() > self.max_field + SEPARATOR.len() {
                return Err(TransferError::codec(format!(
                    "unterminated field beyond the {} byte cap",
                    self.max_field
                )));
            }

            let n = tokio::select! {
                _ = token.cancelled() => {
                    return Err(TransferError::cancelled("snapshot read: token fired"));
                }
                read = file.read(&mut chunk) => read
                    .map_err(|e| TransferError::codec(format!("read {}: {e}", self.path.display())))?,
            };
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }

        if !batch.is_empty() {
            produced += batch.len() as u64;
            send_batch(&bus, batch, &token).await?;
        }
        tracing::info!(records = produced, "snapshot read complete");
        Ok(produced)
    }
}

async fn send_batch(
    bus: &BusSender<RecordBatch>,
    batch: RecordBatch,
    token: &CancellationToken,
) -> Result<(), TransferError> {
    tracing::debug!(records = batch.len(), "batch decoded");
    tokio::select! {
        _ = token.cancelled() => Err(TransferError::cancelled("snapshot read: token fired")),
        sent = bus.send(batch) => {
            sent.map_err(|_| TransferError::cancelled("snapshot read: bus closed"))
        }
    }
}

/// First separator at or after `from`, as an absolute offset.
fn find_separator(buf: &[u8], from: usize) -> Option<usize> {
    buf.get(from..)?
        .windows(SEPARATOR.len())
        .position(|w| w == SEPARATOR)
        .map(|i| from + i)
}

/// Decimal milliseconds-to-live; an empty field means no expiration.
fn parse_ttl(field: &[u8]) -> Result<i64, TransferError> {
    if field.is_empty() {
        return Ok(TTL_NONE);
    }
    let s = std::str::from_utf8(field)
        .map_err(|_| TransferError::codec("ttl field is not valid text"))?;
    let s = s.trim();
    if s.is_empty() {
        return Ok(TTL_NONE);
    }
    s.parse::<i64>()
        .map_err(|e| TransferError::codec(format!("bad ttl field '{s}': {e}")))
}

// ════════════════════════════════════════════════════════════════
//  SnapshotWriter — bus → file
// ════════════════════════════════════════════════════════════════

/// Appends `key✝✝value✝✝ttl✝✝` for every record drained off the bus.
pub struct SnapshotWriter {
    path: PathBuf,
}

impl SnapshotWriter {
    pub fn new(endpoint: &FileEndpoint) -> Self {
        Self { path: endpoint.path.clone() }
    }

    /// Drain the bus into the file through a buffered writer, flushed
    /// exactly once on every exit path — success, cancellation, or error —
    /// so only the triple in flight at a crash can ever be truncated.
    pub async fn write(
        self,
        bus: BusReceiver<RecordBatch>,
        token: CancellationToken,
    ) -> Result<u64, TransferError> {
        let file = File::create(&self.path)
            .await
            .map_err(|e| TransferError::codec(format!("create {}: {e}", self.path.display())))?;
        tracing::info!(path = %self.path.display(), "snapshot write starting");
        let mut out = BufWriter::new(file);

        let drained = drain_bus(&mut out, &bus, &token).await;
        let flushed = out
            .flush()
            .await
            .map_err(|e| TransferError::codec(format!("flush {}: {e}", self.path.display())));

        match (drained, flushed) {
            (Err(e), _) => Err(e),
            (Ok(_), Err(e)) => Err(e),
            (Ok(written), Ok(())) => {
                tracing::info!(records = written, "snapshot write complete");
                Ok(written)
            }
        }
    }
}

async fn drain_bus(
    out: &mut BufWriter<File>,
    bus: &BusReceiver<RecordBatch>,
    token: &CancellationToken,
) -> Result<u64, TransferError> {
    let mut written = 0u64;
    loop {
        let batch = tokio::select! {
            _ = token.cancelled() => {
                return Err(TransferError::cancelled("snapshot write: token fired"));
            }
            batch = bus.recv() => match batch {
                Some(batch) => batch,
                None => return Ok(written),
            },
        };

        for record in &batch {
            append_record(out, record).await?;
        }
        written += batch.len() as u64;
        tracing::debug!(records = batch.len(), "batch appended");
    }
}

async fn append_record(out: &mut BufWriter<File>, record: &Record) -> Result<(), TransferError> {
    let write_err = |e: std::io::Error| TransferError::codec(format!("write: {e}"));
    out.write_all(&record.key).await.map_err(write_err)?;
    out.write_all(SEPARATOR).await.map_err(write_err)?;
    out.write_all(&record.value).await.map_err(write_err)?;
    out.write_all(SEPARATOR).await.map_err(write_err)?;
    out.write_all(record.ttl_ms.to_string().as_bytes())
        .await
        .map_err(write_err)?;
    out.write_all(SEPARATOR).await.map_err(write_err)
}
