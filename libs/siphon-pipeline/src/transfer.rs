use redis::aio::ConnectionLike;
use tokio_util::sync::CancellationToken;

use siphon_api::{RecordBatch, TransferError};

use crate::bus::{BusReceiver, BusSender};
use crate::snapshot::{SnapshotReader, SnapshotWriter};
use crate::store::{StoreReader, StoreWriter};

// ════════════════════════════════════════════════════════════════
//  Capability seam — the engine depends only on these
// ════════════════════════════════════════════════════════════════

/// A record producer: store-backed or snapshot-file-backed.
pub enum Source<C> {
    Store(StoreReader<C>),
    File(SnapshotReader),
}

impl<C: ConnectionLike + Clone + Send + 'static> Source<C> {
    /// Produce records onto the bus until the keyspace is exhausted; the
    /// bus closes when this returns. Returns the number of records
    /// produced.
    pub async fn read(
        self,
        bus: BusSender<RecordBatch>,
        token: CancellationToken,
    ) -> Result<u64, TransferError> {
        match self {
            Source::Store(reader) => reader.read(bus, token).await,
            Source::File(reader) => reader.read(bus, token).await,
        }
    }
}

/// A record consumer: store-backed or snapshot-file-backed.
pub enum Sink<C> {
    Store(StoreWriter<C>),
    File(SnapshotWriter),
}

impl<C: ConnectionLike + Clone + Send + 'static> Sink<C> {
    /// Drain the bus until closed-and-drained, installing every record.
    /// Returns the number of records installed.
    pub async fn write(
        self,
        bus: BusReceiver<RecordBatch>,
        token: CancellationToken,
    ) -> Result<u64, TransferError> {
        match self {
            Sink::Store(writer) => writer.write(bus, token).await,
            Sink::File(writer) => writer.write(bus, token).await,
        }
    }
}
