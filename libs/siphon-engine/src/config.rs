use siphon_api::Resource;
use siphon_pipeline::ScanOptions;
use siphon_pipeline::bus;

pub const DEFAULT_SCAN_COUNT: usize = 100;
pub const DEFAULT_WORKERS: usize = 1;
pub const DEFAULT_PATTERN: &str = "*";

/// Everything the engine needs to run one migration. Endpoint descriptors
/// arrive already validated; the engine only opens clients and wires tasks.
#[derive(Clone, Debug)]
pub struct MigrationConfig {
    pub source: Resource,
    pub target: Resource,
    /// Query each key's remaining TTL instead of assuming the default.
    pub ttl_sync: bool,
    /// TTL applied to every key when TTL sync is off (0 = none).
    pub default_ttl_ms: i64,
    /// Keyspace scan page size hint; also the snapshot batch size.
    pub scan_count: usize,
    /// Glob pattern limiting which keys are migrated.
    pub pattern: String,
    /// Concurrent extraction workers on the source store.
    pub read_workers: usize,
    /// Concurrent install workers on the target store.
    pub write_workers: usize,
    /// Record batches buffered between reader and writer.
    pub bus_capacity: usize,
}

impl MigrationConfig {
    pub fn new(source: Resource, target: Resource) -> Self {
        Self {
            source,
            target,
            ttl_sync: false,
            default_ttl_ms: 0,
            scan_count: DEFAULT_SCAN_COUNT,
            pattern: DEFAULT_PATTERN.to_string(),
            read_workers: DEFAULT_WORKERS,
            write_workers: DEFAULT_WORKERS,
            bus_capacity: bus::DEFAULT_CAPACITY,
        }
    }

    pub(crate) fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            pattern: self.pattern.clone(),
            count: self.scan_count,
            ttl_sync: self.ttl_sync,
            default_ttl_ms: self.default_ttl_ms,
            workers: self.read_workers,
        }
    }
}
