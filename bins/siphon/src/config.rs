use clap::Args;
use serde::Deserialize;

use siphon_api::{Resource, resource::DEFAULT_MAX_FIELD};
use siphon_engine::MigrationConfig;
use siphon_engine::config::{DEFAULT_PATTERN, DEFAULT_SCAN_COUNT, DEFAULT_WORKERS};

use crate::error::SiphonError;

// ═══════════════════════════════════════════════════════════════
//  CLI args
// ═══════════════════════════════════════════════════════════════

#[derive(Args, Clone, Debug)]
pub struct SyncArgs {
    /// Source endpoint: redis URI or snapshot file path
    #[arg(long, env = "SIPHON_FROM")]
    pub from: Option<String>,

    /// Target endpoint: redis URI or snapshot file path
    #[arg(long, env = "SIPHON_TO")]
    pub to: Option<String>,

    /// Suppress per-batch progress output
    #[arg(long)]
    pub silent: bool,

    /// Sync each key's remaining TTL
    #[arg(long)]
    pub ttl: bool,

    /// TTL in milliseconds applied when TTL sync is off (0 = none)
    #[arg(long)]
    pub default_ttl: Option<i64>,

    /// Keyspace scan page size
    #[arg(long)]
    pub count: Option<usize>,

    /// Glob pattern limiting which keys are migrated
    #[arg(long)]
    pub pattern: Option<String>,

    /// Concurrent extraction workers on the source store
    #[arg(long)]
    pub read_workers: Option<usize>,

    /// Concurrent install workers on the target store
    #[arg(long)]
    pub write_workers: Option<usize>,

    /// Cap on a single snapshot field, in bytes
    #[arg(long)]
    pub max_field: Option<usize>,

    /// Record batches buffered between reader and writer
    #[arg(long)]
    pub bus_capacity: Option<usize>,

    /// Optional TOML config file; flags win over file values
    #[arg(long, env = "SIPHON_CONFIG")]
    pub config: Option<String>,
}

// ═══════════════════════════════════════════════════════════════
//  Config file (TOML)
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub from: Option<String>,
    pub to: Option<String>,
    pub silent: Option<bool>,
    pub ttl: Option<bool>,
    pub default_ttl: Option<i64>,
    pub count: Option<usize>,
    pub pattern: Option<String>,
    pub read_workers: Option<usize>,
    pub write_workers: Option<usize>,
    pub max_field: Option<usize>,
    pub bus_capacity: Option<usize>,
}

pub fn load_config(path: &str) -> Result<FileConfig, SiphonError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| SiphonError::Config(format!("cannot read config {path}: {e}")))?;
    toml::from_str(&content).map_err(|e| SiphonError::Config(format!("bad config {path}: {e}")))
}

// ═══════════════════════════════════════════════════════════════
//  Effective — merged config
// ═══════════════════════════════════════════════════════════════

/// Final configuration after the merge: config.toml < env/CLI.
#[derive(Debug)]
pub struct Effective {
    pub silent: bool,
    pub config: MigrationConfig,
}

impl Effective {
    pub fn new(args: &SyncArgs) -> Result<Self, SiphonError> {
        let file = match &args.config {
            Some(path) => load_config(path)?,
            None => FileConfig::default(),
        };

        let from = args
            .from
            .clone()
            .or(file.from)
            .ok_or_else(|| SiphonError::Config("source not valid: --from is required".into()))?;
        let to = args
            .to
            .clone()
            .or(file.to)
            .ok_or_else(|| SiphonError::Config("target not valid: --to is required".into()))?;

        let mut source = Resource::parse(&from)
            .map_err(|e| SiphonError::Config(format!("source not valid: {e}")))?;
        let mut target = Resource::parse(&to)
            .map_err(|e| SiphonError::Config(format!("target not valid: {e}")))?;
        if !source.is_store() && !target.is_store() {
            return Err(SiphonError::Config(
                "file-only operations not supported".into(),
            ));
        }

        let max_field = args.max_field.or(file.max_field).unwrap_or(DEFAULT_MAX_FIELD);
        for resource in [&mut source, &mut target] {
            if let Resource::File(endpoint) = resource {
                endpoint.max_field = max_field;
            }
        }

        let mut config = MigrationConfig::new(source, target);
        config.ttl_sync = args.ttl || file.ttl.unwrap_or(false);
        config.default_ttl_ms = args.default_ttl.or(file.default_ttl).unwrap_or(0);
        config.scan_count = args.count.or(file.count).unwrap_or(DEFAULT_SCAN_COUNT);
        config.pattern = args
            .pattern
            .clone()
            .or(file.pattern)
            .unwrap_or_else(|| DEFAULT_PATTERN.to_string());
        config.read_workers = args.read_workers.or(file.read_workers).unwrap_or(DEFAULT_WORKERS);
        config.write_workers = args
            .write_workers
            .or(file.write_workers)
            .unwrap_or(DEFAULT_WORKERS);
        if let Some(capacity) = args.bus_capacity.or(file.bus_capacity) {
            config.bus_capacity = capacity;
        }

        Ok(Self {
            silent: args.silent || file.silent.unwrap_or(false),
            config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(from: Option<&str>, to: Option<&str>) -> SyncArgs {
        SyncArgs {
            from: from.map(str::to_string),
            to: to.map(str::to_string),
            silent: false,
            ttl: false,
            default_ttl: None,
            count: None,
            pattern: None,
            read_workers: None,
            write_workers: None,
            max_field: None,
            bus_capacity: None,
            config: None,
        }
    }

    #[test]
    fn from_is_required() {
        assert!(Effective::new(&args(None, Some("redis://t"))).is_err());
    }

    #[test]
    fn to_is_required() {
        assert!(Effective::new(&args(Some("redis://s"), None)).is_err());
    }

    #[test]
    fn file_only_operations_are_rejected() {
        let err = Effective::new(&args(Some("/s.siphon"), Some("/t.siphon"))).unwrap_err();
        assert!(err.to_string().contains("file-only"));
    }

    #[test]
    fn store_to_store_works() {
        let eff = Effective::new(&args(Some("redis://s"), Some("redis://t"))).unwrap();
        assert!(eff.config.source.is_store());
        assert!(eff.config.target.is_store());
        assert_eq!(eff.config.pattern, "*");
        assert_eq!(eff.config.scan_count, DEFAULT_SCAN_COUNT);
    }

    #[test]
    fn store_to_file_works() {
        let eff = Effective::new(&args(Some("redis://s"), Some("/t.siphon"))).unwrap();
        assert!(eff.config.source.is_store());
        assert!(!eff.config.target.is_store());
    }

    #[test]
    fn file_to_store_works() {
        let eff = Effective::new(&args(Some("/s.siphon"), Some("redis://t"))).unwrap();
        assert!(!eff.config.source.is_store());
        assert!(eff.config.target.is_store());
    }

    #[test]
    fn max_field_reaches_the_file_endpoint() {
        let mut a = args(Some("redis://s"), Some("/t.siphon"));
        a.max_field = Some(4096);
        let eff = Effective::new(&a).unwrap();
        match &eff.config.target {
            Resource::File(endpoint) => assert_eq!(endpoint.max_field, 4096),
            Resource::Store(_) => panic!("target should be a file"),
        }
    }

    #[test]
    fn flags_win_over_the_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("siphon.toml");
        std::fs::write(
            &path,
            "from = \"redis://file-src\"\nto = \"redis://file-dst\"\ncount = 500\nttl = true\n",
        )
        .unwrap();

        let mut a = args(Some("redis://cli-src"), None);
        a.count = Some(10);
        a.config = Some(path.to_string_lossy().into_owned());

        let eff = Effective::new(&a).unwrap();
        assert_eq!(eff.config.source.to_string(), "redis://cli-src");
        assert_eq!(eff.config.target.to_string(), "redis://file-dst");
        assert_eq!(eff.config.scan_count, 10);
        assert!(eff.config.ttl_sync);
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let mut a = args(Some("redis://s"), Some("redis://t"));
        a.config = Some("/nonexistent/siphon.toml".into());
        assert!(Effective::new(&a).is_err());
    }
}
