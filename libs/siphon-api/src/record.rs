// ════════════════════════════════════════════════════════════════
//  Record
// ════════════════════════════════════════════════════════════════

/// TTL value meaning "no expiration".
pub const TTL_NONE: i64 = 0;

/// Store PTTL reply for a key without an expiry.
pub const PTTL_NO_EXPIRY: i64 = -1;

/// Store PTTL reply for a key that no longer exists (already expired).
pub const PTTL_MISSING: i64 = -2;

/// One key/value/ttl triple migrated as a unit.
///
/// The value is the store's own binary serialization (`DUMP` payload) and
/// must round-trip unmodified. Immutable once produced.
#[derive(Clone, PartialEq, Eq)]
pub struct Record {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    /// Milliseconds to live; `0` = no expiration.
    pub ttl_ms: i64,
}

impl Record {
    pub fn new(key: Vec<u8>, value: Vec<u8>, ttl_ms: i64) -> Self {
        Self { key, value, ttl_ms }
    }
}

impl std::fmt::Debug for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Record")
            .field("key", &String::from_utf8_lossy(&self.key))
            .field("value_len", &self.value.len())
            .field("ttl_ms", &self.ttl_ms)
            .finish()
    }
}

/// An ordered run of records sharing one round of store interaction.
/// Exists only to amortize round trips; never persisted.
pub type RecordBatch = Vec<Record>;

/// Normalize a raw store PTTL reply into a record TTL.
///
/// `-1` (no expiry) becomes `0`; any other negative reply means the key
/// is already gone and the record must be dropped (`None`).
pub fn normalize_pttl(pttl: i64) -> Option<i64> {
    match pttl {
        PTTL_NO_EXPIRY => Some(TTL_NONE),
        t if t < 0 => None,
        t => Some(t),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_expiry_normalizes_to_none_marker() {
        assert_eq!(normalize_pttl(PTTL_NO_EXPIRY), Some(TTL_NONE));
    }

    #[test]
    fn expired_key_is_dropped() {
        assert_eq!(normalize_pttl(PTTL_MISSING), None);
        assert_eq!(normalize_pttl(-3), None);
    }

    #[test]
    fn live_ttl_passes_through() {
        assert_eq!(normalize_pttl(0), Some(0));
        assert_eq!(normalize_pttl(30_000), Some(30_000));
    }

    #[test]
    fn record_debug_hides_binary_value() {
        let r = Record::new(b"user:1".to_vec(), vec![0x00, 0xE2, 0xFF], 0);
        let s = format!("{r:?}");
        assert!(s.contains("user:1"));
        assert!(s.contains("value_len"));
    }
}
