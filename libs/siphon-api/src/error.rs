// ════════════════════════════════════════════════════════════════
//  Error Kinds
// ════════════════════════════════════════════════════════════════

/// Classifies a [`TransferError`] for supervision decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Generic logic error (default kind).
    Logic,
    /// Store round trip failed — connection loss, auth failure, bad reply.
    Store,
    /// Snapshot file could not be opened/parsed/written.
    Codec,
    /// Invalid configuration — permanent, fail before the pipeline starts.
    Config,
    /// Task unwound because the shared cancellation token fired.
    /// Never escalated by the supervisor.
    Cancelled,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Logic => "logic",
            ErrorKind::Store => "store",
            ErrorKind::Codec => "codec",
            ErrorKind::Config => "config",
            ErrorKind::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

// ════════════════════════════════════════════════════════════════
//  TransferError
// ════════════════════════════════════════════════════════════════

/// Error shared by every pipeline task.
pub struct TransferError {
    kind: ErrorKind,
    message: String,
}

impl TransferError {
    /// Generic logic error (default kind).
    pub fn new(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Logic, message: msg.into() }
    }

    /// Store error — any failed round trip, fatal for the owning task.
    pub fn store(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Store, message: msg.into() }
    }

    /// Codec error — snapshot file I/O or framing, fatal.
    pub fn codec(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Codec, message: msg.into() }
    }

    /// Configuration error — rejected before the pipeline starts.
    pub fn config(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Config, message: msg.into() }
    }

    /// Cooperative shutdown marker — not a failure.
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Cancelled, message: msg.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// True for the distinguished "cancelled" result the supervisor
    /// does not escalate.
    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::Cancelled
    }
}

impl std::fmt::Debug for TransferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl std::fmt::Display for TransferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for TransferError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_helpers() {
        assert_eq!(TransferError::store("x").kind(), ErrorKind::Store);
        assert_eq!(TransferError::codec("x").kind(), ErrorKind::Codec);
        assert_eq!(TransferError::config("x").kind(), ErrorKind::Config);
        assert_eq!(TransferError::new("x").kind(), ErrorKind::Logic);
    }

    #[test]
    fn cancelled_is_not_escalated() {
        let e = TransferError::cancelled("token fired");
        assert!(e.is_cancelled());
        assert!(!TransferError::store("boom").is_cancelled());
    }

    #[test]
    fn debug_includes_kind() {
        let e = TransferError::store("dump failed");
        assert_eq!(format!("{e:?}"), "[store] dump failed");
    }
}
