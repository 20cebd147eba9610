use std::path::PathBuf;

use url::Url;

use crate::error::TransferError;

/// Default cap on a single snapshot field (key or value), in bytes.
pub const DEFAULT_MAX_FIELD: usize = 64 * 1024 * 1024;

/// Store URI schemes: `redis`/`rediss` single node, `credis`/`crediss`
/// cluster; the trailing `s` selects TLS. Anything else is a file path.
const STORE_SCHEMES: [&str; 4] = ["redis", "rediss", "credis", "crediss"];

// ════════════════════════════════════════════════════════════════
//  Resource
// ════════════════════════════════════════════════════════════════

/// A migration endpoint: either a live store or a snapshot file.
#[derive(Clone, Debug)]
pub enum Resource {
    Store(StoreEndpoint),
    File(FileEndpoint),
}

impl Resource {
    /// Classify a raw endpoint descriptor.
    ///
    /// A string that parses as a URL with a store scheme is a store;
    /// everything else is taken verbatim as a snapshot file path.
    pub fn parse(raw: &str) -> Result<Self, TransferError> {
        if raw.is_empty() {
            return Err(TransferError::config("empty endpoint"));
        }

        if let Ok(url) = Url::parse(raw) {
            if STORE_SCHEMES.contains(&url.scheme()) {
                if url.host_str().is_none() {
                    return Err(TransferError::config(format!(
                        "store endpoint '{raw}' has no host"
                    )));
                }
                return Ok(Resource::Store(StoreEndpoint { url }));
            }
        }

        Ok(Resource::File(FileEndpoint {
            path: PathBuf::from(raw),
            max_field: DEFAULT_MAX_FIELD,
        }))
    }

    pub fn is_store(&self) -> bool {
        matches!(self, Resource::Store(_))
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // Redacted form: never echo credentials into logs.
            Resource::Store(ep) => write!(f, "{}://{}", ep.url.scheme(), ep.addr()),
            Resource::File(ep) => write!(f, "{}", ep.path.display()),
        }
    }
}

// ════════════════════════════════════════════════════════════════
//  StoreEndpoint
// ════════════════════════════════════════════════════════════════

/// Connectivity parameters of a live store, validated at parse time.
/// The pipeline core only ever sees the opened client built from this.
#[derive(Clone, Debug)]
pub struct StoreEndpoint {
    url: Url,
}

impl StoreEndpoint {
    pub fn is_secure(&self) -> bool {
        matches!(self.url.scheme(), "rediss" | "crediss")
    }

    pub fn is_cluster(&self) -> bool {
        matches!(self.url.scheme(), "credis" | "crediss")
    }

    /// Auth secret: the userinfo password, or a bare username used in
    /// the `redis://secret@host` shorthand.
    pub fn password(&self) -> Option<&str> {
        match self.url.password() {
            Some(p) => Some(p),
            None if !self.url.username().is_empty() => Some(self.url.username()),
            None => None,
        }
    }

    /// `host:port` (or bare host) for display and cluster seeding.
    pub fn addr(&self) -> String {
        let host = self.url.host_str().unwrap_or_default();
        match self.url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    /// URL understood by the client library: cluster schemes collapse to
    /// their single-node form, a bare-username secret moves into the
    /// password slot, and cluster URLs drop the db path.
    pub fn connection_url(&self) -> String {
        let mut url = self.url.clone();
        let scheme = if self.is_secure() { "rediss" } else { "redis" };
        let _ = url.set_scheme(scheme);
        if url.password().is_none() && !url.username().is_empty() {
            let secret = url.username().to_string();
            let _ = url.set_username("");
            let _ = url.set_password(Some(&secret));
        }
        if self.is_cluster() {
            url.set_path("");
        }
        url.to_string()
    }
}

// ════════════════════════════════════════════════════════════════
//  FileEndpoint
// ════════════════════════════════════════════════════════════════

/// A snapshot file endpoint: a path plus the cap on a single field.
#[derive(Clone, Debug)]
pub struct FileEndpoint {
    pub path: PathBuf,
    pub max_field: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(raw: &str) -> StoreEndpoint {
        match Resource::parse(raw).unwrap() {
            Resource::Store(ep) => ep,
            Resource::File(_) => panic!("{raw} should be a store"),
        }
    }

    #[test]
    fn plain_scheme_is_store() {
        let ep = store("redis://127.0.0.1:6379/0");
        assert!(!ep.is_secure());
        assert!(!ep.is_cluster());
        assert_eq!(ep.addr(), "127.0.0.1:6379");
    }

    #[test]
    fn secure_and_cluster_schemes() {
        assert!(store("rediss://s").is_secure());
        assert!(!store("rediss://s").is_cluster());
        assert!(store("credis://s").is_cluster());
        assert!(!store("credis://s").is_secure());
        let both = store("crediss://s");
        assert!(both.is_secure() && both.is_cluster());
    }

    #[test]
    fn bare_userinfo_is_the_auth_secret() {
        let ep = store("redis://sekret@s:6379");
        assert_eq!(ep.password(), Some("sekret"));
        assert_eq!(ep.connection_url(), "redis://:sekret@s:6379");
    }

    #[test]
    fn explicit_password_wins() {
        let ep = store("redis://user:pw@s:6379");
        assert_eq!(ep.password(), Some("pw"));
    }

    #[test]
    fn cluster_url_collapses_for_the_client() {
        let ep = store("credis://s:7000/0");
        assert_eq!(ep.connection_url(), "redis://s:7000");
    }

    #[test]
    fn path_is_a_file() {
        match Resource::parse("/tmp/dump.siphon").unwrap() {
            Resource::File(ep) => {
                assert_eq!(ep.path, PathBuf::from("/tmp/dump.siphon"));
                assert_eq!(ep.max_field, DEFAULT_MAX_FIELD);
            }
            Resource::Store(_) => panic!("path should be a file"),
        }
    }

    #[test]
    fn relative_path_is_a_file() {
        assert!(!Resource::parse("dump.siphon").unwrap().is_store());
    }

    #[test]
    fn empty_endpoint_rejected() {
        assert!(Resource::parse("").is_err());
    }

    #[test]
    fn display_redacts_credentials() {
        let r = Resource::parse("redis://sekret@s:6379").unwrap();
        let shown = r.to_string();
        assert!(!shown.contains("sekret"));
        assert_eq!(shown, "redis://s:6379");
    }
}
