use redis::aio::{ConnectionLike, ConnectionManager};
use redis::cluster::ClusterClient;
use redis::cluster_async::ClusterConnection;
use redis::{Cmd, Pipeline, RedisFuture, Value};

use siphon_api::{StoreEndpoint, TransferError};

// ════════════════════════════════════════════════════════════════
//  StoreConn — one opened client handle, single node or cluster
// ════════════════════════════════════════════════════════════════

/// The opened store client the pipeline consumes. Cloning is cheap and the
/// clone is safe for concurrent use by reader/writer workers.
#[derive(Clone)]
pub enum StoreConn {
    Single(ConnectionManager),
    Cluster(ClusterConnection),
}

impl ConnectionLike for StoreConn {
    fn req_packed_command<'a>(&'a mut self, cmd: &'a Cmd) -> RedisFuture<'a, Value> {
        match self {
            StoreConn::Single(conn) => conn.req_packed_command(cmd),
            StoreConn::Cluster(conn) => conn.req_packed_command(cmd),
        }
    }

    fn req_packed_commands<'a>(
        &'a mut self,
        cmd: &'a Pipeline,
        offset: usize,
        count: usize,
    ) -> RedisFuture<'a, Vec<Value>> {
        match self {
            StoreConn::Single(conn) => conn.req_packed_commands(cmd, offset, count),
            StoreConn::Cluster(conn) => conn.req_packed_commands(cmd, offset, count),
        }
    }

    fn get_db(&self) -> i64 {
        match self {
            StoreConn::Single(conn) => conn.get_db(),
            StoreConn::Cluster(_) => 0,
        }
    }
}

/// Open a client for the endpoint and prove connectivity with one `PING`
/// round trip before the pipeline starts. TLS and auth ride on the
/// connection URL; cluster endpoints get topology discovery from the
/// cluster client.
pub async fn open_store(endpoint: &StoreEndpoint) -> Result<StoreConn, TransferError> {
    let url = endpoint.connection_url();
    let mut conn = if endpoint.is_cluster() {
        let client = ClusterClient::builder(vec![url])
            .build()
            .map_err(|e| TransferError::store(format!("cluster client {}: {e}", endpoint.addr())))?;
        let conn = client
            .get_async_connection()
            .await
            .map_err(|e| TransferError::store(format!("connect {}: {e}", endpoint.addr())))?;
        StoreConn::Cluster(conn)
    } else {
        let client = redis::Client::open(url.as_str())
            .map_err(|e| TransferError::store(format!("client {}: {e}", endpoint.addr())))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| TransferError::store(format!("connect {}: {e}", endpoint.addr())))?;
        StoreConn::Single(conn)
    };

    let _: String = redis::cmd("PING")
        .query_async(&mut conn)
        .await
        .map_err(|e| TransferError::store(format!("ping {}: {e}", endpoint.addr())))?;

    tracing::info!(addr = %endpoint.addr(), cluster = endpoint.is_cluster(), "store connected");
    Ok(conn)
}
