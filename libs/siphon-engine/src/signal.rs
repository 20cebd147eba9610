use std::future::Future;

use tokio_util::sync::CancellationToken;

/// Await an operator interrupt and fan it out as cancellation.
///
/// The interrupt source is injected (the binary passes `ctrl_c`, tests pass
/// a channel) so shutdown is exercisable without real signals. The listener
/// itself is released through the same token once the pipeline has drained.
pub async fn listen(interrupt: impl Future<Output = ()>, token: CancellationToken) {
    tokio::select! {
        _ = interrupt => {
            tracing::info!("interrupt received, cancelling");
            token.cancel();
        }
        _ = token.cancelled() => {
            tracing::debug!("signal listener released");
        }
    }
}
