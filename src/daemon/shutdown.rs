use tokio::select;
use tokio_util::sync::CancellationToken;

/// Detects signals sent to the process and requests a clean shutdown. On unix both
/// ctrl-c and SIGTERM are handled, since service managers stop daemons with the latter.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = match signal(SignalKind::terminate()) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!("Couldn't install SIGTERM handler {e:?}");
                let _ = tokio::signal::ctrl_c().await;
                cancelation.cancel();
                return;
            }
        };
        select! {
            _ = tokio::signal::ctrl_c() => {
                cancelation.cancel();
            },
            _ = term.recv() => {
                cancelation.cancel();
            },
        };
    }
    #[cfg(not(unix))]
    {
        select! {
            _ = tokio::signal::ctrl_c() => {
                cancelation.cancel();
            },
        };
    }
}
