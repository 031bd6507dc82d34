use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

// One root token per role process. SIGINT and SIGTERM both cancel it, and
// every long-running loop treats cancellation as clean shutdown.
pub fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let signal_token = token.clone();

    tokio::spawn(async move {
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(error) => {
                log::error!("Failed to install the SIGTERM handler {:?}", error);
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => (),
            _ = sigterm.recv() => (),
        }

        signal_token.cancel();
    });

    token
}
