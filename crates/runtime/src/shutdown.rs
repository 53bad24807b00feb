//! Signal-driven process shutdown.

use std::future::Future;

use tokio::signal::unix::{SignalKind, signal};
use tracing::{debug, error};

/// Resolves once the process receives SIGINT or SIGTERM.
///
/// Usable directly as a graceful-shutdown trigger for axum servers. If a
/// signal handler cannot be installed that source is disabled and logged,
/// leaving the other one active.
pub async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(err = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                error!(err = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        () = interrupt => debug!("received SIGINT"),
        () = terminate => debug!("received SIGTERM"),
    }
}

/// Drive `fut` to completion unless a shutdown signal arrives first, in
/// which case `on_shutdown` runs and the process exits cleanly.
pub async fn run_until_shutdown<F, O, C>(fut: F, on_shutdown: C) -> O
where
    F: Future<Output = O>,
    C: FnOnce(),
{
    tokio::select! {
        // Boxed so the service future's state machine lives on the heap.
        result = Box::pin(fut) => result,
        () = shutdown_signal() => {
            on_shutdown();
            std::process::exit(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::run_until_shutdown;
    use std::time::Duration;

    #[tokio::test]
    async fn completes_the_wrapped_future_without_a_signal() {
        let result = run_until_shutdown(
            async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                "completed"
            },
            || {},
        )
        .await;
        assert_eq!(result, "completed");
    }
}
