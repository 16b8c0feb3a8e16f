//! Graceful shutdown notifications.
//!
//! The server stops on SIGINT, SIGTERM, or when its cancellation token is
//! cancelled from code. Components can follow the sequence in two ways:
//!
//! - the [`CancellationToken`], cancelled as soon as shutdown starts. Open
//!   websocket connections watch it and close their message loops.
//! - [`ShutdownNotifier::subscribe`], which receives every [`ShutdownPhase`].
//!
//! ```rust,no_run
//! use axum_dispatch::{Config, Server, ShutdownPhase};
//!
//! # async fn example() -> axum_dispatch::Result<()> {
//! let server = Server::new(Config::default())?;
//! let mut phases = server.shutdown_notifier().subscribe();
//!
//! tokio::spawn(async move {
//!     while let Ok(phase) = phases.recv().await {
//!         if let ShutdownPhase::GracePeriodStarted { timeout } = phase {
//!             tracing::info!("{}s left to drain requests", timeout.as_secs());
//!         }
//!     }
//! });
//! server.run().await
//! # }
//! ```

use {
    std::time::Duration,
    tokio::{signal, sync::broadcast},
    tokio_util::sync::CancellationToken,
};

/// The phases of a graceful shutdown, in emission order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShutdownPhase {
    /// Shutdown was requested. The listener stops accepting connections and
    /// the cancellation token is cancelled.
    Initiated,

    /// In-flight requests are draining for at most `timeout`.
    GracePeriodStarted { timeout: Duration },

    /// The timeout expired before the connections drained.
    GracePeriodEnded,
}

/// Broadcasts [`ShutdownPhase`]s and owns the server cancellation token.
///
/// Clones share the same channel and token.
#[derive(Clone)]
pub struct ShutdownNotifier {
    sender: broadcast::Sender<ShutdownPhase>,
    cancel_token: CancellationToken,
}

impl ShutdownNotifier {
    /// `capacity` is the number of phases buffered per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Subscribers only see phases emitted after they subscribed.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ShutdownPhase> {
        self.sender.subscribe()
    }

    ///
    /// The token cancelled when shutdown is initiated.
    ///
    /// Cancelling it yourself starts a graceful shutdown of a running server.
    ///
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    #[must_use]
    pub fn is_shutdown_initiated(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Returns how many subscribers received the phase.
    pub(crate) fn emit(&self, phase: ShutdownPhase) -> usize {
        if phase == ShutdownPhase::Initiated {
            self.cancel_token.cancel();
        }
        self.sender.send(phase).unwrap_or(0)
    }
}

impl Default for ShutdownNotifier {
    fn default() -> Self {
        Self::new(16)
    }
}

impl std::fmt::Debug for ShutdownNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownNotifier")
            .field("subscriber_count", &self.sender.receiver_count())
            .field("is_shutdown_initiated", &self.is_shutdown_initiated())
            .finish()
    }
}

///
/// Resolves once shutdown is requested, after emitting
/// [`ShutdownPhase::Initiated`] and [`ShutdownPhase::GracePeriodStarted`].
///
/// The grace period itself is enforced by [`Server::serve`](crate::Server::serve).
/// When a signal handler cannot be installed, only the other triggers remain.
///
pub(crate) async fn shutdown_signal(timeout: Duration, notifier: ShutdownNotifier) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => tracing::debug!("Ctrl+C signal received"),
            Err(err) => {
                tracing::warn!("Failed to install Ctrl+C handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal_handler) => {
                signal_handler.recv().await;
                tracing::debug!("SIGTERM signal received");
            }
            Err(err) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let token = notifier.cancellation_token();
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = token.cancelled() => tracing::debug!("Shutdown requested through the cancellation token"),
    }

    tracing::info!(
        "Shutdown initiated, draining requests (timeout: {}s)",
        timeout.as_secs()
    );
    let subscribers = notifier.emit(ShutdownPhase::Initiated);
    tracing::debug!("Shutdown initiated notification sent to {} subscriber(s)", subscribers);
    notifier.emit(ShutdownPhase::GracePeriodStarted { timeout });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_initiated_cancels_token() {
        let notifier = ShutdownNotifier::new(8);
        let token = notifier.cancellation_token();

        assert!(!notifier.is_shutdown_initiated());
        notifier.emit(ShutdownPhase::Initiated);
        assert!(token.is_cancelled());
        assert!(notifier.is_shutdown_initiated());
    }

    #[tokio::test]
    async fn test_emit_counts_subscribers() {
        let notifier = ShutdownNotifier::default();
        assert_eq!(notifier.emit(ShutdownPhase::GracePeriodEnded), 0);

        let _rx1 = notifier.subscribe();
        let _rx2 = notifier.clone().subscribe();
        assert_eq!(notifier.emit(ShutdownPhase::GracePeriodEnded), 2);
    }

    #[tokio::test]
    async fn test_cancelled_token_runs_phases() {
        let notifier = ShutdownNotifier::new(8);
        let mut rx = notifier.subscribe();
        notifier.cancellation_token().cancel();

        shutdown_signal(Duration::from_secs(5), notifier.clone()).await;

        assert_eq!(rx.recv().await.unwrap(), ShutdownPhase::Initiated);
        assert_eq!(
            rx.recv().await.unwrap(),
            ShutdownPhase::GracePeriodStarted {
                timeout: Duration::from_secs(5)
            }
        );
    }

    #[test]
    fn test_notifier_debug() {
        let notifier = ShutdownNotifier::new(8);
        let _rx = notifier.subscribe();
        let debug = format!("{notifier:?}");
        assert!(debug.contains("subscriber_count: 1"));
        assert!(debug.contains("is_shutdown_initiated: false"));
    }
}
