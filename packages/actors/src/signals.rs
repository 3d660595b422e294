//! Shutdown signal delivery for worker processes.

use tokio::sync::mpsc;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Signal types that can trigger shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGTERM - stop after the in-flight job, bounded by the grace period.
    Terminate,
    /// SIGINT - stop after the in-flight job, no deadline.
    Interrupt,
}

impl ShutdownSignal {
    /// Whether this signal starts the forced-exit countdown.
    pub fn arms_grace_deadline(self) -> bool {
        matches!(self, ShutdownSignal::Terminate)
    }
}

impl std::fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownSignal::Terminate => write!(f, "SIGTERM"),
            ShutdownSignal::Interrupt => write!(f, "SIGINT"),
        }
    }
}

/// Listen for process signals and forward each one to the returned channel.
///
/// Every signal is forwarded, not just the first: a SIGTERM following a
/// SIGINT must still arm the grace deadline.
#[cfg(unix)]
pub fn forward_signals() -> std::io::Result<mpsc::Receiver<ShutdownSignal>> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let (tx, rx) = mpsc::channel(8);

    tracing::debug!("Signal handler initialized, listening for SIGTERM and SIGINT");

    tokio::spawn(async move {
        loop {
            let received = tokio::select! {
                Some(()) = sigterm.recv() => ShutdownSignal::Terminate,
                Some(()) = sigint.recv() => ShutdownSignal::Interrupt,
                else => break,
            };
            tracing::info!("Received shutdown signal: {}", received);
            if tx.send(received).await.is_err() {
                break;
            }
        }
    });

    Ok(rx)
}

#[cfg(not(unix))]
pub fn forward_signals() -> std::io::Result<mpsc::Receiver<ShutdownSignal>> {
    let (tx, rx) = mpsc::channel(8);

    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received shutdown signal: {}", ShutdownSignal::Interrupt);
            if tx.send(ShutdownSignal::Interrupt).await.is_err() {
                break;
            }
        }
    });

    Ok(rx)
}
