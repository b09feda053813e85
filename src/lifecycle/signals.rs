//! OS signal handling.
//!
//! # Responsibilities
//! - Register handlers for the configured termination signals (SIGTERM, SIGINT)
//! - Translate the first one into a [`Shutdown`] trigger
//! - Absorb repeats while teardown is in progress
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A second signal never restarts or short-circuits teardown
//! - The listener exits once `stop` is cancelled

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::SignalKind;
use crate::lifecycle::shutdown::Shutdown;

#[cfg(unix)]
async fn next_signal(
    streams: &mut [(SignalKind, tokio::signal::unix::Signal)],
) -> Option<SignalKind> {
    use futures_util::future::select_all;

    if streams.is_empty() {
        return std::future::pending().await;
    }
    let waits = streams
        .iter_mut()
        .map(|(kind, stream)| {
            let kind = *kind;
            Box::pin(async move { stream.recv().await.map(|_| kind) })
        })
        .collect::<Vec<_>>();
    let (received, _, _) = select_all(waits).await;
    received
}

#[cfg(unix)]
fn register(kinds: &[SignalKind]) -> std::io::Result<Vec<(SignalKind, tokio::signal::unix::Signal)>> {
    use tokio::signal::unix::{signal, SignalKind as UnixSignal};

    let mut streams = Vec::with_capacity(kinds.len());
    for kind in kinds {
        let unix_kind = match kind {
            SignalKind::Interrupt => UnixSignal::interrupt(),
            SignalKind::Terminate => UnixSignal::terminate(),
        };
        streams.push((*kind, signal(unix_kind)?));
    }
    Ok(streams)
}

/// `kinds` with repeats removed, first occurrence kept.
#[cfg(unix)]
fn distinct(kinds: &[SignalKind]) -> Vec<SignalKind> {
    let mut unique = Vec::with_capacity(kinds.len());
    for kind in kinds {
        if !unique.contains(kind) {
            unique.push(*kind);
        }
    }
    unique
}

/// Listen for `kinds` and trigger `shutdown` on the first one.
///
/// Registration happens before this returns, so a signal delivered right after
/// the call is not lost.
#[cfg(unix)]
pub fn spawn_signal_listener(
    kinds: &[SignalKind],
    shutdown: Shutdown,
    stop: CancellationToken,
) -> std::io::Result<JoinHandle<()>> {
    let mut streams = register(&distinct(kinds))?;

    Ok(tokio::spawn(async move {
        loop {
            let received = tokio::select! {
                _ = stop.cancelled() => break,
                received = next_signal(&mut streams) => received,
            };
            match received {
                Some(kind) => {
                    if shutdown.trigger() {
                        tracing::info!(signal = %kind, "Received termination signal, starting graceful shutdown");
                    } else {
                        tracing::info!(signal = %kind, "Received termination signal during shutdown, ignoring");
                    }
                }
                None => break,
            }
        }
    }))
}

/// Non-unix fallback: only Ctrl+C is available.
#[cfg(not(unix))]
pub fn spawn_signal_listener(
    _kinds: &[SignalKind],
    shutdown: Shutdown,
    stop: CancellationToken,
) -> std::io::Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                result = tokio::signal::ctrl_c() => {
                    if result.is_err() {
                        break;
                    }
                    if !shutdown.trigger() {
                        tracing::info!("Received Ctrl+C during shutdown, ignoring");
                    }
                }
            }
        }
    }))
}
