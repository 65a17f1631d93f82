//! # Bridge Error Taxonomy
//!
//! Errors surfaced by the engine bridge, classified by whether a retry or
//! reconnect could plausibly succeed ([`BridgeError::is_transient()`]).
//! The audit service falls back on any bridge error but logs transient and
//! permanent failures at different levels.

use thiserror::Error;

/// Error from the engine bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The worker process could not be spawned.
    #[error("failed to spawn engine worker: {0}")]
    Spawn(String),

    /// The bridge is not connected; call `connect()` first.
    #[error("bridge is not connected")]
    NotConnected,

    /// I/O failure on the worker's streams.
    #[error("i/o error on worker stream: {0}")]
    Io(#[from] std::io::Error),

    /// The call expired before a response arrived. The pending entry has
    /// been removed — a late response for this id is dropped, not
    /// misdelivered.
    #[error("engine call {operation} timed out after {timeout_ms} ms")]
    Timeout {
        /// Wire name of the operation that timed out.
        operation: &'static str,
        /// The timeout that expired.
        timeout_ms: u128,
    },

    /// The worker exited (or the bridge disconnected) before responding.
    #[error("engine worker closed before responding")]
    Closed,

    /// The worker violated the wire protocol: a response decoded but its
    /// payload did not match the operation's schema.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// The worker processed the request and reported failure.
    #[error("engine rejected {operation}: {message}")]
    Operation {
        /// Wire name of the rejected operation.
        operation: &'static str,
        /// The worker's error message.
        message: String,
    },
}

impl BridgeError {
    /// Whether a reconnect/retry could plausibly clear this error.
    ///
    /// Spawn, connection, I/O, and timing failures are transient; protocol
    /// violations and explicit worker rejections are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Spawn(_) | Self::NotConnected | Self::Io(_) | Self::Timeout { .. } | Self::Closed
        )
    }
}
