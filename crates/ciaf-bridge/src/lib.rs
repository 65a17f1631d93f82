//! # ciaf-bridge — Crypto Engine Bridge
//!
//! Process-boundary RPC client for the external cryptographic engine.
//! Serializes operation requests onto a long-lived worker process's stdin
//! as newline-delimited JSON and resolves response lines back to the
//! originating caller.
//!
//! ## Architecture
//!
//! ```text
//! caller ──▶ send_request ──▶ pending table (id → oneshot)
//!                │                    ▲
//!                ▼ stdin line         │ route by id
//!          worker process ──▶ stdout reader task
//! ```
//!
//! Every request envelope carries a monotonically increasing `id` the
//! worker echoes back, so responses route by id rather than arrival
//! order: a dropped, duplicated, or malformed response line degrades only
//! its own call, never the whole queue.
//!
//! ## Lifecycle
//!
//! `Disconnected → Connected → Disconnected` on worker exit or explicit
//! [`EngineBridge::disconnect()`]. The bridge never auto-restarts the
//! worker; callers reconnect explicitly and resubmit in-flight work.
//!
//! The bridge is an explicitly owned object — construct one, inject it
//! into the service that needs it. Tests substitute a fake worker command.

pub mod bridge;
pub mod error;
pub mod pending;
pub mod protocol;

pub use bridge::{EngineBridge, EngineConfig};
pub use error::BridgeError;
pub use protocol::{
    AnchorPayload, CapsulesPayload, DatasetItem, EngineOperation, ReceiptPayload,
    ReportAnchorInput, ReportPayload, ReportReceiptInput, RequestFrame, ResponseFrame,
    VerifyItemPayload,
};
