#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Core event bus for the ferry relay.
//!
//! The bus carries transfer lifecycle events (admission, phase changes,
//! download progress, terminal outcomes) so that logging, metrics and tests can
//! observe a transfer without coupling to the orchestrator. Live delivery goes
//! through `tokio::broadcast`; a bounded history lets late subscribers resume
//! by id. A subscriber that falls behind is told how many envelopes it lost.
//!
//! Layout: `payloads.rs` (event and phase types), `routing.rs` (`EventBus`).

pub mod payloads;
pub mod routing;

pub use payloads::{DEFAULT_REPLAY_CAPACITY, Event, EventEnvelope, EventId, TransferPhase};
pub use routing::{EventBus, EventsMissed, Subscription};
