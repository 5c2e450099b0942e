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
#![allow(clippy::module_name_repetitions)]

//! Telegram Bot API adapters for the relay.
//!
//! Layout: `types.rs` (wire types), `client.rs` (`TelegramClient`),
//! `channel.rs` (messaging, direct download, admin notifications),
//! `bulk.rs` (streaming downloads from a self-hosted Bot API server).

pub mod bulk;
pub mod channel;
pub mod client;
pub mod error;
pub mod types;

pub use bulk::LocalBotApiPath;
pub use channel::TelegramChannel;
pub use client::TelegramClient;
pub use error::{TelegramError, TelegramResult};
pub use types::{CallbackQuery, Message, Update, UpdateKind, User};
