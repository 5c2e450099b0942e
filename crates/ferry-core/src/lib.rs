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

//! Transport-agnostic transfer model, admission rules, and collaborator traits.
//!
//! Layout: `model.rs` (transfer state and DTOs), `admission.rs` (size gate),
//! `service.rs` (traits implemented by messaging/storage adapters),
//! `error.rs` (transfer and collaborator errors).

pub mod admission;
pub mod error;
pub mod model;
pub mod service;

pub use admission::SizeGate;
pub use error::{BoxError, CollaboratorError, CollaboratorResult, PublishStep, TransferError};
pub use ferry_events::TransferPhase;
pub use model::{
    BotIdentity, ButtonAction, DeclaredMedia, Degradation, DownloadPath, DownloadReport,
    InlineButton, Keyboard, MediaHandle, MediaKind, MediaRef, MemberStatus, MessageHandle,
    RemoteFolder, RemoteObject, Requester, ShortLink, Transfer, UploadSession,
};
pub use service::{
    BulkTransferPath, ChunkStream, DirectFetchPath, LinkShortener, MessagingChannel,
    NotificationSink, ProgressObserver, StorageProvider,
};
