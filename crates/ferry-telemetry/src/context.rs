//! Context propagation helpers for application and transfer spans.
//!
//! # Design
//! - Keeps the active transfer identifier in task-local storage so nested
//!   collaborators can tag their logs without threading it through every call.
//! - Provides an application-level span guard so top-level spans carry mode/build info.

use std::future::Future;

use tracing::{Span, span::Entered};
use uuid::Uuid;

use crate::init::build_sha;

/// Guard that keeps the application-level span entered for the lifetime of the process.
pub struct GlobalContextGuard {
    _guard: Entered<'static>,
}

impl GlobalContextGuard {
    #[must_use]
    /// Enter the application-level tracing span for the lifetime of the guard.
    pub fn new(mode: impl Into<String>) -> Self {
        let mode = mode.into();
        let span: &'static Span = Box::leak(Box::new(
            tracing::info_span!("app", mode = %mode, build_sha = %build_sha()),
        ));
        let guard = span.enter();
        Self { _guard: guard }
    }
}

/// Record the current application mode on the active span.
pub fn record_app_mode(mode: &str) {
    Span::current().record("mode", tracing::field::display(mode));
}

/// Build the span that wraps a single transfer from admission to its terminal phase.
#[must_use]
pub fn transfer_span(transfer_id: Uuid, requester_id: i64, name: &str) -> Span {
    tracing::info_span!(
        "transfer",
        transfer_id = %transfer_id,
        requester_id,
        file = %name,
        phase = tracing::field::Empty
    )
}

/// Retrieve the transfer identifier bound to the current task, if any.
#[must_use]
pub fn current_transfer_id() -> Option<Uuid> {
    ACTIVE_TRANSFER.try_with(|id| *id).ok()
}

/// Execute the provided future with the transfer identifier available to downstream helpers.
pub async fn with_transfer_context<Fut, T>(transfer_id: Uuid, fut: Fut) -> T
where
    Fut: Future<Output = T>,
{
    ACTIVE_TRANSFER.scope(transfer_id, fut).await
}

tokio::task_local! {
    static ACTIVE_TRANSFER: Uuid;
}
