//! Timeout Sweeper (§4.6): a periodic task that moves any non-terminal
//! Presentation past `maxAge` to `TimedOut`. Idempotent and
//! ordering-insensitive — safe to run concurrently with itself or with
//! the on-access checks `GetRequestObject`/`PostWalletResponse` already
//! perform via `Presentation::sweep_timeout`.

use chrono::{DateTime, Utc};

use crate::config::VerifierConfig;
use crate::domain::{Presentation, TransactionId};
use crate::store::PresentationStore;
use crate::Error;
use tracing::{debug, info};

/// A snapshot of every `TransactionId` currently held by `store`, for
/// the sweep to iterate. Kept abstract so `PresentationStore`
/// implementations aren't required to expose iteration beyond this one
/// bulk read.
pub trait PresentationIds: PresentationStore {
    /// Every `TransactionId` currently tracked, in any order.
    ///
    /// # Errors
    ///
    /// Returns `Error::ServerError` on a storage-layer failure.
    fn transaction_ids(&self) -> Result<Vec<TransactionId>, Error>;
}

/// Run one sweep over `store`, transitioning every stale non-terminal
/// Presentation to `TimedOut` (§4.6).
///
/// # Errors
///
/// Returns `Error::ServerError` if a load or store operation fails; a
/// failure partway through leaves already-swept records transitioned
/// and the rest untouched — safe to simply run again.
pub fn sweep(
    config: &VerifierConfig,
    store: &impl PresentationIds,
    now: DateTime<Utc>,
) -> Result<usize, Error> {
    let ids = store.transaction_ids()?;
    debug!(count = ids.len(), "sweep: scanning tracked presentations");
    let mut swept = 0;
    for id in ids {
        let Some(presentation) = store.load_by_transaction_id(&id)? else {
            continue;
        };
        let was_terminal = matches!(
            presentation,
            Presentation::Submitted { .. } | Presentation::TimedOut { .. }
        );
        let presentation = presentation.sweep_timeout(now, config.max_age);
        if !was_terminal && matches!(presentation, Presentation::TimedOut { .. }) {
            swept += 1;
        }
        store.store(presentation)?;
    }
    info!(swept, "sweep complete");
    Ok(swept)
}
