//! The Presentation store (§4.1): a concurrent mapping from identifiers
//! to `Presentation`, maintaining the `RequestId -> TransactionId` and
//! `ResponseCode -> TransactionId` secondary indices atomically with the
//! primary record (I1, I2, I4).

use std::collections::HashMap;
use std::sync::RwLock;

use crate::domain::{Presentation, RequestId, ResponseCode, TransactionId};
use crate::Error;

/// Storage seam for Presentations.
///
/// Implementations must maintain linearizable updates per `TransactionId`
/// (§5): a successful `store` call must be visible to every subsequent
/// `load_by_transaction_id`/`load_by_request_id` call, and concurrent
/// `PostWalletResponse` invocations racing on the same `RequestId` must
/// see at most one succeed in observing `RequestObjectRetrieved`.
pub trait PresentationStore: Send + Sync {
    /// Upsert by `TransactionId`, updating the `RequestId` index (and,
    /// while `Submitted` with a `ResponseCode`, the response-code index)
    /// atomically with the primary record.
    ///
    /// # Errors
    ///
    /// Returns `Error::ServerError` on a storage-layer failure.
    fn store(&self, presentation: Presentation) -> Result<(), Error>;

    /// Load the current state for `id`, if any.
    ///
    /// # Errors
    ///
    /// Returns `Error::ServerError` on a storage-layer failure.
    fn load_by_transaction_id(&self, id: &TransactionId) -> Result<Option<Presentation>, Error>;

    /// Load the current state for the Presentation whose `RequestId` is
    /// `request_id`, if any.
    ///
    /// # Errors
    ///
    /// Returns `Error::ServerError` on a storage-layer failure.
    fn load_by_request_id(&self, request_id: &RequestId) -> Result<Option<Presentation>, Error>;

    /// Resolve a `ResponseCode` to its `TransactionId` and consume it
    /// (single-use, P2). Returns `None` if the code is unknown or was
    /// already consumed.
    ///
    /// # Errors
    ///
    /// Returns `Error::ServerError` on a storage-layer failure.
    fn consume_response_code(
        &self,
        response_code: &ResponseCode,
    ) -> Result<Option<TransactionId>, Error>;
}

#[derive(Default)]
struct Indices {
    by_transaction_id: HashMap<TransactionId, Presentation>,
    by_request_id: HashMap<RequestId, TransactionId>,
    by_response_code: HashMap<ResponseCode, TransactionId>,
}

/// An in-memory `PresentationStore`, the only persistence the core
/// mandates (§1: "does not persist across restarts"). A single
/// `RwLock` around all three indices keeps them consistent; real
/// deployments may swap in per-record locking or a database-backed
/// implementation behind the same trait.
#[derive(Default)]
pub struct InMemoryPresentationStore {
    indices: RwLock<Indices>,
}

impl InMemoryPresentationStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl PresentationStore for InMemoryPresentationStore {
    fn store(&self, presentation: Presentation) -> Result<(), Error> {
        let mut indices = self
            .indices
            .write()
            .map_err(|_| Error::ServerError("presentation store lock poisoned".to_string()))?;

        let id = presentation.id().clone();
        if let Some(request_id) = presentation.request_id() {
            indices.by_request_id.insert(request_id.clone(), id.clone());
        }
        if let Presentation::Submitted {
            response_code: Some(code),
            ..
        } = &presentation
        {
            indices.by_response_code.insert(code.clone(), id.clone());
        }
        indices.by_transaction_id.insert(id, presentation);
        Ok(())
    }

    fn load_by_transaction_id(&self, id: &TransactionId) -> Result<Option<Presentation>, Error> {
        let indices = self
            .indices
            .read()
            .map_err(|_| Error::ServerError("presentation store lock poisoned".to_string()))?;
        Ok(indices.by_transaction_id.get(id).cloned())
    }

    fn load_by_request_id(&self, request_id: &RequestId) -> Result<Option<Presentation>, Error> {
        let indices = self
            .indices
            .read()
            .map_err(|_| Error::ServerError("presentation store lock poisoned".to_string()))?;
        let Some(id) = indices.by_request_id.get(request_id) else {
            return Ok(None);
        };
        Ok(indices.by_transaction_id.get(id).cloned())
    }

    fn consume_response_code(
        &self,
        response_code: &ResponseCode,
    ) -> Result<Option<TransactionId>, Error> {
        let mut indices = self
            .indices
            .write()
            .map_err(|_| Error::ServerError("presentation store lock poisoned".to_string()))?;
        Ok(indices.by_response_code.remove(response_code))
    }
}
