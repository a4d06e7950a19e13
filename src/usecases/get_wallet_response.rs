//! GetWalletResponse (§4.5): the Verifier front-end's retrieval of a
//! completed Presentation. For `Redirect`-mode Presentations the
//! `ResponseCode` it was handed by the Wallet's redirect doubles as
//! proof of possession — a mismatch is treated identically to the
//! Presentation not existing, so a guessed `TransactionId` cannot be
//! used to probe for a valid code (§4.5: "indistinguishable from
//! absence, to avoid oracle").

use crate::domain::{GetWalletResponseMethod, ResponseCode, TransactionId, WalletResponse};
use crate::store::PresentationStore;
use crate::{Error, Presentation};
use tracing::debug;

/// Fetch the Wallet response recorded for `transaction_id` (§4.5).
///
/// `response_code` must be supplied (and must match) when the
/// Presentation was configured for `GetWalletResponseMethod::Redirect`;
/// a successful retrieval consumes it (single-use, P2).
///
/// # Errors
///
/// Returns `Error::PresentationDefinitionNotFound` if no Presentation
/// matches `transaction_id`, or if a `Redirect`-mode `response_code`
/// doesn't match — both are indistinguishable to the caller by design.
/// Returns `Error::PresentationNotInExpectedState` if the Presentation
/// exists but hasn't reached `Submitted` yet; unlike the `response_code`
/// check, this isn't guarding a capability, so it isn't hidden behind
/// the not-found oracle.
pub fn get_wallet_response(
    store: &impl PresentationStore,
    transaction_id: &TransactionId,
    response_code: Option<&ResponseCode>,
) -> Result<WalletResponse, Error> {
    debug!(%transaction_id, "get_wallet_response: loading presentation by transaction_id");
    let presentation = store
        .load_by_transaction_id(transaction_id)?
        .ok_or(Error::PresentationDefinitionNotFound)?;

    let Presentation::Submitted {
        meta,
        wallet_response,
        response_code: stored_code,
        ..
    } = presentation
    else {
        return Err(Error::PresentationNotInExpectedState);
    };

    if matches!(
        meta.get_wallet_response_method,
        GetWalletResponseMethod::Redirect { .. }
    ) {
        let Some(stored_code) = &stored_code else {
            return Err(Error::PresentationDefinitionNotFound);
        };
        if response_code != Some(stored_code) {
            return Err(Error::PresentationDefinitionNotFound);
        }
        store.consume_response_code(stored_code)?;
    }

    Ok(wallet_response)
}
