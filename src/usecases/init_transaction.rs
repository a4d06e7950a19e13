//! InitTransaction (§4.2): the Verifier front-end's entry point. Mints
//! fresh identifiers, generates an ephemeral JARM decryption key when
//! needed (I3), and records a new `Requested` Presentation. The Request
//! Object itself isn't built until the Wallet fetches it
//! ([`super::get_request_object`]) — this step only reserves the side
//! channel it will be fetched from.

use std::collections::HashMap;

use crate::config::VerifierConfig;
use crate::core::generate;
use crate::domain::{
    GetWalletResponseMethod, IdTokenType, PresentationDefinition, PresentationMeta,
    PresentationType, ZkpKeys,
};
use crate::jose::jwk::PublicKeyJwk;
use crate::store::PresentationStore;
use crate::{Error, Presentation};

use chrono::Utc;
use tracing::{debug, info};

/// What the Wallet is being asked to present, as supplied by the
/// Verifier front-end (§3: "`PresentationType` is fixed at initiation").
#[derive(Clone, Debug)]
pub enum InitTransactionType {
    /// A bare Self-Issued ID Token.
    IdToken {
        /// How the ID Token's subject is bound.
        id_token_type: IdTokenType,
    },
    /// A `vp_token` satisfying `presentation_definition`.
    VpToken {
        /// The Credentials and constraints the Wallet must satisfy.
        presentation_definition: PresentationDefinition,
    },
    /// Both an ID Token and a `vp_token`.
    IdAndVpToken {
        /// How the ID Token's subject is bound.
        id_token_type: IdTokenType,
        /// The Credentials and constraints the Wallet must satisfy.
        presentation_definition: PresentationDefinition,
    },
}

/// The Verifier front-end's request to begin a new presentation
/// transaction.
#[derive(Clone, Debug)]
pub struct InitTransactionRequest {
    /// What to ask the Wallet for.
    pub presentation_type: InitTransactionType,
    /// Overrides `config.default_response_mode` for this transaction, if
    /// set.
    pub response_mode: Option<crate::domain::ResponseMode>,
    /// How the Verifier front-end will retrieve the eventual response.
    pub get_wallet_response_method: GetWalletResponseMethod,
    /// Per-input-descriptor ZKP verification keys (I5), required when any
    /// requested descriptor uses a ZKP-wrapped format.
    pub zkp_keys: Option<HashMap<String, PublicKeyJwk>>,
}

/// `InitTransaction`'s result: enough for the Verifier front-end to wait
/// on the Wallet and, when a `vp_token` was requested, show the End-User
/// what is being asked for.
#[derive(Clone, Debug)]
pub struct InitTransactionResponse {
    /// The Verifier-facing identifier for this transaction.
    pub transaction_id: crate::domain::TransactionId,
    /// Where the Wallet will `GET` the signed Request Object.
    pub request_uri: String,
    /// Echoed back when a `vp_token` was requested, for display.
    pub presentation_definition: Option<PresentationDefinition>,
}

/// Begin a new presentation transaction (§4.2).
///
/// # Errors
///
/// Returns `Error::ServerError` if the store fails to persist the new
/// record.
pub async fn init_transaction(
    config: &VerifierConfig,
    store: &impl PresentationStore,
    request: InitTransactionRequest,
) -> Result<InitTransactionResponse, Error> {
    debug!("init_transaction: starting new presentation transaction");

    let id = generate::transaction_id();
    let request_id = generate::request_id();
    let nonce = generate::nonce();
    let response_mode = request.response_mode.unwrap_or(config.default_response_mode);

    let jarm_option = config.jarm_option()?;
    let ephemeral_ec_private_key = if response_mode == crate::domain::ResponseMode::DirectPostJwt
        && VerifierConfig::requires_ephemeral_key(jarm_option)
    {
        Some(crate::jose::jwk::EphemeralEcKeyPair::generate())
    } else {
        None
    };

    let (presentation_type, presentation_definition) = match request.presentation_type {
        InitTransactionType::IdToken { id_token_type } => {
            (PresentationType::IdTokenRequest { id_token_type }, None)
        }
        InitTransactionType::VpToken {
            presentation_definition,
        } => (
            PresentationType::VpTokenRequest {
                presentation_definition: presentation_definition.clone(),
            },
            Some(presentation_definition),
        ),
        InitTransactionType::IdAndVpToken {
            id_token_type,
            presentation_definition,
        } => (
            PresentationType::IdAndVpToken {
                id_token_type,
                presentation_definition: presentation_definition.clone(),
            },
            Some(presentation_definition),
        ),
    };

    let zkp_keys = request.zkp_keys.map(ZkpKeys);

    let meta = PresentationMeta {
        id: id.clone(),
        request_id: request_id.clone(),
        initiated_at: Utc::now(),
        presentation_type,
        response_mode,
        presentation_definition_mode: config.presentation_definition_embed,
        get_wallet_response_method: request.get_wallet_response_method,
        nonce,
        ephemeral_ec_private_key,
        zkp_keys,
    };
    store.store(Presentation::Requested(meta))?;
    info!(transaction_id = %id, %request_id, ?response_mode, "presentation transaction initiated");

    let path = match response_mode {
        crate::domain::ResponseMode::DirectPost | crate::domain::ResponseMode::DirectPostJwt => {
            format!("{}/wallet/request.jwt/{request_id}", config.public_url)
        }
    };

    Ok(InitTransactionResponse {
        transaction_id: id,
        request_uri: path,
        presentation_definition,
    })
}
