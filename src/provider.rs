//! The Verifier's collaborators (§1: "treated as external collaborators"):
//! the JAR signer, the Issuer's verification keys, and the ZKP verifier.
//! Composed into one `Provider` supertrait, with a blanket implementation
//! so any type satisfying the pieces automatically satisfies the whole.

use std::future::Future;

use crate::jose::jwk::PublicKeyJwk;
use crate::jose::jws::Signer;
use crate::Error;

/// Everything a Verifier deployment must supply beyond the in-memory
/// state machine itself.
pub trait Provider: Signer + IssuerKeyStore + ZkpVerifier {}

impl<T> Provider for T where T: Signer + IssuerKeyStore + ZkpVerifier {}

/// Resolves the Issuer public keys that SD-JWT and mdoc verification
/// check against (`verifier.issuer.cert`, §6).
pub trait IssuerKeyStore: Send + Sync {
    /// The Issuer's ECDSA verifying key. `key_id` is the `kid` carried by
    /// the credential being verified (a JWS header, or a COSE protected
    /// header), or `None` when the credential carries no `kid` and the
    /// store's sole configured key should be used.
    fn issuer_verifying_key(
        &self,
        key_id: Option<&str>,
    ) -> impl Future<Output = Result<p256::ecdsa::VerifyingKey, Error>> + Send;
}

/// Which presentation shape a ZKP challenge was computed over (§4.4 step
/// 6: `vc+sd-jwt+zkp` checks format `SDJWT`, `mso_mdoc+zkp` checks format
/// `MSOMDOC`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZkpFormat {
    /// The SD-JWT portion of a `vc+sd-jwt+zkp` token.
    SdJwt,
    /// A single re-encoded mdoc document from a `mso_mdoc+zkp` token.
    MsoMdoc,
}

impl ZkpFormat {
    /// The wire name used in challenge computation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SdJwt => "SDJWT",
            Self::MsoMdoc => "MSOMDOC",
        }
    }
}

/// Checks a Zero-Knowledge Proof challenge against a registered per-
/// descriptor key (I5). The proof system itself is an external
/// collaborator; this core only needs a yes/no verdict.
pub trait ZkpVerifier: Send + Sync {
    /// Verify that `token` satisfies the ZKP challenge for `format`,
    /// bound to the Presentation's `nonce`, under `key`.
    fn verify_challenge(
        &self,
        key: &PublicKeyJwk,
        format: ZkpFormat,
        token: &[u8],
        nonce: &str,
    ) -> impl Future<Output = Result<bool, Error>> + Send;
}
