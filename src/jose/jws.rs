//! Compact JWS: building the signed Request Object (JAR), and verifying
//! SD-JWT / Key-Binding JWT signatures.
//!
//! A plain `Signer` trait plus free functions for building and decoding
//! the compact form.

use std::future::Future;

use base64ct::{Base64UrlUnpadded, Encoding};
use p256::ecdsa::signature::Verifier as _;
use p256::ecdsa::{Signature as EcdsaSignature, VerifyingKey as EcdsaVerifyingKey};
use serde::{Deserialize, Serialize};

use super::jwk::PublicKeyJwk;
use crate::Error;

/// The JWS `alg` values this Verifier produces or consumes.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum JwsAlgorithm {
    /// ECDSA using P-256 and SHA-256. Used for SD-JWT and Key-Binding JWT
    /// signatures, and may be used for the JAR.
    #[serde(rename = "ES256")]
    Es256,
    /// RSASSA-PKCS1-v1_5 using SHA-256. The JAR's default signing
    /// algorithm (§6, `verifier.jar.signing.algorithm`).
    #[serde(rename = "RS256")]
    Rs256,
}

impl JwsAlgorithm {
    /// The `alg` header value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Es256 => "ES256",
            Self::Rs256 => "RS256",
        }
    }
}

impl std::str::FromStr for JwsAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "ES256" => Ok(Self::Es256),
            "RS256" => Ok(Self::Rs256),
            other => Err(Error::InvalidConfiguration(format!(
                "unsupported JWS algorithm: {other}"
            ))),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct JwsHeader<'a> {
    alg: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    typ: Option<&'a str>,
}

/// A key capable of signing the Verifier's own JWTs (the JAR).
///
/// Production deployments implement this over a KMS or HSM, so signing
/// is async; test code implements it over an in-memory key pair.
pub trait Signer: Send + Sync {
    /// The algorithm this signer produces.
    fn algorithm(&self) -> JwsAlgorithm;

    /// This signer's public key, for publishing in `client_metadata.jwks`.
    fn verifying_jwk(&self) -> PublicKeyJwk;

    /// Sign `msg`, returning a raw (not base64-encoded) signature.
    fn try_sign(&self, msg: Vec<u8>) -> impl Future<Output = Result<Vec<u8>, Error>> + Send;
}

/// Build a compact JWS over `payload`, using `signer` for both the
/// algorithm and the signature itself.
///
/// # Errors
///
/// Returns `Error::ServerError` if `payload` cannot be serialized, or if
/// `signer` fails to produce a signature.
pub async fn sign_compact(
    payload: &[u8],
    typ: &str,
    signer: &impl Signer,
) -> Result<String, Error> {
    let header = JwsHeader {
        alg: signer.algorithm().as_str(),
        typ: Some(typ),
    };
    let header_json =
        serde_json::to_vec(&header).map_err(|e| Error::ServerError(format!("{e}")))?;
    let header_b64 = Base64UrlUnpadded::encode_string(&header_json);
    let payload_b64 = Base64UrlUnpadded::encode_string(payload);
    let signing_input = format!("{header_b64}.{payload_b64}");

    let signature = signer.try_sign(signing_input.clone().into_bytes()).await?;
    let signature_b64 = Base64UrlUnpadded::encode_string(&signature);

    Ok(format!("{signing_input}.{signature_b64}"))
}

/// Verify a compact `ES256` JWS and return its decoded payload.
///
/// Used to check SD-JWT issuer signatures and Key-Binding JWT signatures,
/// which are always `ES256` in this Verifier's supported profile.
///
/// # Errors
///
/// Returns `Error::InvalidSDJwt` if the JWS is malformed, uses an
/// unexpected algorithm, or does not verify against `key`.
pub fn verify_es256_compact(jws: &str, key: &EcdsaVerifyingKey) -> Result<Vec<u8>, Error> {
    let mut parts = jws.splitn(3, '.');
    let header_b64 = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::InvalidSDJwt("missing JWS header".to_string()))?;
    let payload_b64 = parts
        .next()
        .ok_or_else(|| Error::InvalidSDJwt("missing JWS payload".to_string()))?;
    let signature_b64 = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::InvalidSDJwt("missing JWS signature".to_string()))?;

    let header_bytes = Base64UrlUnpadded::decode_vec(header_b64)
        .map_err(|_| Error::InvalidSDJwt("invalid JWS header encoding".to_string()))?;
    let header: JwsHeader = serde_json::from_slice(&header_bytes)
        .map_err(|_| Error::InvalidSDJwt("invalid JWS header".to_string()))?;
    if header.alg != JwsAlgorithm::Es256.as_str() {
        return Err(Error::InvalidSDJwt(format!(
            "unexpected JWS algorithm: {}",
            header.alg
        )));
    }

    let signature_bytes = Base64UrlUnpadded::decode_vec(signature_b64)
        .map_err(|_| Error::InvalidSDJwt("invalid JWS signature encoding".to_string()))?;
    let signature = EcdsaSignature::try_from(signature_bytes.as_slice())
        .map_err(|_| Error::InvalidSDJwt("malformed ECDSA signature".to_string()))?;

    let signing_input = format!("{header_b64}.{payload_b64}");
    key.verify(signing_input.as_bytes(), &signature)
        .map_err(|_| Error::InvalidSDJwt("signature verification failed".to_string()))?;

    Base64UrlUnpadded::decode_vec(payload_b64)
        .map_err(|_| Error::InvalidSDJwt("invalid JWS payload encoding".to_string()))
}

#[cfg(test)]
mod test {
    use p256::ecdsa::signature::{SignatureEncoding as _, Signer as _};
    use p256::ecdsa::{Signature as EcdsaSignature, SigningKey, VerifyingKey};
    use p256::PublicKey;

    use super::*;

    struct TestSigner(SigningKey);

    impl Signer for TestSigner {
        fn algorithm(&self) -> JwsAlgorithm {
            JwsAlgorithm::Es256
        }

        fn verifying_jwk(&self) -> PublicKeyJwk {
            let verifying_key = VerifyingKey::from(&self.0);
            PublicKeyJwk::from_public_key(&PublicKey::from(verifying_key))
        }

        async fn try_sign(&self, msg: Vec<u8>) -> Result<Vec<u8>, Error> {
            let sig: EcdsaSignature = self.0.sign(&msg);
            Ok(sig.to_vec())
        }
    }

    #[tokio::test]
    async fn sign_then_verify_round_trips() {
        let signing_key = SigningKey::random(&mut rand_core::OsRng);
        let verifying_key = VerifyingKey::from(&signing_key);
        let signer = TestSigner(signing_key);

        let jws = sign_compact(b"hello wallet", "oauth-authz-req+jwt", &signer)
            .await
            .unwrap();
        let payload = verify_es256_compact(&jws, &verifying_key).unwrap();
        assert_eq!(payload, b"hello wallet");
    }

    #[tokio::test]
    async fn tampered_signature_is_rejected() {
        let signing_key = SigningKey::random(&mut rand_core::OsRng);
        let other_key = VerifyingKey::from(&SigningKey::random(&mut rand_core::OsRng));
        let signer = TestSigner(signing_key);

        let jws = sign_compact(b"hello wallet", "oauth-authz-req+jwt", &signer)
            .await
            .unwrap();
        assert!(verify_es256_compact(&jws, &other_key).is_err());
    }
}
