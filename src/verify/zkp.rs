//! Zero-Knowledge-Proof challenge verification for the `vc+sd-jwt+zkp`
//! and `mso_mdoc+zkp` descriptor formats (§4.4 step 6). The proof system
//! itself lives behind [`ZkpVerifier`](crate::provider::ZkpVerifier); this
//! module only extracts the bytes each format challenges over.

use base64ct::{Base64UrlUnpadded, Encoding};
use ciborium::Value as Cbor;

use crate::jose::jwk::PublicKeyJwk;
use crate::provider::{ZkpFormat, ZkpVerifier};
use crate::Error;

/// Verify a `vc+sd-jwt+zkp` token: the challenge is computed over the
/// SD-JWT portion of the token, the substring before its first `~`.
///
/// # Errors
///
/// Returns `Error::InvalidVPToken` if the proof system rejects the
/// challenge.
pub async fn verify_sd_jwt_zkp(
    verifier: &impl ZkpVerifier,
    key: &PublicKeyJwk,
    token: &str,
    nonce: &str,
) -> Result<(), Error> {
    let sd_jwt_part = token.split('~').next().unwrap_or(token);
    let ok = verifier
        .verify_challenge(key, ZkpFormat::SdJwt, sd_jwt_part.as_bytes(), nonce)
        .await?;
    if ok {
        Ok(())
    } else {
        Err(Error::InvalidVPToken(
            "ZKP challenge verification failed".to_string(),
        ))
    }
}

/// Verify a `mso_mdoc+zkp` token: the challenge is computed per document,
/// each re-encoded alone as a base64url CBOR value, not over the whole
/// `documents` list at once.
///
/// # Errors
///
/// Returns `Error::InvalidVPToken` for a malformed token, an empty
/// `documents` list, or if the proof system rejects any document's
/// challenge.
pub async fn verify_mdoc_zkp(
    verifier: &impl ZkpVerifier,
    key: &PublicKeyJwk,
    token: &str,
    nonce: &str,
) -> Result<(), Error> {
    let bytes = Base64UrlUnpadded::decode_vec(token)
        .map_err(|_| Error::InvalidVPToken("invalid base64url encoding".to_string()))?;
    let top: Cbor = ciborium::de::from_reader(bytes.as_slice())
        .map_err(|_| Error::InvalidVPToken("invalid top-level CBOR".to_string()))?;
    let documents = top
        .as_map()
        .and_then(|entries| {
            entries
                .iter()
                .find_map(|(k, v)| (k.as_text() == Some("documents")).then_some(v))
        })
        .and_then(Cbor::as_array)
        .ok_or_else(|| Error::InvalidVPToken("missing documents list".to_string()))?;
    if documents.is_empty() {
        return Err(Error::InvalidVPToken(
            "documents list is empty".to_string(),
        ));
    }

    for document in documents {
        let mut encoded = Vec::new();
        ciborium::ser::into_writer(document, &mut encoded)
            .map_err(|_| Error::InvalidVPToken("failed to re-encode document".to_string()))?;
        let encoded = Base64UrlUnpadded::encode_string(&encoded);
        let ok = verifier
            .verify_challenge(key, ZkpFormat::MsoMdoc, encoded.as_bytes(), nonce)
            .await?;
        if !ok {
            return Err(Error::InvalidVPToken(
                "ZKP challenge verification failed".to_string(),
            ));
        }
    }
    Ok(())
}
