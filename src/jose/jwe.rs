//! JARM unwrapping: the Wallet's `direct_post.jwt` envelope may be signed,
//! encrypted, or both (§4.4 step 4; design note "JARM option as sum
//! type"). Encryption is always `ECDH-ES` key agreement with
//! `A128CBC-HS256` content encryption (RFC 7518 §4.6, §5.2.3), the only
//! combination `client_metadata` ever advertises.
//!
//! Implemented directly against `p256`/`aes`/`cbc`/`hmac` rather than
//! pulling in an external JOSE crate (see `DESIGN.md`).

use aes::Aes128;
use base64ct::{Base64UrlUnpadded, Encoding};
use cbc::cipher::{BlockDecryptMut, KeyIvInit};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use p256::ecdh::diffie_hellman;
use p256::{PublicKey, SecretKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use super::jwk::PublicKeyJwk;
use super::jws::{verify_es256_compact, JwsAlgorithm};
use crate::Error;

type Aes128CbcDec = cbc::Decryptor<Aes128>;
type HmacSha256 = Hmac<Sha256>;

/// JARM key-management algorithm. Only `ECDH-ES` (direct key agreement,
/// no key wrapping) is supported.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JweAlg {
    /// Elliptic Curve Diffie-Hellman Ephemeral Static, direct agreement.
    EcdhEs,
}

/// JARM content encryption algorithm. Only `A128CBC-HS256` is supported.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JweEnc {
    /// AES-128-CBC with HMAC-SHA-256 authentication (RFC 7518 §5.2.3).
    A128CbcHs256,
}

impl JweAlg {
    fn parse(s: &str) -> Result<Self, Error> {
        match s {
            "ECDH-ES" => Ok(Self::EcdhEs),
            other => Err(Error::InvalidConfiguration(format!(
                "unsupported JWE alg: {other}"
            ))),
        }
    }
}

impl JweEnc {
    fn parse(s: &str) -> Result<Self, Error> {
        match s {
            "A128CBC-HS256" => Ok(Self::A128CbcHs256),
            other => Err(Error::InvalidConfiguration(format!(
                "unsupported JWE enc: {other}"
            ))),
        }
    }
}

/// The negotiated JARM treatment for a Presentation, modeled as a sum
/// type so the validator dispatches on the variant rather than probing a
/// bag of optional fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JarmOption {
    /// `direct_post` is in use; no JARM envelope at all.
    Unsigned,
    /// The envelope is a bare JWS.
    Signed { alg: JwsAlgorithm },
    /// The envelope is a bare JWE.
    Encrypted { alg: JweAlg, enc: JweEnc },
    /// The envelope is a JWS nested inside a JWE.
    SignedAndEncrypted {
        sign_alg: JwsAlgorithm,
        enc_alg: JweAlg,
        enc: JweEnc,
    },
}

impl JarmOption {
    /// Derive the option this Verifier negotiated from its configured
    /// `client_metadata` algorithms.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfiguration` if an algorithm name isn't
    /// one of the supported values.
    pub fn from_config(
        signed_response_alg: Option<&str>,
        encrypted_response_alg: Option<&str>,
        encrypted_response_enc: Option<&str>,
    ) -> Result<Self, Error> {
        let sign_alg = signed_response_alg.map(str::parse::<JwsAlgorithm>).transpose()?;
        let enc_alg = encrypted_response_alg.map(JweAlg::parse).transpose()?;
        let enc = encrypted_response_enc.map(JweEnc::parse).transpose()?;

        match (sign_alg, enc_alg, enc) {
            (None, None, None) => Ok(Self::Unsigned),
            (Some(sign_alg), None, None) => Ok(Self::Signed { alg: sign_alg }),
            (None, Some(alg), Some(enc)) => Ok(Self::Encrypted { alg, enc }),
            (Some(sign_alg), Some(enc_alg), Some(enc)) => Ok(Self::SignedAndEncrypted {
                sign_alg,
                enc_alg,
                enc,
            }),
            _ => Err(Error::InvalidConfiguration(
                "encrypted JARM requires both an encryption alg and enc".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct JweHeader {
    alg: String,
    enc: String,
    epk: PublicKeyJwk,
    #[serde(skip_serializing_if = "Option::is_none")]
    apu: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    apv: Option<String>,
}

/// Unwrap a `direct_post.jwt` envelope per the negotiated `option`,
/// returning the inner Authorisation Response body as raw JSON bytes.
///
/// `ephemeral_key` is the Verifier's per-transaction EC private key
/// (`Presentation::ephemeral_ec_private_key`); `issuer_verifying_key` is
/// only consulted when `option` includes a signature.
///
/// # Errors
///
/// Returns `Error::InvalidJarm` for any structural, cryptographic, or
/// authentication failure while unwrapping the envelope.
pub fn unwrap_jarm(
    jarm: &str,
    option: JarmOption,
    ephemeral_key: &SecretKey,
    wallet_verifying_key: Option<&p256::ecdsa::VerifyingKey>,
) -> Result<Vec<u8>, Error> {
    match option {
        JarmOption::Unsigned => Err(Error::InvalidJarm(
            "direct_post.jwt used without a negotiated JARM option".to_string(),
        )),
        JarmOption::Signed { .. } => {
            let key = wallet_verifying_key.ok_or_else(|| {
                Error::InvalidJarm("signed JARM received with no verifying key".to_string())
            })?;
            verify_es256_compact(jarm, key).map_err(|e| Error::InvalidJarm(e.to_string()))
        }
        JarmOption::Encrypted { .. } => decrypt_jwe(jarm, ephemeral_key),
        JarmOption::SignedAndEncrypted { .. } => {
            let inner = decrypt_jwe(jarm, ephemeral_key)?;
            let inner_jws = std::str::from_utf8(&inner)
                .map_err(|_| Error::InvalidJarm("decrypted JARM is not valid UTF-8".to_string()))?;
            let key = wallet_verifying_key.ok_or_else(|| {
                Error::InvalidJarm("signed JARM received with no verifying key".to_string())
            })?;
            verify_es256_compact(inner_jws, key).map_err(|e| Error::InvalidJarm(e.to_string()))
        }
    }
}

fn decrypt_jwe(jwe: &str, ephemeral_key: &SecretKey) -> Result<Vec<u8>, Error> {
    let mut parts = jwe.split('.');
    let header_b64 = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::InvalidJarm("missing JWE header".to_string()))?;
    let encrypted_key_b64 = parts
        .next()
        .ok_or_else(|| Error::InvalidJarm("missing JWE encrypted key".to_string()))?;
    let iv_b64 = parts
        .next()
        .ok_or_else(|| Error::InvalidJarm("missing JWE IV".to_string()))?;
    let ciphertext_b64 = parts
        .next()
        .ok_or_else(|| Error::InvalidJarm("missing JWE ciphertext".to_string()))?;
    let tag_b64 = parts
        .next()
        .ok_or_else(|| Error::InvalidJarm("missing JWE tag".to_string()))?;
    if parts.next().is_some() {
        return Err(Error::InvalidJarm("malformed JWE: too many segments".to_string()));
    }

    let header_bytes = Base64UrlUnpadded::decode_vec(header_b64)
        .map_err(|_| Error::InvalidJarm("invalid JWE header encoding".to_string()))?;
    let header: JweHeader = serde_json::from_slice(&header_bytes)
        .map_err(|_| Error::InvalidJarm("invalid JWE header".to_string()))?;
    if header.alg != "ECDH-ES" || header.enc != "A128CBC-HS256" {
        return Err(Error::InvalidJarm(format!(
            "unsupported JWE alg/enc: {}/{}",
            header.alg, header.enc
        )));
    }
    // Direct agreement: no wrapped key travels on the wire.
    if !encrypted_key_b64.is_empty() {
        return Err(Error::InvalidJarm(
            "ECDH-ES direct agreement must carry an empty encrypted key".to_string(),
        ));
    }

    let ephemeral_public = header
        .epk
        .to_public_key()
        .map_err(|_| Error::InvalidJarm("invalid ephemeral public key".to_string()))?;
    let content_encryption_key =
        derive_content_encryption_key(ephemeral_key, &ephemeral_public, &header.apu, &header.apv)?;

    let iv = Base64UrlUnpadded::decode_vec(iv_b64)
        .map_err(|_| Error::InvalidJarm("invalid JWE IV encoding".to_string()))?;
    let ciphertext = Base64UrlUnpadded::decode_vec(ciphertext_b64)
        .map_err(|_| Error::InvalidJarm("invalid JWE ciphertext encoding".to_string()))?;
    let tag = Base64UrlUnpadded::decode_vec(tag_b64)
        .map_err(|_| Error::InvalidJarm("invalid JWE tag encoding".to_string()))?;

    decrypt_a128cbc_hs256(&content_encryption_key, &iv, header_b64, &ciphertext, &tag)
}

/// RFC 7518 §4.6.2 Concat KDF, specialised to the single-step case this
/// Verifier needs (P-256, A128CBC-HS256 → 32-byte derived key: 16 bytes
/// MAC + 16 bytes encryption, per §5.2.3).
fn derive_content_encryption_key(
    ephemeral_key: &SecretKey,
    peer_public: &PublicKey,
    apu: &Option<String>,
    apv: &Option<String>,
) -> Result<Vec<u8>, Error> {
    let shared_secret = diffie_hellman(&ephemeral_key.to_nonzero_scalar(), peer_public.as_affine());

    let apu_bytes = apu
        .as_deref()
        .map(Base64UrlUnpadded::decode_vec)
        .transpose()
        .map_err(|_| Error::InvalidJarm("invalid apu".to_string()))?
        .unwrap_or_default();
    let apv_bytes = apv
        .as_deref()
        .map(Base64UrlUnpadded::decode_vec)
        .transpose()
        .map_err(|_| Error::InvalidJarm("invalid apv".to_string()))?
        .unwrap_or_default();

    let mut other_info = Vec::new();
    other_info.extend_from_slice(&(b"A128CBC-HS256".len() as u32).to_be_bytes());
    other_info.extend_from_slice(b"A128CBC-HS256");
    other_info.extend_from_slice(&(apu_bytes.len() as u32).to_be_bytes());
    other_info.extend_from_slice(&apu_bytes);
    other_info.extend_from_slice(&(apv_bytes.len() as u32).to_be_bytes());
    other_info.extend_from_slice(&apv_bytes);
    other_info.extend_from_slice(&256u32.to_be_bytes());

    let hkdf = Hkdf::<Sha256>::new(None, shared_secret.raw_secret_bytes());
    let mut derived = vec![0u8; 32];
    hkdf.expand(&other_info, &mut derived)
        .map_err(|_| Error::InvalidJarm("key derivation failed".to_string()))?;
    Ok(derived)
}

fn decrypt_a128cbc_hs256(
    content_encryption_key: &[u8],
    iv: &[u8],
    protected_header_b64: &str,
    ciphertext: &[u8],
    tag: &[u8],
) -> Result<Vec<u8>, Error> {
    if content_encryption_key.len() != 32 {
        return Err(Error::InvalidJarm("derived key has the wrong length".to_string()));
    }
    let (mac_key, enc_key) = content_encryption_key.split_at(16);

    let aad = protected_header_b64.as_bytes();
    let al = ((aad.len() as u64) * 8).to_be_bytes();
    let mut mac_input = Vec::with_capacity(aad.len() + iv.len() + ciphertext.len() + 8);
    mac_input.extend_from_slice(aad);
    mac_input.extend_from_slice(iv);
    mac_input.extend_from_slice(ciphertext);
    mac_input.extend_from_slice(&al);

    let mut mac =
        HmacSha256::new_from_slice(mac_key).map_err(|_| Error::InvalidJarm("invalid MAC key".to_string()))?;
    mac.update(&mac_input);
    let computed_tag = mac.finalize().into_bytes();
    if computed_tag[..16] != *tag {
        return Err(Error::InvalidJarm("JARM authentication tag mismatch".to_string()));
    }

    let decryptor = Aes128CbcDec::new_from_slices(enc_key, iv)
        .map_err(|_| Error::InvalidJarm("invalid content encryption key or IV".to_string()))?;
    decryptor
        .decrypt_padded_vec_mut::<cbc::cipher::block_padding::Pkcs7>(ciphertext)
        .map_err(|_| Error::InvalidJarm("JARM ciphertext padding invalid".to_string()))
}
