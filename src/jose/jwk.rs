//! EC P-256 JSON Web Keys.
//!
//! Every public key this Verifier core handles — the Issuer's SD-JWT/mdoc
//! verification key, a Wallet-bound ZKP key, the Verifier's own ephemeral
//! JARM encryption key — is an EC P-256 key, so a single `PublicKeyJwk`
//! shape covers all of them.

use base64ct::{Base64UrlUnpadded, Encoding};
use p256::ecdsa::VerifyingKey;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{EncodedPoint, PublicKey, SecretKey};
use serde::{Deserialize, Serialize};

use crate::Error;

/// An EC P-256 public key in JWK form (RFC 7517 §6.2.1).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct PublicKeyJwk {
    /// Key type; always `"EC"` for the keys this crate handles.
    pub kty: String,
    /// Curve; always `"P-256"`.
    pub crv: String,
    /// Base64url-encoded, unpadded x-coordinate.
    pub x: String,
    /// Base64url-encoded, unpadded y-coordinate.
    pub y: String,
}

impl PublicKeyJwk {
    /// Decode this JWK to a `p256` public key.
    ///
    /// # Errors
    ///
    /// Returns `Error::ServerError` if the key is not a valid P-256 point.
    pub fn to_public_key(&self) -> Result<PublicKey, Error> {
        if self.kty != "EC" || self.crv != "P-256" {
            return Err(Error::ServerError(format!(
                "unsupported key type: {}/{}",
                self.kty, self.crv
            )));
        }
        let x = Base64UrlUnpadded::decode_vec(&self.x)
            .map_err(|e| Error::ServerError(format!("invalid JWK x: {e}")))?;
        let y = Base64UrlUnpadded::decode_vec(&self.y)
            .map_err(|e| Error::ServerError(format!("invalid JWK y: {e}")))?;
        let point = EncodedPoint::from_affine_coordinates(
            x.as_slice().into(),
            y.as_slice().into(),
            false,
        );
        PublicKey::from_encoded_point(&point)
            .into_option()
            .ok_or_else(|| Error::ServerError("invalid EC point".to_string()))
    }

    /// Decode this JWK as an ECDSA verifying key.
    ///
    /// # Errors
    ///
    /// Returns `Error::ServerError` if the key is not a valid P-256 point.
    pub fn to_verifying_key(&self) -> Result<VerifyingKey, Error> {
        Ok(VerifyingKey::from(self.to_public_key()?))
    }

    /// Encode a `p256` public key as a JWK.
    #[must_use]
    pub fn from_public_key(key: &PublicKey) -> Self {
        let point = key.to_encoded_point(false);
        Self {
            kty: "EC".to_string(),
            crv: "P-256".to_string(),
            x: Base64UrlUnpadded::encode_string(point.x().expect("uncompressed point has x")),
            y: Base64UrlUnpadded::encode_string(point.y().expect("uncompressed point has y")),
        }
    }
}

/// An ephemeral EC P-256 key pair, generated fresh per transaction when
/// `ResponseMode::DirectPostJwt` is selected. Its public half is published
/// in `client_metadata.jwks`; its private half is kept on the stored
/// `Presentation` to decrypt the eventual JARM envelope, and owned by
/// exactly one Presentation (§5, Shared-resource policy).
#[derive(Clone, Debug)]
pub struct EphemeralEcKeyPair {
    secret: SecretKey,
}

impl EphemeralEcKeyPair {
    /// Generate a fresh key pair using the OS RNG.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            secret: SecretKey::random(&mut rand_core::OsRng),
        }
    }

    /// This key pair's public half, for publishing in `client_metadata`.
    #[must_use]
    pub fn public_jwk(&self) -> PublicKeyJwk {
        PublicKeyJwk::from_public_key(&self.secret.public_key())
    }

    /// Borrow the private scalar, for ECDH key agreement during JARM
    /// decryption.
    #[must_use]
    pub const fn secret(&self) -> &SecretKey {
        &self.secret
    }
}

// `Presentation` must round-trip through the store, so the ephemeral key
// is serialized as its raw scalar. It never leaves this process: there is
// no network wire format for it.
impl Serialize for EphemeralEcKeyPair {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let bytes = self.secret.to_bytes();
        Base64UrlUnpadded::encode_string(&bytes).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for EphemeralEcKeyPair {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let bytes = Base64UrlUnpadded::decode_vec(&encoded).map_err(serde::de::Error::custom)?;
        let secret = SecretKey::from_slice(&bytes).map_err(serde::de::Error::custom)?;
        Ok(Self { secret })
    }
}
