//! # JOSE primitives
//!
//! The minimal JSON Object Signing and Encryption surface the Verifier
//! core needs: signing and verifying compact JWS (for the JAR, and for
//! checking SD-JWT/Key-Binding signatures), and decrypting/verifying the
//! JARM envelope the Wallet may wrap its Authorisation Response in.
//!
//! Implemented directly against `p256` rather than pulling in an
//! external JOSE crate (see `DESIGN.md`).

pub mod jwe;
pub mod jwk;
pub mod jws;

pub use jwk::PublicKeyJwk;
pub use jws::{JwsAlgorithm, Signer};
