//! # OpenID4VP Verifier Core
//!
//! The server-side half of an [OpenID for Verifiable
//! Presentations](https://openid.net/specs/openid-4-verifiable-presentations-1_0.html)
//! exchange: a Verifier requests a Verifiable Presentation from a Wallet,
//! the Wallet fetches a signed Request Object (JAR), the Wallet posts an
//! Authorisation Response (plain `direct_post` or JARM `direct_post.jwt`),
//! and the Verifier retrieves the validated result.
//!
//! This crate models the lifecycle of a single presentation transaction as
//! a state machine (see [`domain::Presentation`]) and implements the
//! cryptographic verification of each Verifiable Presentation format the
//! Wallet may return (SD-JWT, mdoc/CBOR, and their ZKP-wrapped variants).
//!
//! HTTP routing, configuration loading, persistence, and key-store loading
//! are external collaborators: this crate exposes a [`Provider`] trait for
//! them and an in-memory [`store::PresentationStore`] implementation
//! suitable for a single-process deployment or for tests.
//!
//! # Feature Flags
//!
//! There is no default feature: the crate builds a single surface, the
//! Verifier core.

pub mod config;
pub mod core;
pub mod dif_exch;
pub mod domain;
pub mod jose;
pub mod provider;
pub mod store;
pub mod usecases;
pub mod verify;

mod error;

pub use domain::Presentation;
pub use error::Error;
pub use provider::Provider;
pub use store::PresentationStore;

/// Result type used throughout the Verifier core.
pub type Result<T, E = Error> = std::result::Result<T, E>;
