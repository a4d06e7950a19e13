//! # Domain model
//!
//! Presentation lifecycle states, typed identifiers, response-mode enums,
//! and Wallet-response variants. State is data: transitions are total
//! functions `(Presentation, Event) -> Result<Presentation>` implemented as
//! inherent methods on [`Presentation`], not a class hierarchy.

mod ids;
mod presentation;
mod query;
mod wallet_response;

pub use ids::{RequestId, ResponseCode, TransactionId};
pub use presentation::{
    EmbedMode, GetWalletResponseMethod, IdTokenType, Presentation, PresentationMeta,
    PresentationType, ResponseMode, TimeoutReason, ZkpKeys,
};
pub use query::{
    Constraints, DescriptorMap, Field, Filter, FilterValue, Format, InputDescriptor,
    PresentationDefinition, PresentationSubmission,
};
pub use wallet_response::{AuthorisationResponse, AuthorisationResponseTo, WalletResponse};
