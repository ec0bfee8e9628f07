//! Chain profiles and message transforms for the Tidemark indexer.
//!
//! This crate provides the chain-specific half of the pipeline:
//!
//! - Protobuf definitions of the supported messages ([`proto`])
//! - The `TxRaw` envelope decoder, bare or length-prefixed ([`envelope`])
//! - One pure transform per message type, grouped by module
//! - Ready-made [`ChainProfile`]s wiring the above together
//!
//! # Usage
//!
//! ```ignore
//! use tidemark_transforms::profile_by_name;
//!
//! let profile = profile_by_name("iris").expect("known profile");
//! let pipeline = IngestionPipeline::new(config, pool, repositories, profile);
//! ```
//!
//! # Adding a Message Type
//!
//! Declare the message in [`proto`], write a transform
//! `fn(Msg, &TransformContext) -> DomainResult<TransactionDraft>` and register
//! it under its type URL in the profiles that index it.

pub mod coinswap;
pub mod cosmos;
pub mod envelope;
pub mod ibc;
pub mod profiles;
pub mod proto;

pub use envelope::{EnvelopeScheme, ProtoEnvelopeDecoder};
pub use profiles::{PROFILE_NAMES, cosmos_profile, iris_profile, profile_by_name};
pub use tidemark_core::ports::ChainProfile;
