//! Core domain layer for the Tidemark ledger indexer.
//!
//! This crate contains the domain models, port traits (interfaces), and
//! the ingestion pipeline services. It follows hexagonal architecture
//! principles - this is the innermost layer with no dependencies on
//! infrastructure.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     tidemark (binary)                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  tidemark-transforms  │  tidemark-tendermint                │
//! │   (chain profiles)    │     (node RPC)                      │
//! ├───────────────────────┴─────────────────────────────────────┤
//! │                    tidemark-storage                         │
//! │                     (PostgreSQL)                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │                     tidemark-core  ← YOU ARE HERE           │
//! │            (models, ports, pool, services)                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`models`] - Domain models (Block, Transaction, Checkpoint, etc.)
//! - [`ports`] - Interface traits for adapters to implement
//! - [`pool`] - Bounded node connection pool
//! - [`services`] - Pipeline stages and the [`services::IngestionPipeline`]
//! - [`error`] - Domain error types
//! - [`metrics`] - Prometheus metrics definitions
//!
//! # Key Concepts
//!
//! ## Ports
//!
//! - [`ports::NodeConnector`] / [`ports::ConnectionManager`] - Talk to a node
//! - [`ports::Repositories`] - Checkpoint access and atomic batch writes
//! - [`ports::EnvelopeDecoder`] - Decode raw envelopes per chain scheme
//!
//! ## Transform Registry
//!
//! Each supported message type registers a pure transform keyed by its
//! protobuf type URL in a [`ports::TransformRegistry`]. A
//! [`ports::ChainProfile`] bundles a registry with an envelope decoder, so
//! one pipeline serves several chains.
//!
//! ## Pipeline Lifecycle
//!
//! 1. Load or create the checkpoint, seed the sequencer
//! 2. Wait for the chain head to reach the next height
//! 3. Fetch the block (one retry on a fresh connection)
//! 4. Decode envelopes, fan out one record per message, correlate results
//! 5. Commit block, records and checkpoint atomically

pub mod error;
pub mod metrics;
pub mod models;
pub mod pool;
pub mod ports;
pub mod services;

#[cfg(test)]
pub(crate) mod testing;
