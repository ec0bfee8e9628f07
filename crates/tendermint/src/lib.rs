//! Tendermint RPC adapter for the Tidemark indexer.
//!
//! This crate implements the [`NodeConnector`] and [`ConnectionManager`]
//! ports from `tidemark-core` over the Tendermint JSON-RPC HTTP endpoints:
//!
//! - `/status` - chain head height
//! - `/block?height=` - header time and base64 transaction envelopes
//! - `/tx?hash=0x..` - execution code, raw log and events
//!
//! # Usage
//!
//! ```ignore
//! use tidemark_core::pool::{NodePool, PoolConfig};
//! use tidemark_tendermint::TendermintConnectionManager;
//!
//! let manager = TendermintConnectionManager::new(urls, Duration::from_secs(30), false)?;
//! let pool = NodePool::new(manager, PoolConfig::default()).await?;
//!
//! let conn = pool.get().await?;
//! let head = conn.chain_head_height().await?;
//! ```
//!
//! [`NodeConnector`]: tidemark_core::ports::NodeConnector
//! [`ConnectionManager`]: tidemark_core::ports::ConnectionManager

mod client;
mod manager;
mod rpc;

pub use client::{TendermintClient, TendermintClientConfig};
pub use manager::TendermintConnectionManager;
