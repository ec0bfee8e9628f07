//! Pipeline services.
//!
//! Leaves first: [`correlator`] and [`decoder`] turn envelopes into records,
//! [`fetcher`] and [`sequencer`] talk to the node, [`persister`] commits, and
//! [`indexer`] wires them into the [`IngestionPipeline`].

pub mod correlator;
pub mod decoder;
pub mod fetcher;
pub mod indexer;
pub mod persister;
pub mod sequencer;

pub use correlator::{ExecutionResult, ResultCorrelator, SEND_PACKET_EVENT};
pub use decoder::{TransactionDecoder, tx_hash};
pub use fetcher::BlockFetcher;
pub use indexer::{IndexerConfig, IngestionPipeline};
pub use persister::AtomicPersister;
pub use sequencer::{HeightSequencer, initial_height};
