//! Ingestion orchestration
//!
//! Two entry points over the same pipeline: `BatchOrchestrator` polls
//! transaction history on demand, `RealtimeMonitor` subscribes to balance
//! changes over websocket. Both feed the classifier, the ledger and the
//! proof-of-history chain, and both treat duplicate signatures as no-ops so
//! they can run against the same database.

mod batch;
mod realtime;

pub use batch::{BatchConfig, BatchOrchestrator, BatchSummary, MintTarget};
pub use realtime::{ConnectionState, RealtimeConfig, RealtimeMonitor};
