//! Transaction classifier - pure fee-event labeling
//!
//! Given one fully-parsed transaction plus the known vault and creator-wallet
//! addresses, decide whether it represents a fee collection, a withdrawal or
//! a burn. No I/O, no state; collaborators inject everything.

mod amounts;
mod rules;
mod stats;
mod types;

pub use amounts::coerce_amount;
pub use rules::{classify, classify_batch};
pub use stats::{calculate_event_stats, EventStats};
pub use types::{
    BurnAnnotation, ClassifiedEvent, FeeEventType, InstructionInfo, NativeTransfer,
    ParsedTransaction, TokenTransfer, TransactionEvents,
};
