//! Reliable n-ary tree broadcast (fan-out 8) of new skipchain blocks to
//! every server in a roster, with bounded latency and partial-failure
//! reporting instead of a fatal abort (§4.4, §9).

pub mod protocol;
pub mod tree;

pub use protocol::{outcome_to_result, DataSink, PropagationOutcome, PropagationTransport, propagate};
pub use tree::Tree;

/// Fan-out used for the server-roster broadcast tree (§4.4).
pub const FANOUT: usize = 8;
