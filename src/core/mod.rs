// Job graph, execution and checkpointing

pub mod executor;
pub mod graph;
pub mod jobstore;
pub mod scheduler;

pub use executor::*;
pub use graph::*;
pub use jobstore::*;
pub use scheduler::*;
