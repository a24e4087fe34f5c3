//! Queue abstraction, worker handlers, reindex controller and event
//! subscribers.

pub mod events;
pub mod in_process;
pub mod lock_store;
pub mod queue;
pub mod reindex;
pub mod worker;
