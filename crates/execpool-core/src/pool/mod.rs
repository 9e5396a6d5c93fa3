//! Executor pool access: node addressing, selection, transport and health.

pub mod health;
pub mod selector;
pub mod transport;

pub use health::{probe_pool, NodeHealth};
pub use selector::{NodeSelector, RandomSelector};
pub use transport::{HttpNodeTransport, NodeAddressing, NodeTransport};
