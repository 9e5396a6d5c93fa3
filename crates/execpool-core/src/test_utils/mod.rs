mod mock_executor_node;

pub use mock_executor_node::{refused_address, MockBehavior, MockExecutorNode};
