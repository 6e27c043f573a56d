pub mod blackboard;
pub mod bus;
pub mod config;
pub mod node;
pub mod scenario;
