// Library root: the batch orchestrator lives in `engine`, the CLI shell only consumes it

pub mod config;
pub mod engine;
