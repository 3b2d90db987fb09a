pub mod parameters;
pub mod queues;
pub mod state;
pub mod variables;
