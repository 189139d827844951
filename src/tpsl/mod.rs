pub mod engine;
pub mod exit_queue;
pub mod state_machine;
pub mod triggers;

pub use engine::run;
pub use exit_queue::ExitQueue;
