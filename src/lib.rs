pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod instance;
pub mod loader;
pub mod objects;
pub mod stop;
pub mod supervisor;
pub mod worker;

pub use stop::StopToken;
pub use supervisor::{population_plan, run, run_with_stop, RunSummary, WorkerReport};
