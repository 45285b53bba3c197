pub mod analyzer;
pub mod config;
pub mod fanout;
pub mod orchestrator;
pub mod runner;

pub use analyzer::*;
pub use config::*;
pub use fanout::*;
pub use orchestrator::*;
pub use runner::*;
