pub mod loop_;
pub mod prompt;

pub use loop_::{run_exchange, AgentError, Exchange};
