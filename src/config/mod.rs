pub mod ai;
pub mod job;

pub use ai::AiConfig;
pub use job::JobConfig;
