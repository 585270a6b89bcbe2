//! Command implementations.

pub mod extract;
pub mod plan;
pub mod stats;

pub use self::extract::execute_extract;
pub use self::plan::execute_plan;
pub use self::stats::execute_stats;
