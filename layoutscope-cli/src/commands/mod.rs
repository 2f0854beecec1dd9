pub mod analyze;
pub mod common;
pub mod query;
pub mod worker;
