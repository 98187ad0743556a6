pub mod query;
pub mod status;
