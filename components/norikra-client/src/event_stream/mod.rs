pub mod enrich;
pub mod fetch;
pub mod sweep;
