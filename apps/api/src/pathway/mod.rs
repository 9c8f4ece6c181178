pub mod handlers;
pub mod upsert;
