pub mod handlers;
pub mod status;
