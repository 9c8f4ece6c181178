pub mod handlers;
pub mod patch;
