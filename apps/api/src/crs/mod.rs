pub mod handlers;
pub mod lookup;
pub mod session;
