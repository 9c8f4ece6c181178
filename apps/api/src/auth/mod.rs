pub mod extractor;
pub mod handlers;
pub mod password;
pub mod policy;
pub mod store;
pub mod tokens;

pub use extractor::{AuthUser, OptionalAuthUser};
pub use policy::Resource;
