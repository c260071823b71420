pub mod chat;
pub mod session;
pub mod user;

pub use chat::*;
pub use session::*;
pub use user::*;
