pub mod auth;
pub mod email;
pub mod health;

pub use auth::*;
pub use email::*;
pub use health::*;
