pub mod email;
pub mod session;
pub mod user;

pub use email::EmailRepository;
pub use session::SessionRepository;
pub use user::UserRepository;
