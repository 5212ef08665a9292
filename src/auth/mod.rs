pub mod jwt;
pub mod session;

pub use jwt::{verify_jwt, Claims};
pub use session::{require_session, Session};
