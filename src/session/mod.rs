mod registry;
mod session;

pub(crate) use registry::SessionRegistry;
pub use session::OpenSessionRequest;
pub use session::Session;
pub use session::SessionId;
pub use session::SessionValidationError;
