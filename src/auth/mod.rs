//! Bearer token authentication.
//!
//! Short-lived access tokens are verified statelessly on every request by
//! [`authenticate`]; [`require_live_user`] then confirms the subject still
//! exists. Long-lived refresh tokens are only ever exchanged at the refresh
//! endpoint, where the backing session is checked.

mod errors;
mod extractors;
mod ip;
mod middleware;
mod state;
mod types;

pub use errors::{ApiAuthError, AuthErrorKind};
pub use extractors::{Auth, OptionalAuth};
pub use ip::ClientInfo;
pub(crate) use ip::extract_client_ip;
pub use middleware::{authenticate, protect, require_live_user};
pub use state::HasAuthBackend;
pub use types::AuthenticatedUser;
