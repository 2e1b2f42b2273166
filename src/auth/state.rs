//! Authentication state traits and macro.

use crate::db::Database;
use crate::token::TokenCodec;

/// Trait for state types that provide what the authentication chain needs.
pub trait HasAuthBackend {
    fn codec(&self) -> &TokenCodec;
    fn db(&self) -> &Database;
    /// Trusted header carrying the client IP, if behind a proxy.
    fn client_ip_header(&self) -> Option<&str>;
}

/// Macro to implement `HasAuthBackend` for state structs with the standard fields.
///
/// The struct must have these fields:
/// - `codec: Arc<TokenCodec>`
/// - `db: Database`
/// - `client_ip_header: Option<String>`
///
/// # Example
/// ```ignore
/// use crate::impl_has_auth_backend;
///
/// #[derive(Clone)]
/// pub struct MyState {
///     pub db: Database,
///     pub codec: Arc<TokenCodec>,
///     pub client_ip_header: Option<String>,
/// }
///
/// impl_has_auth_backend!(MyState);
/// ```
#[macro_export]
macro_rules! impl_has_auth_backend {
    ($state_type:ty) => {
        impl $crate::auth::HasAuthBackend for $state_type {
            fn codec(&self) -> &$crate::token::TokenCodec {
                &self.codec
            }
            fn db(&self) -> &$crate::db::Database {
                &self.db
            }
            fn client_ip_header(&self) -> Option<&str> {
                self.client_ip_header.as_deref()
            }
        }
    };
}
