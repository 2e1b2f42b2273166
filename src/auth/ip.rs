//! Client IP and user agent extraction.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{header, request::Parts},
};

use super::state::HasAuthBackend;

/// Trait for types that provide access to HTTP headers and extensions.
/// Implemented for both `Parts` and `Request` to allow flexible IP extraction.
pub(crate) trait HasHeadersAndExtensions {
    fn headers(&self) -> &axum::http::HeaderMap;
    fn extensions(&self) -> &axum::http::Extensions;
}

impl HasHeadersAndExtensions for Parts {
    fn headers(&self) -> &axum::http::HeaderMap {
        &self.headers
    }
    fn extensions(&self) -> &axum::http::Extensions {
        &self.extensions
    }
}

impl<B> HasHeadersAndExtensions for axum::extract::Request<B> {
    fn headers(&self) -> &axum::http::HeaderMap {
        axum::extract::Request::headers(self)
    }
    fn extensions(&self) -> &axum::http::Extensions {
        axum::extract::Request::extensions(self)
    }
}

/// Extract the client IP address.
///
/// If `trusted_header` is set, the first comma-separated entry of that header
/// is used and there is no fallback to the socket address. Otherwise the
/// address comes from `ConnectInfo`.
pub(crate) fn extract_client_ip<T: HasHeadersAndExtensions>(
    source: &T,
    trusted_header: Option<&str>,
) -> Result<String, &'static str> {
    match trusted_header {
        Some(name) => {
            let value = source
                .headers()
                .get(name)
                .ok_or("IP header not present")?
                .to_str()
                .map_err(|_| "IP header contains invalid characters")?;
            let ip = value.split(',').next().unwrap_or("").trim();
            if ip.is_empty() {
                return Err("IP header is empty");
            }
            Ok(ip.to_string())
        }
        None => source
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip().to_string())
            .ok_or("No client IP available"),
    }
}

/// Provenance of a request, recorded on the sessions it opens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    /// Empty when the address cannot be determined.
    pub ip: String,
    /// Empty when the client sent no `User-Agent`.
    pub user_agent: String,
}

impl<S> FromRequestParts<S> for ClientInfo
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let ip = extract_client_ip(parts, state.client_ip_header()).unwrap_or_else(|reason| {
            tracing::debug!(reason, "Client IP unavailable");
            String::new()
        });

        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        Ok(ClientInfo { ip, user_agent })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Request;

    #[test]
    fn test_trusted_header() {
        let request = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(())
            .unwrap();

        assert_eq!(
            extract_client_ip(&request, Some("x-forwarded-for")).unwrap(),
            "203.0.113.7"
        );
    }

    #[test]
    fn test_trusted_header_missing_does_not_fall_back() {
        let mut request = Request::builder().body(()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));

        assert!(extract_client_ip(&request, Some("x-real-ip")).is_err());
    }

    #[test]
    fn test_connect_info() {
        let mut request = Request::builder().body(()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 168, 1, 2], 4000))));

        assert_eq!(extract_client_ip(&request, None).unwrap(), "192.168.1.2");
    }

    #[test]
    fn test_no_source() {
        let request = Request::builder().body(()).unwrap();
        assert!(extract_client_ip(&request, None).is_err());
    }
}
