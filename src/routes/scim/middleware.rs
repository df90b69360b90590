//! SCIM Basic Authentication Middleware
//!
//! Every request is checked independently against the configured username and
//! password. There is no session, lockout or rate limiting.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, Request, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use subtle::ConstantTimeEq;

use crate::{AppState, config::AuthConfig, scim::GatewayError};

/// Credentials presented in an `Authorization: Basic` header.
#[derive(PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

// Keep the password out of Debug output.
impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("password", &"****")
            .finish()
    }
}

/// Basic authentication middleware.
///
/// On failure responds 401 with a `WWW-Authenticate` challenge and logs the
/// offending username.
pub async fn basic_auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let auth = &state.config.auth;

    match extract_basic_credentials(request.headers()) {
        Some(credentials) if credentials_match(auth, &credentials) => next.run(request).await,
        Some(credentials) => {
            tracing::warn!(
                user = %credentials.username,
                method = %request.method(),
                path = %request.uri().path(),
                "Authentication failed: invalid credentials"
            );
            unauthorized(&state)
        }
        None => {
            tracing::warn!(
                method = %request.method(),
                path = %request.uri().path(),
                "Authentication failed: missing or malformed Basic credentials"
            );
            unauthorized(&state)
        }
    }
}

fn unauthorized(state: &AppState) -> Response {
    let mut response = GatewayError::Auth
        .to_scim(state.adapter.name())
        .into_response();
    let challenge = HeaderValue::from_str(&format!("Basic realm=\"{}\"", state.config.auth.realm))
        .unwrap_or_else(|_| HeaderValue::from_static("Basic realm=\"ScimGateway\""));
    response
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, challenge);
    response
}

/// Compare both fields in constant time.
fn credentials_match(auth: &AuthConfig, credentials: &BasicCredentials) -> bool {
    let user_ok = credentials
        .username
        .as_bytes()
        .ct_eq(auth.username.as_bytes());
    let pass_ok = credentials
        .password
        .as_bytes()
        .ct_eq(auth.password.as_bytes());
    bool::from(user_ok & pass_ok)
}

/// Extract credentials from the Authorization header.
///
/// Expects format: `Authorization: Basic base64(<username>:<password>)`.
/// The scheme name is matched case-insensitively.
fn extract_basic_credentials(headers: &HeaderMap) -> Option<BasicCredentials> {
    let auth_str = headers.get(header::AUTHORIZATION)?.to_str().ok()?;

    // 6 chars for "Basic "
    if auth_str.len() < 6 || !auth_str[..6].eq_ignore_ascii_case("Basic ") {
        return None;
    }
    let decoded = STANDARD.decode(auth_str[6..].trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;

    Some(BasicCredentials {
        username: username.to_string(),
        password: password.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn basic(user_pass: &str) -> HeaderMap {
        headers(&format!("Basic {}", STANDARD.encode(user_pass)))
    }

    fn auth() -> AuthConfig {
        AuthConfig {
            username: "gwadmin".into(),
            password: "password".into(),
            realm: "ScimGateway".into(),
        }
    }

    #[test]
    fn test_extract_basic_credentials_valid() {
        let credentials = extract_basic_credentials(&basic("gwadmin:password")).unwrap();
        assert_eq!(credentials.username, "gwadmin");
        assert_eq!(credentials.password, "password");
    }

    #[test]
    fn test_extract_basic_credentials_case_insensitive() {
        let value = format!("basic {}", STANDARD.encode("gwadmin:password"));
        assert!(extract_basic_credentials(&headers(&value)).is_some());
    }

    #[test]
    fn test_password_may_contain_colon() {
        let credentials = extract_basic_credentials(&basic("gwadmin:pa:ss")).unwrap();
        assert_eq!(credentials.password, "pa:ss");
    }

    #[test]
    fn test_extract_basic_credentials_missing_header() {
        assert!(extract_basic_credentials(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_extract_basic_credentials_wrong_scheme() {
        assert!(extract_basic_credentials(&headers("Bearer abc123")).is_none());
    }

    #[test]
    fn test_extract_basic_credentials_bad_encoding() {
        assert!(extract_basic_credentials(&headers("Basic !!!")).is_none());
        // No separator
        assert!(extract_basic_credentials(&basic("gwadmin")).is_none());
    }

    #[test]
    fn test_credentials_match_exactly() {
        let good = extract_basic_credentials(&basic("gwadmin:password")).unwrap();
        let wrong_pass = extract_basic_credentials(&basic("gwadmin:passwor")).unwrap();
        let wrong_user = extract_basic_credentials(&basic("GWADMIN:password")).unwrap();

        assert!(credentials_match(&auth(), &good));
        assert!(!credentials_match(&auth(), &wrong_pass));
        assert!(!credentials_match(&auth(), &wrong_user));
    }

    #[test]
    fn test_debug_hides_password() {
        let credentials = extract_basic_credentials(&basic("gwadmin:hunter2")).unwrap();
        assert!(!format!("{credentials:?}").contains("hunter2"));
    }
}
