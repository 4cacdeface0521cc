//! HTTP Basic-auth access gate.
//!
//! Credentials are configured as a user name and the lower-case hex SHA-256
//! of the password. When either is empty the gate is disabled and every
//! request passes.

use std::fmt;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use sha2::{Digest, Sha256};
use subtle::{Choice, ConstantTimeEq};
use tracing::debug;

use crate::config::AuthConfig;

/// Realm sent with every challenge.
pub const REALM: &str = "NoxDrive";

/// Body of the challenge for requests without credentials.
pub const AUTH_REQUIRED: &str = "Auth required";

/// Body of the challenge for requests with wrong credentials.
pub const UNAUTHORIZED: &str = "Unauthorized";

/// Outcome of checking one `Authorization` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Let the request through.
    Allow,
    /// No usable Basic credentials were presented.
    Challenge,
    /// Credentials were presented and did not match.
    Deny,
}

struct Credentials {
    username_digest: [u8; 32],
    password_sha256: String,
}

/// Basic-auth gate shared by all routes.
#[derive(Clone)]
pub struct AccessGate {
    credentials: Option<Arc<Credentials>>,
}

impl fmt::Debug for AccessGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessGate")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl AccessGate {
    /// Gate for the configured secrets; disabled when either is empty.
    pub fn from_config(auth: &AuthConfig) -> Self {
        if !auth.is_enabled() {
            return Self::disabled();
        }

        Self {
            credentials: Some(Arc::new(Credentials {
                username_digest: sha256(auth.username.as_bytes()),
                password_sha256: auth.password_sha256.to_lowercase(),
            })),
        }
    }

    /// Gate that lets everything through.
    pub fn disabled() -> Self {
        Self { credentials: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.credentials.is_some()
    }

    /// Check the raw value of an `Authorization` header.
    pub fn check(&self, header: Option<&str>) -> GateDecision {
        let Some(credentials) = &self.credentials else {
            return GateDecision::Allow;
        };

        let Some(encoded) = header.and_then(basic_payload) else {
            return GateDecision::Challenge;
        };

        let Some((username, password)) = decode_basic(encoded) else {
            debug!("Malformed Basic credentials");
            return GateDecision::Deny;
        };

        // Evaluate both comparisons so timing does not reveal which failed.
        let user_ok = digests_match(&sha256(username.as_bytes()), &credentials.username_digest);
        let pass_ok = digests_match(
            hash_password(&password).as_bytes(),
            credentials.password_sha256.as_bytes(),
        );

        if bool::from(user_ok & pass_ok) {
            GateDecision::Allow
        } else {
            GateDecision::Deny
        }
    }
}

/// Lower-case hex SHA-256 of a password, as stored in the configuration.
pub fn hash_password(password: &str) -> String {
    hex::encode(sha256(password.as_bytes()))
}

/// Middleware enforcing the gate on every route it wraps.
pub async fn require_auth(
    State(gate): State<Arc<AccessGate>>,
    request: Request,
    next: Next,
) -> Response {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    match gate.check(header) {
        GateDecision::Allow => next.run(request).await,
        GateDecision::Challenge => challenge(AUTH_REQUIRED),
        GateDecision::Deny => {
            debug!(uri = %request.uri().path(), "Rejected credentials");
            challenge(UNAUTHORIZED)
        }
    }
}

fn challenge(message: &'static str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(WWW_AUTHENTICATE, format!("Basic realm=\"{}\"", REALM))],
        message,
    )
        .into_response()
}

/// The encoded part of a `Basic` header. The scheme is case-insensitive.
fn basic_payload(header: &str) -> Option<&str> {
    let (scheme, rest) = header.trim().split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("basic")
        .then(|| rest.trim())
}

fn decode_basic(encoded: &str) -> Option<(String, String)> {
    let decoded = STANDARD.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Constant-time equality; slices of different length never match.
fn digests_match(a: &[u8], b: &[u8]) -> Choice {
    a.ct_eq(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> AccessGate {
        AccessGate::from_config(&AuthConfig {
            username: "admin".to_string(),
            password_sha256: hash_password("s3cret:pass"),
        })
    }

    fn basic(user: &str, pass: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{}:{}", user, pass)))
    }

    #[test]
    fn test_hash_password() {
        assert_eq!(
            hash_password("password"),
            "5e884898da28047151d0e56f8dc6292773603d0d6aabbdd62a11ef721d1542d8"
        );
    }

    #[test]
    fn test_disabled_gate_allows_everything() {
        for auth in [
            AuthConfig::default(),
            AuthConfig {
                username: "admin".to_string(),
                password_sha256: String::new(),
            },
            AuthConfig {
                username: String::new(),
                password_sha256: hash_password("x"),
            },
        ] {
            let gate = AccessGate::from_config(&auth);
            assert!(!gate.is_enabled());
            assert_eq!(gate.check(None), GateDecision::Allow);
            assert_eq!(gate.check(Some("Basic garbage")), GateDecision::Allow);
        }
    }

    #[test]
    fn test_missing_or_foreign_scheme_is_challenged() {
        let gate = gate();
        assert_eq!(gate.check(None), GateDecision::Challenge);
        assert_eq!(gate.check(Some("")), GateDecision::Challenge);
        assert_eq!(gate.check(Some("Bearer abc")), GateDecision::Challenge);
        assert_eq!(gate.check(Some("Basic")), GateDecision::Challenge);
    }

    #[test]
    fn test_valid_credentials_allowed() {
        let gate = gate();
        assert_eq!(
            gate.check(Some(&basic("admin", "s3cret:pass"))),
            GateDecision::Allow
        );

        let lower = basic("admin", "s3cret:pass").replacen("Basic", "basic", 1);
        assert_eq!(gate.check(Some(&lower)), GateDecision::Allow);
    }

    #[test]
    fn test_wrong_credentials_denied() {
        let gate = gate();
        assert_eq!(gate.check(Some(&basic("admin", "nope"))), GateDecision::Deny);
        assert_eq!(gate.check(Some(&basic("root", "s3cret:pass"))), GateDecision::Deny);
        assert_eq!(gate.check(Some(&basic("", ""))), GateDecision::Deny);
        assert_eq!(gate.check(Some("Basic !!!not-base64")), GateDecision::Deny);
        assert_eq!(
            gate.check(Some(&format!("Basic {}", STANDARD.encode("no-colon")))),
            GateDecision::Deny
        );
    }

    #[test]
    fn test_uppercase_configured_hash_accepted() {
        let gate = AccessGate::from_config(&AuthConfig {
            username: "admin".to_string(),
            password_sha256: hash_password("pw").to_uppercase(),
        });
        assert_eq!(gate.check(Some(&basic("admin", "pw"))), GateDecision::Allow);
    }

    #[test]
    fn test_debug_hides_secrets() {
        let debug = format!("{:?}", gate());
        assert!(debug.contains("enabled: true"));
        assert!(!debug.contains(&hash_password("s3cret:pass")));
    }

    #[test]
    fn test_digests_match() {
        assert!(bool::from(digests_match(b"abc", b"abc")));
        assert!(!bool::from(digests_match(b"abc", b"abd")));
        assert!(!bool::from(digests_match(b"abc", b"abcd")));
        assert!(!bool::from(digests_match(b"", b"a")));
    }

    #[test]
    fn test_uppercase_configured_digest_accepted() {
        let gate = AccessGate::from_config(&AuthConfig {
            username: "admin".to_string(),
            password_sha256: hash_password("pw").to_uppercase(),
        });
        assert_eq!(gate.check(Some(&basic("admin", "pw"))), GateDecision::Allow);
    }
}
