//! Credentials and the `Authorization` header built from them.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::debug;
use std::fmt;

use crate::error::Error;
use crate::runtime::Runtime;

pub const ENV_APPLICATION_ID: &str = "PCO_APPLICATION_ID";
pub const ENV_SECRET: &str = "PCO_SECRET";
pub const ENV_TOKEN: &str = "PCO_TOKEN";

/// Either personal-access-token style application credentials or an
/// OAuth access token obtained elsewhere.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Basic {
        application_id: String,
        secret: String,
    },
    Token(String),
}

impl Credentials {
    /// Validates a combination of optional credential parts.
    ///
    /// Exactly one of "application id and secret" or "token" must be given.
    pub fn from_parts(
        application_id: Option<String>,
        secret: Option<String>,
        token: Option<String>,
    ) -> Result<Self, Error> {
        match (application_id, secret, token) {
            (Some(application_id), Some(secret), None) => Ok(Credentials::Basic {
                application_id,
                secret,
            }),
            (None, None, Some(token)) => Ok(Credentials::Token(token)),
            _ => Err(Error::Config(
                "You must specify either an application ID and a secret or an OAuth token, but not both"
                    .to_string(),
            )),
        }
    }

    /// Reads `PCO_APPLICATION_ID`/`PCO_SECRET` or `PCO_TOKEN`.
    /// Empty variables count as unset.
    pub fn from_runtime<R: Runtime>(runtime: &R) -> Result<Self, Error> {
        let read = |key: &str| runtime.env_var(key).ok().filter(|v| !v.is_empty());

        let credentials = Self::from_parts(read(ENV_APPLICATION_ID), read(ENV_SECRET), read(ENV_TOKEN))?;
        debug!("Using credentials from the environment: {:?}", credentials);
        Ok(credentials)
    }

    /// The value for the `Authorization` header.
    pub fn auth_header(&self) -> String {
        match self {
            Credentials::Basic {
                application_id,
                secret,
            } => format!(
                "Basic {}",
                STANDARD.encode(format!("{}:{}", application_id, secret))
            ),
            Credentials::Token(token) => format!("Bearer {}", token),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Basic { application_id, .. } => f
                .debug_struct("Basic")
                .field("application_id", application_id)
                .field("secret", &"*********")
                .finish(),
            Credentials::Token(token) => f.debug_tuple("Token").field(&mask(token)).finish(),
        }
    }
}

/// Keeps the first 8 and last 4 characters of long secrets.
pub fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 16 {
        return "*********".to_string();
    }
    let head: String = chars[..8].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}*********{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MockRuntime;
    use mockall::predicate::eq;
    use std::env::VarError;

    fn runtime_with(vars: &[(&'static str, &'static str)]) -> MockRuntime {
        let mut runtime = MockRuntime::new();
        for key in [ENV_APPLICATION_ID, ENV_SECRET, ENV_TOKEN] {
            let value = vars
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string());
            runtime
                .expect_env_var()
                .with(eq(key))
                .returning(move |_| value.clone().ok_or(VarError::NotPresent));
        }
        runtime
    }

    #[test]
    fn test_basic_auth_header() {
        let credentials = Credentials::Basic {
            application_id: "app_id".to_string(),
            secret: "secret".to_string(),
        };
        // base64("app_id:secret")
        assert_eq!(credentials.auth_header(), "Basic YXBwX2lkOnNlY3JldA==");
    }

    #[test]
    fn test_token_auth_header() {
        let credentials = Credentials::Token("abc123".to_string());
        assert_eq!(credentials.auth_header(), "Bearer abc123");
    }

    #[test]
    fn test_from_parts_rejects_invalid_combinations() {
        let some = |s: &str| Some(s.to_string());

        assert!(Credentials::from_parts(None, None, None).is_err());
        assert!(Credentials::from_parts(some("id"), None, None).is_err());
        assert!(Credentials::from_parts(None, some("secret"), None).is_err());
        assert!(Credentials::from_parts(some("id"), some("secret"), some("token")).is_err());
        assert!(matches!(
            Credentials::from_parts(some("id"), None, some("token")),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_from_runtime_token() {
        let runtime = runtime_with(&[(ENV_TOKEN, "oauth-token")]);
        let credentials = Credentials::from_runtime(&runtime).unwrap();
        assert_eq!(credentials, Credentials::Token("oauth-token".to_string()));
    }

    #[test]
    fn test_from_runtime_basic() {
        let runtime = runtime_with(&[(ENV_APPLICATION_ID, "id"), (ENV_SECRET, "secret")]);
        let credentials = Credentials::from_runtime(&runtime).unwrap();
        assert_eq!(
            credentials,
            Credentials::Basic {
                application_id: "id".to_string(),
                secret: "secret".to_string()
            }
        );
    }

    #[test]
    fn test_from_runtime_ignores_empty_values() {
        let runtime = runtime_with(&[(ENV_APPLICATION_ID, ""), (ENV_TOKEN, "t")]);
        let credentials = Credentials::from_runtime(&runtime).unwrap();
        assert_eq!(credentials, Credentials::Token("t".to_string()));
    }

    #[test]
    fn test_debug_masks_secrets() {
        let basic = Credentials::Basic {
            application_id: "id".to_string(),
            secret: "super-secret-value".to_string(),
        };
        assert!(!format!("{:?}", basic).contains("super-secret-value"));

        let token = Credentials::Token("0123456789abcdefghijklmnop".to_string());
        let debug = format!("{:?}", token);
        assert!(debug.contains("01234567*********mnop"));
        assert!(!debug.contains("89abcdefghijkl"));
    }

    #[test]
    fn test_mask_short_secret() {
        assert_eq!(mask("short"), "*********");
    }
}
