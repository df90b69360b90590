use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Basic authentication credentials every request must present.
///
/// The password is compared in plain form; supply it through `${VAR}`
/// interpolation rather than writing it into the file.
#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    pub username: String,

    pub password: String,

    /// Realm advertised in the `WWW-Authenticate` challenge.
    #[serde(default = "default_realm")]
    pub realm: String,
}

fn default_realm() -> String {
    "ScimGateway".to_string()
}

impl AuthConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.username.is_empty() {
            return Err(ConfigError::Validation("auth.username must not be empty".into()));
        }
        if self.password.is_empty() {
            return Err(ConfigError::Validation("auth.password must not be empty".into()));
        }
        if self.username.contains(':') {
            return Err(ConfigError::Validation(
                "auth.username must not contain ':'".into(),
            ));
        }
        if self.realm.contains('"') {
            return Err(ConfigError::Validation(
                "auth.realm must not contain '\"'".into(),
            ));
        }
        Ok(())
    }
}

// Keep the password out of Debug output, which ends up in logs.
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("username", &self.username)
            .field("password", &"****")
            .field("realm", &self.realm)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth(username: &str, password: &str) -> AuthConfig {
        AuthConfig {
            username: username.into(),
            password: password.into(),
            realm: default_realm(),
        }
    }

    #[test]
    fn test_valid() {
        assert!(auth("gwadmin", "password").validate().is_ok());
    }

    #[test]
    fn test_empty_credentials_rejected() {
        assert!(auth("", "password").validate().is_err());
        assert!(auth("gwadmin", "").validate().is_err());
    }

    #[test]
    fn test_colon_in_username_rejected() {
        assert!(auth("gw:admin", "password").validate().is_err());
    }

    #[test]
    fn test_debug_hides_password() {
        let debug = format!("{:?}", auth("gwadmin", "hunter2"));
        assert!(debug.contains("gwadmin"));
        assert!(!debug.contains("hunter2"));
    }
}
