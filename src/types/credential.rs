use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Internal data attached to a lease. Never carries the password.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaseMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, rename = "role", skip_serializing_if = "Option::is_none")]
    pub role_name: Option<String>,
}

impl LeaseMetadata {
    pub fn new(username: impl Into<String>, role_name: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            role_name: Some(role_name.into()),
        }
    }
}

/// A freshly created database principal. The password lives only here and
/// is wiped when the value is dropped.
#[derive(Clone, Serialize, Zeroize, ZeroizeOnDrop)]
pub struct IssuedCredential {
    pub username: String,
    pub password: String,
    pub role_name: String,
    #[zeroize(skip)]
    pub issue_time: DateTime<Utc>,
    #[zeroize(skip)]
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

impl IssuedCredential {
    pub fn lease_metadata(&self) -> LeaseMetadata {
        LeaseMetadata::new(self.username.clone(), self.role_name.clone())
    }
}

impl fmt::Debug for IssuedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedCredential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("role_name", &self.role_name)
            .field("issue_time", &self.issue_time)
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_omits_password() {
        let cred = IssuedCredential {
            username: "token_abc".to_string(),
            password: "secretpassword".to_string(),
            role_name: "web".to_string(),
            issue_time: Utc::now(),
            ttl: Duration::from_secs(60),
        };
        let meta = serde_json::to_string(&cred.lease_metadata()).unwrap();
        assert_eq!(meta, r#"{"username":"token_abc","role":"web"}"#);
        assert!(!format!("{cred:?}").contains("secretpassword"));
    }
}
