use crate::error::CredsError;
use crate::service::template;
use serde::{Deserialize, Serialize};

fn default_terminate_sessions() -> bool {
    true
}

/// A named template describing how to create and revoke a database principal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleEntry {
    #[serde(default)]
    pub name: String,
    /// Creation statements; `{{name}}` and `{{password}}` are substituted.
    #[serde(rename = "sql", alias = "creation_sql")]
    pub creation_sql: String,
    /// Revocation statements; only `{{name}}` is substituted. Falls back to
    /// the dialect default when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revocation_sql: Option<String>,
    /// Kill the principal's live sessions before running revocation SQL.
    #[serde(default = "default_terminate_sessions")]
    pub terminate_sessions: bool,
}

impl RoleEntry {
    pub fn new(name: impl Into<String>, creation_sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            creation_sql: creation_sql.into(),
            revocation_sql: None,
            terminate_sessions: true,
        }
    }

    pub fn with_revocation_sql(mut self, sql: impl Into<String>) -> Self {
        self.revocation_sql = Some(sql.into());
        self
    }

    /// Blank revocation SQL means "use the default".
    pub fn normalized(mut self) -> Self {
        if self
            .revocation_sql
            .as_deref()
            .is_some_and(|sql| template::split_statements(sql).is_empty())
        {
            self.revocation_sql = None;
        }
        self
    }

    pub fn validate(&self) -> Result<(), CredsError> {
        if !is_valid_role_name(&self.name) {
            return Err(CredsError::InvalidRequest(format!(
                "invalid role name: {:?}",
                self.name
            )));
        }
        if template::split_statements(&self.creation_sql).is_empty() {
            return Err(CredsError::InvalidRequest(
                "role creation SQL must contain at least one statement".to_string(),
            ));
        }
        if self
            .revocation_sql
            .as_deref()
            .is_some_and(|sql| sql.contains(template::PASSWORD_TOKEN))
        {
            return Err(CredsError::InvalidRequest(format!(
                "revocation SQL cannot reference {}",
                template::PASSWORD_TOKEN
            )));
        }
        Ok(())
    }
}

/// Word characters, optionally with `-` or `.` in the interior.
pub fn is_valid_role_name(name: &str) -> bool {
    let is_word = |c: char| c.is_ascii_alphanumeric() || c == '_';
    let (Some(first), Some(last)) = (name.chars().next(), name.chars().last()) else {
        return false;
    };
    is_word(first) && is_word(last) && name.chars().all(|c| is_word(c) || c == '-' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_names() {
        for ok in ["web", "a", "read-only", "v1.2", "team_a"] {
            assert!(is_valid_role_name(ok), "{ok}");
        }
        for bad in ["", "-web", "web.", "a/b", "x y"] {
            assert!(!is_valid_role_name(bad), "{bad}");
        }
    }

    #[test]
    fn blank_creation_sql_is_rejected() {
        let role = RoleEntry::new("web", " ; ;\n ");
        assert!(matches!(role.validate(), Err(CredsError::InvalidRequest(_))));
    }

    #[test]
    fn revocation_sql_cannot_use_password() {
        let role = RoleEntry::new("web", "CREATE USER {{name}};")
            .with_revocation_sql("ALTER USER {{name}} IDENTIFIED BY {{password}};");
        assert!(role.validate().is_err());
    }

    #[test]
    fn blank_revocation_sql_normalizes_to_default() {
        let role = RoleEntry::new("web", "CREATE USER {{name}};")
            .with_revocation_sql("  ;  ")
            .normalized();
        assert_eq!(role.revocation_sql, None);
    }

    #[test]
    fn stored_field_names() {
        let role: RoleEntry = serde_json::from_str(
            r#"{"sql":"CREATE USER {{name}};","revocation_sql":"DROP USER {{name}};"}"#,
        )
        .unwrap();
        assert!(role.terminate_sessions);
        assert_eq!(role.revocation_sql.as_deref(), Some("DROP USER {{name}};"));

        let json = serde_json::to_value(&role).unwrap();
        assert_eq!(json["sql"], "CREATE USER {{name}};");
    }
}
