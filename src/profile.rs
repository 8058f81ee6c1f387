use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Code hosting providers that get a per-profile SSH host alias
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Github,
    Gitlab,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::Github, Provider::Gitlab];

    pub fn host(&self) -> &'static str {
        match self {
            Provider::Github => "github.com",
            Provider::Gitlab => "gitlab.com",
        }
    }

    /// SSH Host alias for a profile (e.g., "github.com-work")
    pub fn host_alias(&self, profile_name: &str) -> String {
        format!("{}-{}", self.host(), profile_name)
    }

    /// Page where a public key is registered
    pub fn ssh_keys_url(&self) -> &'static str {
        match self {
            Provider::Github => "https://github.com/settings/ssh/new",
            Provider::Gitlab => "https://gitlab.com/-/profile/keys",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Github => write!(f, "GitHub"),
            Provider::Gitlab => write!(f, "GitLab"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_key: Option<String>,
}

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Profile name cannot be empty")]
    EmptyProfileName,
    #[error("Profile name '{0}' may only contain letters, digits, '-' and '_'")]
    InvalidProfileName(String),
    #[error("Name cannot be empty")]
    EmptyName,
    #[error("Email cannot be empty")]
    EmptyEmail,
    #[error("Invalid email: {0}")]
    InvalidEmail(String),
    #[error("Profile '{0}' not found")]
    NotFound(String),
}

impl Profile {
    pub fn new(
        name: String,
        email: String,
        ssh_key: Option<String>,
        signing_key: Option<String>,
    ) -> Self {
        Self {
            name,
            email,
            ssh_key,
            signing_key,
        }
    }

    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.name.trim().is_empty() {
            return Err(ProfileError::EmptyName);
        }
        validate_email(&self.email)
    }

    /// `Name <email>` as shown in commit headers
    pub fn author(&self) -> String {
        format!("{} <{}>", self.name, self.email)
    }
}

/// Profile names end up in SSH host aliases, so they are restricted to `[A-Za-z0-9_-]+`
pub fn validate_profile_name(name: &str) -> Result<(), ProfileError> {
    if name.trim().is_empty() {
        return Err(ProfileError::EmptyProfileName);
    }
    let valid = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(ProfileError::InvalidProfileName(name.to_string()));
    }
    Ok(())
}

/// Loose shape check: `local@domain.tld`, no whitespace
pub fn validate_email(email: &str) -> Result<(), ProfileError> {
    if email.trim().is_empty() {
        return Err(ProfileError::EmptyEmail);
    }
    if email.chars().any(char::is_whitespace) {
        return Err(ProfileError::InvalidEmail(email.to_string()));
    }
    let Some((local, domain)) = email.split_once('@') else {
        return Err(ProfileError::InvalidEmail(email.to_string()));
    };
    let domain_ok = match domain.rsplit_once('.') {
        Some((head, tld)) => !head.is_empty() && !tld.is_empty() && !head.contains('@'),
        None => false,
    };
    if local.is_empty() || !domain_ok {
        return Err(ProfileError::InvalidEmail(email.to_string()));
    }
    Ok(())
}

/// Suggest a profile name from an email address.
///
/// A short first domain label (`jane@acme.io` -> `acme`) usually names the
/// organisation; otherwise the local part is used.
pub fn suggest_profile_name(email: &str) -> String {
    let (local, domain) = email.split_once('@').unwrap_or((email, ""));
    let label = domain.split('.').next().unwrap_or("");

    let candidate = if !label.is_empty() && label.len() < 10 {
        label
    } else {
        local
    };

    candidate
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(name: &str, email: &str) -> Profile {
        Profile::new(name.to_string(), email.to_string(), None, None)
    }

    #[test]
    fn test_host_alias() {
        assert_eq!(Provider::Github.host_alias("work"), "github.com-work");
        assert_eq!(Provider::Gitlab.host_alias("oss"), "gitlab.com-oss");
    }

    #[test]
    fn test_profile_validation() {
        assert!(profile("John Doe", "john@example.com").validate().is_ok());
        assert!(matches!(
            profile("", "john@example.com").validate(),
            Err(ProfileError::EmptyName)
        ));
        assert!(matches!(
            profile("John", "  ").validate(),
            Err(ProfileError::EmptyEmail)
        ));
    }

    #[test]
    fn test_email_shape() {
        assert!(validate_email("a@b.co").is_ok());
        assert!(validate_email("first.last@mail.example.org").is_ok());
        assert!(validate_email("no-at-sign.com").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("john@localhost").is_err());
        assert!(validate_email("john doe@example.com").is_err());
        assert!(validate_email("john@.com").is_err());
    }

    #[test]
    fn test_profile_name_charset() {
        assert!(validate_profile_name("work").is_ok());
        assert!(validate_profile_name("client-acme_2").is_ok());
        assert!(matches!(
            validate_profile_name(""),
            Err(ProfileError::EmptyProfileName)
        ));
        assert!(validate_profile_name("my work").is_err());
        assert!(validate_profile_name("work:1").is_err());
        assert!(validate_profile_name("trabajo-ñ").is_err());
    }

    #[test]
    fn test_suggest_profile_name() {
        assert_eq!(suggest_profile_name("jane@acme.io"), "acme");
        assert_eq!(suggest_profile_name("jane.doe@verylongcompany.com"), "jane-doe");
        assert_eq!(suggest_profile_name("dev@gmail.com"), "gmail");
        assert_eq!(suggest_profile_name("broken"), "broken");
    }

    #[test]
    fn test_profile_json_field_names() {
        let p = Profile::new(
            "Jane".to_string(),
            "jane@acme.io".to_string(),
            Some("/home/jane/.ssh/id_ed25519_work".to_string()),
            None,
        );
        let json = serde_json::to_string(&p).unwrap();
        assert!(json.contains("\"sshKey\""));
        assert!(!json.contains("signingKey"));

        let parsed: Profile =
            serde_json::from_str(r#"{"name":"Jane","email":"jane@acme.io","signingKey":"ABCD"}"#)
                .unwrap();
        assert_eq!(parsed.signing_key.as_deref(), Some("ABCD"));
        assert_eq!(parsed.ssh_key, None);
    }
}
