// =============================================================================
// Rooted Hearts Backend - Configuration
// =============================================================================

use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g., "127.0.0.1:7000")
    pub bind_address: String,

    /// Database URL (SQLite path)
    pub database_url: String,

    /// JWT secret for signing tokens
    pub jwt_secret: String,

    /// JWT token expiry in hours
    pub jwt_expiry_hours: i64,

    /// Frontend URL for redirects
    pub frontend_url: String,

    /// Emails that are granted admin rights when they register
    pub admin_emails: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "127.0.0.1:7000".into()),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:rooted_hearts.db".into()),
            jwt_secret: env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?,
            jwt_expiry_hours: env::var("JWT_EXPIRY_HOURS")
                .unwrap_or_else(|_| "24".into())
                .parse()
                .unwrap_or(24),
            frontend_url: env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".into()),
            admin_emails: parse_admin_emails(&env::var("ADMIN_EMAILS").unwrap_or_default()),
        })
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        self.admin_emails.iter().any(|e| *e == email)
    }
}

fn parse_admin_emails(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_emails_are_normalised() {
        let emails = parse_admin_emails(" Admin@Example.com, ,ops@example.com ");
        assert_eq!(emails, vec!["admin@example.com", "ops@example.com"]);

        let config = Config {
            bind_address: String::new(),
            database_url: String::new(),
            jwt_secret: String::new(),
            jwt_expiry_hours: 1,
            frontend_url: String::new(),
            admin_emails: emails,
        };
        assert!(config.is_admin_email("ADMIN@example.com "));
        assert!(!config.is_admin_email("someone@example.com"));
    }
}
