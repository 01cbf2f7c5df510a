//! Client configuration.
//!
//! A [`ClientConfig`] is built once per session and handed to
//! [`Client::new`](crate::Client::new). [`ClientConfig::from_env`] reads the
//! same values from the process environment.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Base URL used when none is configured.
pub const DEFAULT_BASE_URL: &str = "https://app.displayr.com/API";

/// Environment variable holding the base URL.
pub const BASE_URL_ENV: &str = "DATAMART_BASE_URL";
/// Environment variable holding the company secret.
pub const COMPANY_SECRET_ENV: &str = "DATAMART_COMPANY_SECRET";
/// Environment variable holding the project identifier.
pub const PROJECT_ID_ENV: &str = "DATAMART_PROJECT_ID";

/// The credential pair sent with every Data Mart request.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    company_secret: String,
    project_id: String,
}

impl Credentials {
    /// Build a credential pair. Every non-digit character is stripped from
    /// `project_id`, so values such as `"project 1234"` are accepted.
    pub fn new(company_secret: impl Into<String>, project_id: impl AsRef<str>) -> Self {
        Self {
            company_secret: company_secret.into(),
            project_id: project_id
                .as_ref()
                .chars()
                .filter(char::is_ascii_digit)
                .collect(),
        }
    }

    pub fn company_secret(&self) -> &str {
        &self.company_secret
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Both halves are non-empty.
    pub fn is_complete(&self) -> bool {
        !self.company_secret.is_empty() && !self.project_id.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secret = if self.company_secret.is_empty() {
            ""
        } else {
            "<redacted>"
        };
        f.debug_struct("Credentials")
            .field("company_secret", &secret)
            .field("project_id", &self.project_id)
            .finish()
    }
}

/// Configuration for the Data Mart client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// The API root (e.g., `https://app.displayr.com/API`). `/DataMart` is
    /// appended to it for every request.
    pub base_url: String,
    /// Credentials attached to every request.
    pub credentials: Credentials,
    /// Directory for temporary files. `None` uses the OS default.
    pub temp_dir: Option<PathBuf>,
    /// Per-request timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            credentials: Credentials::default(),
            temp_dir: None,
            timeout: None,
        }
    }
}

impl ClientConfig {
    pub fn new(
        base_url: impl Into<String>,
        company_secret: impl Into<String>,
        project_id: impl AsRef<str>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            credentials: Credentials::new(company_secret, project_id),
            ..Default::default()
        }
    }

    /// Read the configuration from the environment. Unset credentials
    /// become empty strings; an unset base URL falls back to
    /// [`DEFAULT_BASE_URL`].
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let base_url = lookup(BASE_URL_ENV)
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            base_url,
            credentials: Credentials::new(
                lookup(COMPANY_SECRET_ENV).unwrap_or_default(),
                lookup(PROJECT_ID_ENV).unwrap_or_default(),
            ),
            ..Default::default()
        }
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
