use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::config::DatabaseConfig;
use crate::error::{Result, VigilError};

/// Database connection details handed to a peer when waking it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbConnInfo {
    /// Connection URL without credentials.
    pub url: String,
    pub host: String,
    pub port: Option<u16>,
    pub db_name: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl DbConnInfo {
    /// Derive connection info from a database URL.
    pub fn from_url(raw: &str) -> Result<Self> {
        let mut url = Url::parse(raw)
            .map_err(|e| VigilError::Config(format!("Invalid database URL: {}", e)))?;

        let host = url
            .host_str()
            .ok_or_else(|| VigilError::Config("Database URL has no host".into()))?
            .to_string();
        let port = url.port();
        let db_name = url.path().trim_start_matches('/').to_string();
        let username = url.username().to_string();
        let password = url.password().map(str::to_string);

        // Credentials travel in their own fields.
        url.set_username("")
            .and_then(|()| url.set_password(None))
            .map_err(|()| {
                VigilError::Config("Cannot strip credentials from database URL".into())
            })?;

        Ok(Self {
            url: url.to_string(),
            host,
            port,
            db_name,
            username,
            password,
        })
    }

    /// Derive connection info from the database configuration.
    pub fn from_config(config: &DatabaseConfig) -> Result<Self> {
        Self::from_url(&config.url)
    }
}

/// Source of the connection info sent with every wake request.
pub trait DbConnInfoProvider: Send + Sync {
    fn db_conn_info(&self) -> DbConnInfo;
}

impl DbConnInfoProvider for DbConnInfo {
    fn db_conn_info(&self) -> DbConnInfo {
        self.clone()
    }
}
