//! Runtime configuration.
//!
//! Every setting is a command line flag that falls back to a `GBP_*`
//! environment variable (a `.env` file is loaded by the binary first).
//! Nothing secret is compiled in.

use crate::walker::WalkOptions;
use clap::Args;
use oauth2::{ClientId, ClientSecret, RedirectUrl, RefreshToken};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Google OAuth authorization endpoint
pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";

/// Google OAuth token endpoint
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Account Management API host
pub const ACCOUNT_MANAGEMENT_URL: &str = "https://mybusinessaccountmanagement.googleapis.com";

/// Business Information API host
pub const BUSINESS_INFORMATION_URL: &str = "https://mybusinessbusinessinformation.googleapis.com";

/// Legacy My Business API host, still the only one serving reviews
pub const MY_BUSINESS_URL: &str = "https://mybusiness.googleapis.com";

/// Scope required to read accounts, locations and reviews
pub const BUSINESS_MANAGE_SCOPE: &str = "https://www.googleapis.com/auth/business.manage";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required setting {flag} (or {env} environment variable)")]
    Missing {
        flag: &'static str,
        env: &'static str,
    },

    #[error("Invalid URL for {flag}: {source}")]
    InvalidUrl {
        flag: &'static str,
        #[source]
        source: url::ParseError,
    },

    #[error("{flag} must be at least 1")]
    Zero { flag: &'static str },
}

/// OAuth client credentials issued by the Google Cloud console.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_id: ClientId,
    pub client_secret: ClientSecret,
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: ClientId::new(client_id.into()),
            client_secret: ClientSecret::new(client_secret.into()),
        }
    }
}

/// Endpoint set used by the token exchange and the resource walker.
///
/// API hosts are stored without a trailing slash; resource paths are
/// appended to them as-is.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub auth_url: String,
    pub token_url: String,
    pub account_management: String,
    pub business_information: String,
    pub my_business: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            auth_url: GOOGLE_AUTH_URL.into(),
            token_url: GOOGLE_TOKEN_URL.into(),
            account_management: ACCOUNT_MANAGEMENT_URL.into(),
            business_information: BUSINESS_INFORMATION_URL.into(),
            my_business: MY_BUSINESS_URL.into(),
        }
    }
}

impl Endpoints {
    /// Points every endpoint at a single host. Used against mock servers.
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            auth_url: format!("{base}/o/oauth2/auth"),
            token_url: format!("{base}/token"),
            account_management: base.into(),
            business_information: base.into(),
            my_business: base.into(),
        }
    }
}

/// Settings shared by all subcommands.
#[derive(Args, Debug, Default)]
pub struct Settings {
    /// OAuth client ID
    #[arg(long, env = "GBP_CLIENT_ID", global = true, hide_env_values = true)]
    pub client_id: Option<String>,

    /// OAuth client secret
    #[arg(long, env = "GBP_CLIENT_SECRET", global = true, hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Refresh token obtained with `login`
    #[arg(long, env = "GBP_REFRESH_TOKEN", global = true, hide_env_values = true)]
    pub refresh_token: Option<String>,

    /// Redirect URI registered for the OAuth client
    #[arg(long, env = "GBP_REDIRECT_URI", global = true)]
    pub redirect_uri: Option<String>,

    /// OAuth scope requested during login
    #[arg(long, env = "GBP_SCOPE", global = true, default_value = BUSINESS_MANAGE_SCOPE)]
    pub scope: String,

    /// Maximum number of reviews printed per location
    #[arg(long, env = "GBP_REVIEWS_PER_LOCATION", global = true, default_value_t = 10)]
    pub reviews_per_location: usize,

    /// Maximum number of API requests in flight
    #[arg(long, env = "GBP_CONCURRENCY", global = true, default_value_t = 4)]
    pub concurrency: usize,

    /// Only walk this location (`locations/<id>` or bare `<id>`)
    #[arg(long, env = "GBP_LOCATION", global = true)]
    pub location: Option<String>,

    /// HTTP request timeout in seconds
    #[arg(long, env = "GBP_TIMEOUT", global = true, default_value_t = 30)]
    pub timeout: u64,

    /// OAuth authorization endpoint
    #[arg(long, env = "GBP_AUTH_URL", global = true, default_value = GOOGLE_AUTH_URL)]
    pub auth_url: String,

    /// OAuth token endpoint
    #[arg(long, env = "GBP_TOKEN_URL", global = true, default_value = GOOGLE_TOKEN_URL)]
    pub token_url: String,

    /// Account Management API host
    #[arg(long, env = "GBP_ACCOUNTS_BASE_URL", global = true, default_value = ACCOUNT_MANAGEMENT_URL)]
    pub accounts_base_url: String,

    /// Business Information API host
    #[arg(long, env = "GBP_LOCATIONS_BASE_URL", global = true, default_value = BUSINESS_INFORMATION_URL)]
    pub locations_base_url: String,

    /// My Business API host (reviews)
    #[arg(long, env = "GBP_REVIEWS_BASE_URL", global = true, default_value = MY_BUSINESS_URL)]
    pub reviews_base_url: String,
}

impl Settings {
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        let client_id = required(&self.client_id, "--client-id", "GBP_CLIENT_ID")?;
        let client_secret = required(&self.client_secret, "--client-secret", "GBP_CLIENT_SECRET")?;
        Ok(Credentials::new(client_id, client_secret))
    }

    pub fn refresh_token(&self) -> Result<RefreshToken, ConfigError> {
        let token = required(&self.refresh_token, "--refresh-token", "GBP_REFRESH_TOKEN")?;
        Ok(RefreshToken::new(token.to_string()))
    }

    pub fn redirect_uri(&self) -> Result<RedirectUrl, ConfigError> {
        let uri = required(&self.redirect_uri, "--redirect-uri", "GBP_REDIRECT_URI")?;
        RedirectUrl::new(uri.to_string()).map_err(|source| ConfigError::InvalidUrl {
            flag: "--redirect-uri",
            source,
        })
    }

    pub fn endpoints(&self) -> Result<Endpoints, ConfigError> {
        Ok(Endpoints {
            auth_url: validated(&self.auth_url, "--auth-url")?,
            token_url: validated(&self.token_url, "--token-url")?,
            account_management: validated(&self.accounts_base_url, "--accounts-base-url")?,
            business_information: validated(&self.locations_base_url, "--locations-base-url")?,
            my_business: validated(&self.reviews_base_url, "--reviews-base-url")?,
        })
    }

    pub fn walk_options(&self) -> Result<WalkOptions, ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Zero {
                flag: "--concurrency",
            });
        }
        Ok(WalkOptions {
            reviews_per_location: self.reviews_per_location,
            concurrency: self.concurrency,
            location_filter: self.location.clone().filter(|l| !l.trim().is_empty()),
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

fn required<'a>(
    value: &'a Option<String>,
    flag: &'static str,
    env: &'static str,
) -> Result<&'a str, ConfigError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing { flag, env })
}

fn validated(value: &str, flag: &'static str) -> Result<String, ConfigError> {
    Url::parse(value).map_err(|source| ConfigError::InvalidUrl { flag, source })?;
    Ok(value.trim_end_matches('/').to_string())
}
