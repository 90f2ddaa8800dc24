use crate::config::{Credentials, Endpoints};
use oauth2::{
    AccessToken, AuthUrl, AuthorizationCode, CsrfToken, RedirectUrl, RefreshToken, Scope,
    basic::BasicClient,
};
use reqwest::{Client, redirect::Policy};
use serde::Deserialize;
use std::{io, time::Duration};
use thiserror::Error;
use tokio::task::spawn_blocking;
use tracing::{debug, info, warn};
use url::Url;

/// Performs the manual authorization code flow and returns the token endpoint answer.
///
/// This function:
/// 1. Prints the consent URL (and tries to open it in a browser)
/// 2. Reads the pasted authorization code (or the whole redirect URL) from stdin
/// 3. Exchanges the code for an access/refresh token pair
///
/// The refresh token in the response is what `reviews` needs later on.
pub async fn login(
    http_client: &Client,
    credentials: &Credentials,
    endpoints: &Endpoints,
    redirect_uri: &RedirectUrl,
    scope: &str,
    open_browser: bool,
) -> Result<TokenResponse, AuthError> {
    let (auth_url, csrf_token) =
        authorization_url(credentials, &endpoints.auth_url, redirect_uri, scope)?;

    eprintln!("Visit this URL in your browser:");
    eprintln!("\n  {}\n", auth_url);

    if open_browser {
        if let Err(e) = open::that(auth_url.as_str()) {
            warn!(error = %e, "failed to open browser");
        }
    }

    eprintln!("After authorization, you'll be redirected to your redirect URI.");
    eprintln!("Paste the 'code' parameter (or the whole redirect URL) here:");

    let line = spawn_blocking(|| {
        let mut line = String::new();
        io::stdin().read_line(&mut line).map(|_| line)
    })
    .await
    .map_err(|e| AuthError::Input(io::Error::other(e)))?
    .map_err(AuthError::Input)?;

    let code = parse_pasted_code(&line, Some(&csrf_token))?;
    exchange_code(
        http_client,
        &endpoints.token_url,
        credentials,
        &code,
        redirect_uri,
    )
    .await
}

/// Builds the consent page URL.
///
/// `access_type=offline` together with `prompt=consent` makes Google hand out a
/// refresh token on every exchange, not only on the first one.
pub fn authorization_url(
    credentials: &Credentials,
    auth_url: &str,
    redirect_uri: &RedirectUrl,
    scope: &str,
) -> Result<(Url, CsrfToken), AuthError> {
    let client = BasicClient::new(credentials.client_id.clone())
        .set_auth_uri(AuthUrl::new(auth_url.to_string())?)
        .set_redirect_uri(redirect_uri.clone());

    let (url, csrf_token) = client
        .authorize_url(CsrfToken::new_random)
        .add_scope(Scope::new(scope.to_string()))
        .add_extra_param("access_type", "offline")
        .add_extra_param("prompt", "consent")
        .url();

    Ok((url, csrf_token))
}

/// Creates an HTTP client configured for OAuth and API calls.
pub fn create_http_client(timeout: Duration) -> Result<Client, AuthError> {
    Ok(Client::builder()
        .redirect(Policy::none()) // Disable redirects to prevent SSRF
        .timeout(timeout)
        .build()?)
}

/// Exchanges a refresh token for a fresh access token.
///
/// Any non-200 answer fails the call; 400/401/403 are reported as
/// authentication errors (see [`AuthError::is_authentication`]).
pub async fn refresh_access_token(
    http_client: &Client,
    token_url: &str,
    credentials: &Credentials,
    refresh_token: &RefreshToken,
) -> Result<AccessToken, AuthError> {
    let response = request_token(
        http_client,
        token_url,
        credentials,
        &Grant::RefreshToken(refresh_token),
    )
    .await?;

    if let Some(expires_in) = response.expires_in {
        info!(expires_in, "access token refreshed");
    }

    response.access_token.ok_or(AuthError::MissingAccessToken)
}

/// Exchanges an authorization code for tokens.
pub async fn exchange_code(
    http_client: &Client,
    token_url: &str,
    credentials: &Credentials,
    code: &AuthorizationCode,
    redirect_uri: &RedirectUrl,
) -> Result<TokenResponse, AuthError> {
    let response = request_token(
        http_client,
        token_url,
        credentials,
        &Grant::AuthorizationCode { code, redirect_uri },
    )
    .await?;

    if response.access_token.is_none() {
        return Err(AuthError::MissingAccessToken);
    }
    Ok(response)
}

/// POSTs a form-encoded grant to the token endpoint.
pub async fn request_token(
    http_client: &Client,
    token_url: &str,
    credentials: &Credentials,
    grant: &Grant<'_>,
) -> Result<TokenResponse, AuthError> {
    let form = grant.form_params(credentials);
    debug!(grant_type = grant.grant_type(), token_url, "requesting token");

    let response = http_client.post(token_url).form(&form).send().await?;

    let status = response.status().as_u16();
    let body = response.text().await?;
    if status != 200 {
        warn!(status, grant_type = grant.grant_type(), "token endpoint rejected the grant");
        return Err(AuthError::from_error_body(status, body));
    }

    serde_json::from_str(&body).map_err(AuthError::InvalidTokenResponse)
}

/// Grant sent to the token endpoint.
#[derive(Debug)]
pub enum Grant<'a> {
    RefreshToken(&'a RefreshToken),
    AuthorizationCode {
        code: &'a AuthorizationCode,
        redirect_uri: &'a RedirectUrl,
    },
}

impl Grant<'_> {
    pub fn grant_type(&self) -> &'static str {
        match self {
            Grant::RefreshToken(_) => "refresh_token",
            Grant::AuthorizationCode { .. } => "authorization_code",
        }
    }

    fn form_params<'a>(&'a self, credentials: &'a Credentials) -> Vec<(&'static str, &'a str)> {
        let mut form = vec![
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.secret().as_str()),
        ];
        match self {
            Grant::RefreshToken(refresh_token) => {
                form.push(("refresh_token", refresh_token.secret().as_str()));
            }
            Grant::AuthorizationCode { code, redirect_uri } => {
                form.push(("code", code.secret().as_str()));
                form.push(("redirect_uri", redirect_uri.as_str()));
            }
        }
        form.push(("grant_type", self.grant_type()));
        form
    }
}

/// Parses what the operator pasted after the consent screen.
///
/// Accepts the bare code, the full redirect URL, or just its path and query.
/// When a URL carrying `state` is pasted and `csrf_token` is given, the two must match.
pub fn parse_pasted_code(
    input: &str,
    csrf_token: Option<&CsrfToken>,
) -> Result<AuthorizationCode, AuthError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(AuthError::MissingCode);
    }

    let parsed_url = match Url::parse(input) {
        Ok(url) => url,
        Err(_) if input.starts_with('/') || input.starts_with('?') => {
            Url::parse(&format!("http://localhost{}", input))?
        }
        Err(_) => return Ok(AuthorizationCode::new(input.to_string())),
    };

    if let Some(code) = extract_query_param(&parsed_url, "code") {
        let state = extract_query_param(&parsed_url, "state");
        if let (Some(state), Some(csrf_token)) = (state, csrf_token) {
            if state != *csrf_token.secret() {
                return Err(AuthError::StateMismatch);
            }
        }
        return Ok(AuthorizationCode::new(code));
    }

    if let Some(error) = extract_query_param(&parsed_url, "error") {
        return Err(AuthError::OAuthServer {
            status: None,
            error,
            description: extract_query_param(&parsed_url, "error_description")
                .unwrap_or_default(),
        });
    }

    Err(AuthError::MissingCode)
}

/// Extracts a query parameter from a URL.
fn extract_query_param(url: &Url, param_name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == param_name)
        .map(|(_, value)| value.into_owned())
}

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Failed to read authorization code: {0}")]
    Input(#[source] io::Error),

    #[error("No authorization code found in the pasted input")]
    MissingCode,

    #[error("State parameter of the pasted URL does not match this login")]
    StateMismatch,

    #[error("OAuth server returned an error: {error} - {description}")]
    OAuthServer {
        status: Option<u16>,
        error: String,
        description: String,
    },

    #[error("Token endpoint returned an error: {status} - {body}")]
    TokenEndpoint { status: u16, body: String },

    #[error("Failed to parse token response: {0}")]
    InvalidTokenResponse(#[source] serde_json::Error),

    #[error("Missing access token in OAuth response")]
    MissingAccessToken,

    #[error("HTTP request failed: {0}")]
    ReqwestRequest(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] oauth2::url::ParseError),
}

impl AuthError {
    fn from_error_body(status: u16, body: String) -> Self {
        match serde_json::from_str::<OAuthErrorBody>(&body) {
            Ok(OAuthErrorBody {
                error,
                error_description,
            }) => AuthError::OAuthServer {
                status: Some(status),
                error,
                description: error_description.unwrap_or_default(),
            },
            Err(_) => AuthError::TokenEndpoint { status, body },
        }
    }

    /// HTTP status returned by the token endpoint, if the error came from there.
    pub fn status(&self) -> Option<u16> {
        match self {
            AuthError::OAuthServer { status, .. } => *status,
            AuthError::TokenEndpoint { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when the provider refused the credentials or the grant.
    pub fn is_authentication(&self) -> bool {
        matches!(self.status(), Some(400 | 401 | 403))
    }
}

/// Token endpoint answer.
///
/// Google returns either the token fields or an `error` pair; both halves are
/// optional here so one type covers both grants.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct TokenResponse {
    #[serde(rename = "access_token")]
    pub access_token: Option<AccessToken>,

    #[serde(rename = "token_type")]
    pub token_type: Option<String>,

    #[serde(rename = "expires_in")]
    pub expires_in: Option<u64>,

    #[serde(rename = "refresh_token")]
    pub refresh_token: Option<RefreshToken>,

    #[serde(rename = "scope")]
    pub scope: Option<String>,

    #[serde(rename = "error")]
    pub error: Option<String>,

    #[serde(rename = "error_description")]
    pub error_description: Option<String>,
}

#[derive(Deserialize)]
struct OAuthErrorBody {
    #[serde(rename = "error")]
    error: String,

    #[serde(rename = "error_description")]
    error_description: Option<String>,
}
