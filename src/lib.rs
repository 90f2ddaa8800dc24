pub mod api;
pub mod auth;
pub mod config;
pub mod report;
pub mod walker;

use api::{ApiError, BusinessProfileClient};
use auth::AuthError;
use config::{ConfigError, Credentials, Endpoints};
use futures_util::TryStreamExt;
use oauth2::RefreshToken;
use reqwest::Client;
use std::{io::Write, pin::pin};
use thiserror::Error;
use walker::{Report, WalkOptions, Walker};

pub use walker::Fetch;

/// Any error that ends a run.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Refreshes the access token and walks every account the user can see.
///
/// Fails only when the token cannot be refreshed or a request cannot be
/// completed at all; HTTP errors on individual resources end up in the
/// [`Report`].
pub async fn fetch_reviews(
    http_client: &Client,
    credentials: &Credentials,
    endpoints: &Endpoints,
    refresh_token: &RefreshToken,
    options: WalkOptions,
) -> Result<Report, Error> {
    let client = connect(http_client, credentials, endpoints, refresh_token).await?;
    Ok(Walker::new(&client, options).walk().await?)
}

/// Refreshes the access token and prints the walk to `out` as it goes.
///
/// Each account is written and flushed once its locations and reviews are
/// fetched, so accounts finished before a fatal error stay in the output.
pub async fn print_reviews(
    http_client: &Client,
    credentials: &Credentials,
    endpoints: &Endpoints,
    refresh_token: &RefreshToken,
    options: WalkOptions,
    out: &mut impl Write,
) -> Result<(), Error> {
    let client = connect(http_client, credentials, endpoints, refresh_token).await?;
    let reviews_per_location = options.reviews_per_location;
    let walker = Walker::new(&client, options);

    let accounts = walker.accounts().await?;
    report::render_accounts_header(&accounts.as_ref().map(Vec::len), out)?;
    out.flush()?;
    let Fetch::Loaded(accounts) = accounts else {
        return Ok(());
    };

    let mut reports = pin!(walker.account_reports(&accounts));
    let mut position = 1;
    while let Some(account) = reports.try_next().await? {
        report::render_account(out, position, &account, reviews_per_location)?;
        out.flush()?;
        position += 1;
    }
    Ok(())
}

async fn connect(
    http_client: &Client,
    credentials: &Credentials,
    endpoints: &Endpoints,
    refresh_token: &RefreshToken,
) -> Result<BusinessProfileClient, AuthError> {
    let access_token = auth::refresh_access_token(
        http_client,
        &endpoints.token_url,
        credentials,
        refresh_token,
    )
    .await?;
    Ok(BusinessProfileClient::new(
        http_client.clone(),
        endpoints.clone(),
        access_token,
    ))
}
