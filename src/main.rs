use clap::{Parser, Subcommand};
use dotenv::dotenv;
use gbp_reviews::{
    Error, auth,
    auth::{AuthError, create_http_client},
    config::Settings,
    print_reviews, report,
};
use std::{
    io::{Write, stdout},
    process,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gbp-reviews", version)]
#[command(about = "Fetch Google Business Profile reviews over OAuth")]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Authorize in the browser and print a refresh token
    Login {
        /// Only print the authorization URL, don't try to open a browser
        #[arg(long)]
        no_browser: bool,
    },

    /// Refresh the access token and print reviews of every location (default)
    Reviews,
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Login { no_browser }) => run_login(&cli.settings, !no_browser).await,
        Some(Commands::Reviews) | None => run_reviews(&cli.settings).await,
    };

    if let Err(e) = result {
        if let Error::Auth(AuthError::OAuthServer {
            error, description, ..
        }) = &e
        {
            eprintln!("Error: {}", error);
            eprintln!("Error Description: {}", description);
        } else {
            eprintln!("Error: {}", e);
        }
        process::exit(1);
    }
}

async fn run_login(settings: &Settings, open_browser: bool) -> Result<(), Error> {
    let credentials = settings.credentials()?;
    let redirect_uri = settings.redirect_uri()?;
    let endpoints = settings.endpoints()?;
    let http_client = create_http_client(settings.timeout())?;

    let response = auth::login(
        &http_client,
        &credentials,
        &endpoints,
        &redirect_uri,
        &settings.scope,
        open_browser,
    )
    .await?;

    let mut out = stdout().lock();
    report::render_token_response(&response, &mut out)?;
    out.flush()?;
    Ok(())
}

async fn run_reviews(settings: &Settings) -> Result<(), Error> {
    let credentials = settings.credentials()?;
    let refresh_token = settings.refresh_token()?;
    let endpoints = settings.endpoints()?;
    let options = settings.walk_options()?;
    let http_client = create_http_client(settings.timeout())?;

    print_reviews(
        &http_client,
        &credentials,
        &endpoints,
        &refresh_token,
        options,
        &mut stdout(),
    )
    .await
}
