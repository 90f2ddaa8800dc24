//! Plain-text rendering of a walk and of a token exchange.

use crate::{
    api::{Resource, Review, ReviewList},
    auth::TokenResponse,
    walker::{AccountReport, Fetch, LocationReport, Report},
};
use std::io::{self, Write};

pub fn render(report: &Report, out: &mut impl Write) -> io::Result<()> {
    render_accounts_header(&report.accounts.as_ref().map(Vec::len), out)?;

    if let Fetch::Loaded(accounts) = &report.accounts {
        for (i, account) in accounts.iter().enumerate() {
            render_account(out, i + 1, account, report.reviews_per_location)?;
        }
    }
    Ok(())
}

/// Prints the accounts banner followed by the count, the empty line or the failure.
pub fn render_accounts_header(accounts: &Fetch<usize>, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "--- ACCOUNTS ---")?;
    match accounts {
        Fetch::Failed { status, body } => render_failure(out, Resource::Accounts, *status, body),
        Fetch::Loaded(0) => writeln!(out, "No accounts found."),
        Fetch::Loaded(count) => writeln!(out, "Found {} accounts:", count),
    }
}

/// Prints one account subtree; `position` is 1-based.
pub fn render_account(
    out: &mut impl Write,
    position: usize,
    report: &AccountReport,
    reviews_per_location: usize,
) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "Account {}: {}", position, report.account.display_name())?;
    writeln!(out, "Account ID: {}", report.account.name)?;

    match &report.locations {
        Fetch::Failed { status, body } => render_failure(out, Resource::Locations, *status, body),
        Fetch::Loaded(locations) if locations.is_empty() => writeln!(out, "No locations found."),
        Fetch::Loaded(locations) => {
            writeln!(out, "Found {} locations:", locations.len())?;
            for (j, location) in locations.iter().enumerate() {
                render_location(out, j + 1, location, reviews_per_location)?;
            }
            Ok(())
        }
    }
}

fn render_location(
    out: &mut impl Write,
    position: usize,
    report: &LocationReport,
    reviews_per_location: usize,
) -> io::Result<()> {
    let title = report.location.display_title();
    writeln!(out)?;
    writeln!(out, "Location {}: {}", position, title)?;
    writeln!(out, "Location ID: {}", report.location.name)?;
    writeln!(out)?;
    writeln!(out, "--- REVIEWS FOR {} ---", title)?;

    match &report.reviews {
        Fetch::Failed { status, body } => render_failure(out, Resource::Reviews, *status, body),
        Fetch::Loaded(list) if list.reviews.is_empty() => writeln!(out, "No reviews found."),
        Fetch::Loaded(list) => render_reviews(out, list, reviews_per_location),
    }
}

fn render_reviews(out: &mut impl Write, list: &ReviewList, limit: usize) -> io::Result<()> {
    writeln!(out, "Found {} reviews:", list.total())?;
    if let Some(average) = list.average_rating {
        writeln!(out, "Average rating: {average:.1}")?;
    }

    for (k, review) in list.reviews.iter().take(limit).enumerate() {
        render_review(out, k + 1, review)?;
    }
    Ok(())
}

fn render_review(out: &mut impl Write, position: usize, review: &Review) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "Review {}:", position)?;
    writeln!(out, "Reviewer: {}", review.reviewer_name())?;
    writeln!(out, "Rating: {}", review.rating())?;
    writeln!(out, "Date: {}", review.created())?;
    writeln!(out, "Comment: {}", review.comment_text())?;
    if let Some(reply) = review.review_reply.as_ref().and_then(|r| r.comment.as_deref()) {
        writeln!(out, "Reply: {}", reply)?;
    }
    Ok(())
}

fn render_failure(
    out: &mut impl Write,
    resource: Resource,
    status: u16,
    body: &str,
) -> io::Result<()> {
    writeln!(out, "Error fetching {}: {}", resource, status)?;
    writeln!(out, "Response: {}", body)?;
    writeln!(out, "No {resource} found or error fetching {resource}.")
}

/// Prints what `login` obtained. The access token itself is never printed.
pub fn render_token_response(response: &TokenResponse, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "Token Type: {}", response.token_type.as_deref().unwrap_or("unknown"))?;
    if let Some(expires_in) = response.expires_in {
        writeln!(out, "Expires In: {} seconds", expires_in)?;
    }
    if let Some(scope) = &response.scope {
        writeln!(out, "Scope: {}", scope)?;
    }

    match &response.refresh_token {
        Some(refresh_token) => {
            writeln!(out)?;
            writeln!(out, "Refresh Token: {}", refresh_token.secret())?;
            writeln!(out)?;
            writeln!(
                out,
                "Save this refresh token (e.g. as GBP_REFRESH_TOKEN). It generates new access tokens without user interaction."
            )
        }
        None => {
            writeln!(out)?;
            writeln!(
                out,
                "No refresh token received. Make sure to include 'access_type=offline' in the authorization URL."
            )
        }
    }
}
