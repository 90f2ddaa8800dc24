//! Walks accounts → locations → reviews and collects the outcome of every fetch.
//!
//! A non-2xx answer at any level is recorded as [`Fetch::Failed`] and only stops
//! that branch. Transport and decoding errors abort the whole walk.
//!
//! Accounts are yielded one by one, in API order, as soon as their whole
//! subtree is fetched, so a caller can print them before later accounts finish.

use crate::api::{Account, ApiError, BusinessProfileClient, Location, ReviewList};
use futures_util::{Stream, StreamExt, TryStreamExt, stream};
use tokio::sync::Semaphore;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkOptions {
    /// Upper bound of reviews rendered per location
    pub reviews_per_location: usize,
    /// Maximum number of requests in flight
    pub concurrency: usize,
    /// Restricts the walk to one location
    pub location_filter: Option<String>,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            reviews_per_location: 10,
            concurrency: 4,
            location_filter: None,
        }
    }
}

/// Outcome of a single list call.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetch<T> {
    Loaded(T),
    Failed { status: u16, body: String },
}

impl<T> Fetch<T> {
    pub fn loaded(&self) -> Option<&T> {
        match self {
            Fetch::Loaded(value) => Some(value),
            Fetch::Failed { .. } => None,
        }
    }

    pub fn as_ref(&self) -> Fetch<&T> {
        match self {
            Fetch::Loaded(value) => Fetch::Loaded(value),
            Fetch::Failed { status, body } => Fetch::Failed {
                status: *status,
                body: body.clone(),
            },
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetch<U> {
        match self {
            Fetch::Loaded(value) => Fetch::Loaded(f(value)),
            Fetch::Failed { status, body } => Fetch::Failed { status, body },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub accounts: Fetch<Vec<AccountReport>>,
    pub reviews_per_location: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccountReport {
    pub account: Account,
    pub locations: Fetch<Vec<LocationReport>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocationReport {
    pub location: Location,
    pub reviews: Fetch<ReviewList>,
}

pub struct Walker<'a> {
    client: &'a BusinessProfileClient,
    options: WalkOptions,
    /// Shared by every level, bounds the requests in flight
    permits: Semaphore,
}

impl<'a> Walker<'a> {
    pub fn new(client: &'a BusinessProfileClient, options: WalkOptions) -> Self {
        let permits = Semaphore::new(options.concurrency.max(1));
        Self {
            client,
            options,
            permits,
        }
    }

    /// Fetches the whole hierarchy before returning.
    pub async fn walk(&self) -> Result<Report, ApiError> {
        let reviews_per_location = self.options.reviews_per_location;

        let accounts = match self.accounts().await? {
            Fetch::Loaded(accounts) => accounts,
            Fetch::Failed { status, body } => {
                return Ok(Report {
                    accounts: Fetch::Failed { status, body },
                    reviews_per_location,
                });
            }
        };

        let reports = self.account_reports(&accounts).try_collect().await?;
        Ok(Report {
            accounts: Fetch::Loaded(reports),
            reviews_per_location,
        })
    }

    /// Lists the accounts the walk starts from.
    pub async fn accounts(&self) -> Result<Fetch<Vec<Account>>, ApiError> {
        let accounts = self.limited(self.client.list_accounts()).await?;
        if let Fetch::Loaded(accounts) = &accounts {
            info!(count = accounts.len(), "accounts fetched");
        }
        Ok(accounts)
    }

    /// Walks the locations and reviews of every account.
    ///
    /// Items come out in the order of `accounts`; the first transport or
    /// decoding error ends the stream.
    pub fn account_reports<'s>(
        &'s self,
        accounts: &'s [Account],
    ) -> impl Stream<Item = Result<AccountReport, ApiError>> + 's {
        stream::iter(accounts)
            .map(move |account| self.walk_account(account))
            .buffered(self.concurrency())
    }

    async fn walk_account(&self, account: &Account) -> Result<AccountReport, ApiError> {
        let locations = match self.limited(self.client.list_locations(account)).await? {
            Fetch::Loaded(locations) => self.filter_locations(locations),
            Fetch::Failed { status, body } => {
                return Ok(AccountReport {
                    account: account.clone(),
                    locations: Fetch::Failed { status, body },
                });
            }
        };
        info!(account = %account.name, count = locations.len(), "locations fetched");

        let limit = self.options.reviews_per_location;
        let reviews: Vec<Fetch<ReviewList>> = stream::iter(&locations)
            .map(|location| self.limited(self.client.list_reviews(account, location, limit)))
            .buffered(self.concurrency())
            .try_collect()
            .await?;

        let locations = locations
            .into_iter()
            .zip(reviews)
            .map(|(location, reviews)| LocationReport { location, reviews })
            .collect();

        Ok(AccountReport {
            account: account.clone(),
            locations: Fetch::Loaded(locations),
        })
    }

    /// Runs `request` once a permit is free and settles its outcome.
    async fn limited<T>(
        &self,
        request: impl Future<Output = Result<T, ApiError>>,
    ) -> Result<Fetch<T>, ApiError> {
        // The semaphore is never closed, so acquiring only waits
        let _permit = self.permits.acquire().await.ok();
        settle(request.await)
    }

    fn concurrency(&self) -> usize {
        self.options.concurrency.max(1)
    }

    fn filter_locations(&self, mut locations: Vec<Location>) -> Vec<Location> {
        if let Some(filter) = &self.options.location_filter {
            locations.retain(|location| location.matches(filter));
        }
        locations
    }
}

/// Turns an HTTP status failure into a recorded outcome; other errors pass through.
fn settle<T>(result: Result<T, ApiError>) -> Result<Fetch<T>, ApiError> {
    match result {
        Ok(value) => Ok(Fetch::Loaded(value)),
        Err(ApiError::Status { status, body, .. }) => Ok(Fetch::Failed { status, body }),
        Err(e) => Err(e),
    }
}
