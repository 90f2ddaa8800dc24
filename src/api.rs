//! Typed access to the three Business Profile resources a review walk needs.

use crate::config::Endpoints;
use oauth2::AccessToken;
use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};
use std::{collections::HashSet, fmt};
use thiserror::Error;
use tracing::{debug, warn};

/// Field mask requested for locations; everything else is unused.
const LOCATION_READ_MASK: &str = "name,title";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Accounts,
    Locations,
    Reviews,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Resource::Accounts => "accounts",
            Resource::Locations => "locations",
            Resource::Reviews => "reviews",
        })
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Error fetching {resource}: {status} - {body}")]
    Status {
        resource: Resource,
        status: u16,
        body: String,
    },

    #[error("HTTP request for {resource} failed: {source}")]
    Transport {
        resource: Resource,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to parse {resource} response: {source}")]
    Decode {
        resource: Resource,
        #[source]
        source: serde_json::Error,
    },
}

// =============================================================================
// Resources
// =============================================================================

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Resource name, e.g. `accounts/123`
    pub name: String,
    pub account_name: Option<String>,
}

impl Account {
    pub fn display_name(&self) -> &str {
        self.account_name.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Location {
    /// Resource name, e.g. `locations/456`
    pub name: String,
    pub title: Option<String>,
}

impl Location {
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("Unnamed Location")
    }

    /// Matches `locations/<id>` as well as the bare `<id>`.
    pub fn matches(&self, filter: &str) -> bool {
        let filter = filter.trim();
        self.name == filter
            || self
                .name
                .strip_suffix(filter)
                .is_some_and(|prefix| prefix.ends_with('/'))
    }
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub reviewer: Option<Reviewer>,
    /// `ONE` .. `FIVE`, or `STAR_RATING_UNSPECIFIED`
    pub star_rating: Option<String>,
    pub comment: Option<String>,
    pub create_time: Option<String>,
    pub review_reply: Option<ReviewReply>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Reviewer {
    pub display_name: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReviewReply {
    pub comment: Option<String>,
}

impl Review {
    pub fn reviewer_name(&self) -> &str {
        self.reviewer
            .as_ref()
            .and_then(|r| r.display_name.as_deref())
            .unwrap_or("Anonymous")
    }

    pub fn rating(&self) -> &str {
        self.star_rating.as_deref().unwrap_or("No rating")
    }

    pub fn comment_text(&self) -> &str {
        self.comment.as_deref().unwrap_or("No comment")
    }

    pub fn created(&self) -> &str {
        self.create_time.as_deref().unwrap_or("Unknown date")
    }
}

/// Reviews of a location plus the aggregates Google reports with them.
///
/// `reviews` may hold fewer entries than the location has; see
/// [`ReviewList::total`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewList {
    pub reviews: Vec<Review>,
    pub average_rating: Option<f64>,
    pub total_review_count: Option<u64>,
}

impl ReviewList {
    /// Number of reviews the location has, falling back to the fetched ones.
    pub fn total(&self) -> u64 {
        self.total_review_count
            .unwrap_or(self.reviews.len() as u64)
    }
}

// =============================================================================
// Pages
// =============================================================================

/// One page of a list call. A missing list key means an empty page.
trait Page: DeserializeOwned {
    type Item;

    fn next_page_token(&self) -> Option<&str>;

    fn take_items(&mut self) -> Vec<Self::Item>;
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct AccountsPage {
    #[serde(default)]
    accounts: Vec<Account>,
    next_page_token: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct LocationsPage {
    #[serde(default)]
    locations: Vec<Location>,
    next_page_token: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ReviewsPage {
    #[serde(default)]
    reviews: Vec<Review>,
    average_rating: Option<f64>,
    total_review_count: Option<u64>,
    next_page_token: Option<String>,
}

impl Page for AccountsPage {
    type Item = Account;

    fn next_page_token(&self) -> Option<&str> {
        self.next_page_token.as_deref()
    }

    fn take_items(&mut self) -> Vec<Account> {
        std::mem::take(&mut self.accounts)
    }
}

impl Page for LocationsPage {
    type Item = Location;

    fn next_page_token(&self) -> Option<&str> {
        self.next_page_token.as_deref()
    }

    fn take_items(&mut self) -> Vec<Location> {
        std::mem::take(&mut self.locations)
    }
}

impl Page for ReviewsPage {
    type Item = Review;

    fn next_page_token(&self) -> Option<&str> {
        self.next_page_token.as_deref()
    }

    fn take_items(&mut self) -> Vec<Review> {
        std::mem::take(&mut self.reviews)
    }
}

// =============================================================================
// Client
// =============================================================================

/// Bearer-authenticated client for accounts, locations and reviews.
#[derive(Debug, Clone)]
pub struct BusinessProfileClient {
    http_client: Client,
    endpoints: Endpoints,
    access_token: AccessToken,
}

impl BusinessProfileClient {
    pub fn new(http_client: Client, endpoints: Endpoints, access_token: AccessToken) -> Self {
        Self {
            http_client,
            endpoints,
            access_token,
        }
    }

    /// Lists every account the token's user can manage.
    pub async fn list_accounts(&self) -> Result<Vec<Account>, ApiError> {
        let url = format!("{}/v1/accounts", self.endpoints.account_management);
        self.collect::<AccountsPage>(Resource::Accounts, &url, &[], None)
            .await
            .map(|(accounts, _)| accounts)
    }

    /// Lists the locations of `account`, fetching only `name` and `title`.
    pub async fn list_locations(&self, account: &Account) -> Result<Vec<Location>, ApiError> {
        let url = format!(
            "{}/v1/{}/locations",
            self.endpoints.business_information, account.name
        );
        self.collect::<LocationsPage>(
            Resource::Locations,
            &url,
            &[("read_mask", LOCATION_READ_MASK)],
            None,
        )
        .await
        .map(|(locations, _)| locations)
    }

    /// Lists reviews of `location`, stopping at the first page that brings
    /// the count to `wanted`.
    pub async fn list_reviews(
        &self,
        account: &Account,
        location: &Location,
        wanted: usize,
    ) -> Result<ReviewList, ApiError> {
        let url = format!(
            "{}/v4/{}/{}/reviews",
            self.endpoints.my_business, account.name, location.name
        );
        let (reviews, first_page) = self
            .collect::<ReviewsPage>(Resource::Reviews, &url, &[], Some(wanted))
            .await?;

        let (average_rating, total_review_count) = first_page
            .map(|p| (p.average_rating, p.total_review_count))
            .unwrap_or_default();

        Ok(ReviewList {
            reviews,
            average_rating,
            total_review_count,
        })
    }

    /// Follows `nextPageToken` until the server stops returning one, a token
    /// comes back a second time, or `limit` items are in hand.
    ///
    /// Returns the concatenated items and the first page's envelope with its
    /// items taken out (aggregates live there).
    async fn collect<P: Page>(
        &self,
        resource: Resource,
        url: &str,
        query: &[(&str, &str)],
        limit: Option<usize>,
    ) -> Result<(Vec<P::Item>, Option<P>), ApiError> {
        let mut items = Vec::new();
        let mut first_page = None;
        let mut page_token: Option<String> = None;
        let mut seen_tokens = HashSet::new();

        loop {
            let mut page: P = self
                .get_page(resource, url, query, page_token.as_deref())
                .await?;

            let next = page
                .next_page_token()
                .filter(|t| !t.is_empty())
                .map(str::to_string);

            items.extend(page.take_items());
            if first_page.is_none() {
                first_page = Some(page);
            }

            if limit.is_some_and(|limit| items.len() >= limit) {
                break;
            }
            match next {
                Some(next) if seen_tokens.insert(next.clone()) => page_token = Some(next),
                Some(next) => {
                    warn!(%resource, url, page_token = %next, "page token repeated, stopping");
                    break;
                }
                None => break,
            }
        }

        debug!(%resource, url, count = items.len(), "list complete");
        Ok((items, first_page))
    }

    async fn get_page<P: DeserializeOwned>(
        &self,
        resource: Resource,
        url: &str,
        query: &[(&str, &str)],
        page_token: Option<&str>,
    ) -> Result<P, ApiError> {
        let mut request = self
            .http_client
            .get(url)
            .bearer_auth(self.access_token.secret())
            .query(query);
        if let Some(page_token) = page_token {
            request = request.query(&[("pageToken", page_token)]);
        }

        let response = request
            .send()
            .await
            .map_err(|source| ApiError::Transport { resource, source })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| ApiError::Transport { resource, source })?;

        if !status.is_success() {
            warn!(%resource, status = status.as_u16(), "fetch failed");
            return Err(ApiError::Status {
                resource,
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|source| ApiError::Decode { resource, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_list_key_is_an_empty_page() {
        let mut page: AccountsPage = serde_json::from_str("{}").unwrap();
        assert!(page.take_items().is_empty());
        assert_eq!(page.next_page_token(), None);
    }

    #[test]
    fn reviews_page_carries_aggregates() {
        let json = r#"{
            "reviews": [{
                "name": "accounts/1/locations/2/reviews/r1",
                "reviewId": "r1",
                "reviewer": {"displayName": "Jane", "isAnonymous": false},
                "starRating": "FIVE",
                "comment": "Great coffee",
                "createTime": "2024-03-01T10:00:00Z",
                "reviewReply": {"comment": "Thanks!", "updateTime": "2024-03-02T08:00:00Z"}
            }],
            "averageRating": 4.5,
            "totalReviewCount": 42,
            "nextPageToken": "abc"
        }"#;
        let mut page: ReviewsPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.average_rating, Some(4.5));
        assert_eq!(page.total_review_count, Some(42));
        assert_eq!(page.next_page_token(), Some("abc"));

        let reviews = page.take_items();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].reviewer_name(), "Jane");
        assert_eq!(reviews[0].rating(), "FIVE");
        assert_eq!(
            reviews[0].review_reply.as_ref().and_then(|r| r.comment.as_deref()),
            Some("Thanks!")
        );
    }

    #[test]
    fn review_fallbacks() {
        let review: Review = serde_json::from_str(r#"{"reviewer": {}}"#).unwrap();
        assert_eq!(review.reviewer_name(), "Anonymous");
        assert_eq!(review.rating(), "No rating");
        assert_eq!(review.comment_text(), "No comment");
        assert_eq!(review.created(), "Unknown date");
    }

    #[test]
    fn review_total_prefers_the_reported_count() {
        let list = ReviewList {
            reviews: vec![Review::default(); 3],
            total_review_count: Some(57),
            ..Default::default()
        };
        assert_eq!(list.total(), 57);

        let list = ReviewList {
            total_review_count: None,
            ..list
        };
        assert_eq!(list.total(), 3);
    }

    #[test]
    fn account_and_location_fallbacks() {
        let account: Account = serde_json::from_str(r#"{"name": "accounts/1"}"#).unwrap();
        assert_eq!(account.display_name(), "accounts/1");

        let location: Location = serde_json::from_str(r#"{"name": "locations/2"}"#).unwrap();
        assert_eq!(location.display_title(), "Unnamed Location");
    }

    #[test]
    fn location_filter_matching() {
        let location = Location {
            name: "locations/12345".into(),
            title: None,
        };
        assert!(location.matches("locations/12345"));
        assert!(location.matches("12345"));
        assert!(!location.matches("2345"));
        assert!(!location.matches("locations/1"));
    }
}
