//! Mock Google endpoints for integration and e2e tests.
//!
//! One [`MockServer`] plays the token endpoint and all three Business Profile
//! APIs; [`MockGoogle::endpoints()`] points the crate at it.
#![allow(dead_code)]

use gbp_reviews::config::{Credentials, Endpoints};
use serde_json::{Value as JsonValue, json};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_string_contains, header, method, path, query_param},
};

pub const CLIENT_ID: &str = "test-client-id";
pub const CLIENT_SECRET: &str = "test-client-secret";
pub const REFRESH_TOKEN: &str = "1//test-refresh-token";
pub const ACCESS_TOKEN: &str = "ya29.test-access-token";

pub struct MockGoogle {
    pub server: MockServer,
}

impl MockGoogle {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints::with_base(&self.server.uri())
    }

    pub fn credentials() -> Credentials {
        Credentials::new(CLIENT_ID, CLIENT_SECRET)
    }

    /// Token endpoint accepting [`REFRESH_TOKEN`] and issuing [`ACCESS_TOKEN`].
    pub async fn grant_refresh(&self) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains(format!("client_id={CLIENT_ID}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": ACCESS_TOKEN,
                "token_type": "Bearer",
                "expires_in": 3599,
                "scope": "https://www.googleapis.com/auth/business.manage"
            })))
            .mount(&self.server)
            .await;
    }

    /// Token endpoint answering every grant with `status` and `body`.
    pub async fn token_status(&self, status: u16, body: JsonValue) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    pub async fn accounts(&self, accounts: JsonValue) {
        self.list("/v1/accounts", json!({ "accounts": accounts })).await;
    }

    pub async fn locations(&self, account: &str, locations: JsonValue) {
        self.list(
            &format!("/v1/{account}/locations"),
            json!({ "locations": locations }),
        )
        .await;
    }

    pub async fn reviews(&self, account: &str, location: &str, count: usize) {
        self.list(
            &format!("/v4/{account}/{location}/reviews"),
            json!({
                "reviews": reviews(count),
                "averageRating": 4.2,
                "totalReviewCount": count
            }),
        )
        .await;
    }

    /// Authenticated GET on `path` answering `body` with 200.
    pub async fn list(&self, path_str: &str, body: JsonValue) {
        self.respond(path_str, ResponseTemplate::new(200).set_body_json(body))
            .await;
    }

    /// Authenticated GET on `path` answering with the given template.
    pub async fn respond(&self, path_str: &str, template: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(path_str))
            .and(header("authorization", format!("Bearer {ACCESS_TOKEN}")))
            .respond_with(template)
            .mount(&self.server)
            .await;
    }

    /// Second page of `path`, served only when `pageToken` is `token`.
    pub async fn next_page(&self, path_str: &str, token: &str, body: JsonValue) {
        Mock::given(method("GET"))
            .and(path(path_str))
            .and(query_param("pageToken", token))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .with_priority(1)
            .mount(&self.server)
            .await;
    }

    /// Number of requests received whose path starts with `prefix`.
    pub async fn requests_to(&self, prefix: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path().starts_with(prefix))
            .count()
    }
}

pub fn reviews(count: usize) -> JsonValue {
    (1..=count)
        .map(|n| {
            json!({
                "reviewId": format!("r{n}"),
                "reviewer": { "displayName": format!("Reviewer {n}") },
                "starRating": "FIVE",
                "comment": format!("Comment {n}"),
                "createTime": "2024-03-01T10:00:00Z"
            })
        })
        .collect()
}
