// SPDX-License-Identifier: MIT

//! Twitter API v2 fetcher: paginated collection downloads, normalized
//! into the content store's schema

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::db::{CollectionType, ContentItem, UserProfile};
use crate::{Result, VetterError};

const API_BASE: &str = "https://api.twitter.com/2";
const PAGE_SIZE: usize = 100;

/// Twitter API client
pub struct TwitterFetcher {
    client: Client,
    base_url: String,
    bearer_token: String,
}

#[derive(Deserialize)]
struct UserResponse {
    data: Option<ApiUser>,
}

#[derive(Deserialize)]
struct ApiUser {
    id: String,
    username: String,
    name: String,
    description: Option<String>,
    #[serde(default)]
    public_metrics: ApiUserMetrics,
}

#[derive(Deserialize, Default)]
struct ApiUserMetrics {
    #[serde(default)]
    followers_count: i64,
    #[serde(default)]
    following_count: i64,
    #[serde(default)]
    tweet_count: i64,
}

#[derive(Deserialize)]
struct Page {
    #[serde(default)]
    data: Vec<ApiTweet>,
    includes: Option<Includes>,
    meta: Option<Meta>,
}

#[derive(Deserialize)]
struct ApiTweet {
    id: String,
    #[serde(default)]
    text: String,
    created_at: Option<String>,
    author_id: Option<String>,
}

#[derive(Deserialize)]
struct Includes {
    #[serde(default)]
    users: Vec<IncludedUser>,
}

#[derive(Deserialize)]
struct IncludedUser {
    id: String,
    username: String,
}

#[derive(Deserialize)]
struct Meta {
    next_token: Option<String>,
}

impl TwitterFetcher {
    pub fn new(bearer_token: &str) -> Result<Self> {
        Self::with_base_url(bearer_token, API_BASE)
    }

    /// Point the fetcher at a different API root (for testing)
    pub fn with_base_url(bearer_token: &str, base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| VetterError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer_token: bearer_token.to_string(),
        })
    }

    /// Fetch the authenticated user's profile
    pub async fn get_me(&self) -> Result<UserProfile> {
        let url = format!("{}/users/me", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.bearer_token)
            .query(&[("user.fields", "description,public_metrics")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(VetterError::Twitter(format!(
                "Authentication failed ({})",
                response.status()
            )));
        }

        let body: UserResponse = response.json().await?;
        let user = body
            .data
            .ok_or_else(|| VetterError::Twitter("Could not fetch authenticated user".to_string()))?;

        Ok(UserProfile {
            id: user.id,
            username: user.username,
            name: user.name,
            description: user.description,
            followers_count: user.public_metrics.followers_count,
            following_count: user.public_metrics.following_count,
            tweet_count: user.public_metrics.tweet_count,
        })
    }

    /// Fetch a whole collection for a user, page by page.
    ///
    /// Hitting the rate limit ends the fetch with a warning and returns
    /// what was collected so far; anything already fetched is kept.
    pub async fn fetch_all(
        &self,
        user_id: &str,
        collection: CollectionType,
        limit: Option<usize>,
    ) -> Result<Vec<ContentItem>> {
        let endpoint = match collection {
            CollectionType::Post => format!("{}/users/{}/tweets", self.base_url, user_id),
            CollectionType::Like => format!("{}/users/{}/liked_tweets", self.base_url, user_id),
            CollectionType::Bookmark => format!("{}/users/{}/bookmarks", self.base_url, user_id),
        };

        let mut items = Vec::new();
        let mut pagination_token: Option<String> = None;

        loop {
            let mut query: Vec<(&str, String)> = vec![
                ("max_results", PAGE_SIZE.to_string()),
                ("tweet.fields", "created_at,author_id".to_string()),
                ("expansions", "author_id".to_string()),
                ("user.fields", "username".to_string()),
            ];
            if let Some(ref token) = pagination_token {
                query.push(("pagination_token", token.clone()));
            }

            let response = self
                .client
                .get(&endpoint)
                .bearer_auth(&self.bearer_token)
                .query(&query)
                .send()
                .await?;

            match response.status() {
                StatusCode::TOO_MANY_REQUESTS => {
                    warn!("Rate limit hit fetching {}s, stopping fetch", collection);
                    break;
                }
                status if !status.is_success() => {
                    return Err(VetterError::Twitter(format!(
                        "Fetching {}s failed ({})",
                        collection, status
                    )));
                }
                _ => {}
            }

            let page: Page = response.json().await?;
            let handles = author_handles(&page);

            for tweet in &page.data {
                items.push(normalize(tweet, collection, &handles));
            }
            debug!("Fetched {} {}s so far", items.len(), collection);

            if let Some(max) = limit {
                if items.len() >= max {
                    items.truncate(max);
                    break;
                }
            }

            match page.meta.and_then(|m| m.next_token) {
                Some(token) => pagination_token = Some(token),
                None => break,
            }
        }

        info!("Fetched {} {}s", items.len(), collection);
        Ok(items)
    }
}

fn author_handles(page: &Page) -> HashMap<String, String> {
    page.includes
        .as_ref()
        .map(|inc| {
            inc.users
                .iter()
                .map(|u| (u.id.clone(), u.username.clone()))
                .collect()
        })
        .unwrap_or_default()
}

fn normalize(
    tweet: &ApiTweet,
    collection: CollectionType,
    handles: &HashMap<String, String>,
) -> ContentItem {
    // Author handle only matters for content that belongs to other
    // authors; the user's own posts carry none.
    let author_handle = match collection {
        CollectionType::Post => None,
        CollectionType::Like | CollectionType::Bookmark => tweet
            .author_id
            .as_ref()
            .map(|id| handles.get(id).cloned().unwrap_or_else(|| id.clone())),
    };

    ContentItem {
        id: tweet.id.clone(),
        collection,
        text: tweet.text.clone(),
        created_at: tweet.created_at.as_deref().and_then(|s| {
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        }),
        author_handle,
    }
}
