use std::time::Duration;

use anyhow::{bail, Result};
use reqwest::blocking::{Client as HttpClient, Response};
use reqwest::header::USER_AGENT;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub likes: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostDraft {
    pub title: String,
    pub content: String,
    pub author: String,
    pub date: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Title,
    Content,
    Author,
    Date,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Title => "title",
            SortKey::Content => "content",
            SortKey::Author => "author",
            SortKey::Date => "date",
        }
    }

    pub fn next(self) -> Self {
        match self {
            SortKey::Title => SortKey::Content,
            SortKey::Content => SortKey::Author,
            SortKey::Author => SortKey::Date,
            SortKey::Date => SortKey::Title,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "ascending",
            SortDirection::Descending => "descending",
        }
    }

    pub fn flip(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    // Empty keeps the server's own order.
    pub sort_by: String,
    pub direction: String,
}

impl ListOptions {
    pub fn sorted(key: SortKey, direction: SortDirection) -> Self {
        Self {
            sort_by: key.as_str().to_string(),
            direction: direction.as_str().to_string(),
        }
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        if self.sort_by.is_empty() {
            return Vec::new();
        }
        vec![
            ("sort", self.sort_by.clone()),
            ("direction", self.direction.clone()),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub title: String,
    pub content: String,
    pub author: String,
    pub date: String,
}

impl SearchQuery {
    fn params(&self) -> Vec<(&'static str, String)> {
        [
            ("title", &self.title),
            ("content", &self.content),
            ("author", &self.author),
            ("date", &self.date),
        ]
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| (key, value.clone()))
        .collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("api base url is not set")]
    MissingBaseUrl,
    #[error("invalid api base url {url:?}: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server responded {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

pub fn endpoint(
    base_url: &str,
    path: &str,
    params: &[(&'static str, String)],
) -> Result<Url, ApiError> {
    let base = base_url.trim();
    if base.is_empty() {
        return Err(ApiError::MissingBaseUrl);
    }
    let raw = format!("{}{}", base.trim_end_matches('/'), path);
    let mut url = Url::parse(&raw).map_err(|source| ApiError::InvalidBaseUrl {
        url: base.to_string(),
        source,
    })?;
    if !params.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in params {
            pairs.append_pair(key, value);
        }
    }
    Ok(url)
}

pub fn list_url(base_url: &str, opts: &ListOptions) -> Result<Url, ApiError> {
    endpoint(base_url, "/posts", &opts.params())
}

pub fn search_url(base_url: &str, query: &SearchQuery) -> Result<Url, ApiError> {
    endpoint(base_url, "/posts/search", &query.params())
}

pub fn post_url(base_url: &str, id: i64) -> Result<Url, ApiError> {
    endpoint(base_url, &format!("/posts/{id}"), &[])
}

pub fn like_url(base_url: &str, id: i64) -> Result<Url, ApiError> {
    endpoint(base_url, &format!("/posts/{id}/like"), &[])
}

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub user_agent: String,
    pub timeout: Option<Duration>,
}

pub struct Client {
    http: HttpClient,
    user_agent: String,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            bail!("post api client user agent required");
        }

        let http = HttpClient::builder().timeout(config.timeout).build()?;

        Ok(Client {
            http,
            user_agent: config.user_agent,
        })
    }

    pub fn list_posts(&self, base_url: &str, opts: &ListOptions) -> Result<Vec<Post>, ApiError> {
        let url = list_url(base_url, opts)?;
        self.fetch_posts(url)
    }

    pub fn search_posts(
        &self,
        base_url: &str,
        query: &SearchQuery,
    ) -> Result<Vec<Post>, ApiError> {
        let url = search_url(base_url, query)?;
        self.fetch_posts(url)
    }

    pub fn create_post(&self, base_url: &str, draft: &PostDraft) -> Result<Post, ApiError> {
        let url = list_url(base_url, &ListOptions::default())?;
        let resp = self.request(Method::POST, url, Some(draft))?;
        decode(resp)
    }

    pub fn update_post(
        &self,
        base_url: &str,
        id: i64,
        draft: &PostDraft,
    ) -> Result<Post, ApiError> {
        let url = post_url(base_url, id)?;
        let resp = self.request(Method::PUT, url, Some(draft))?;
        decode(resp)
    }

    pub fn delete_post(&self, base_url: &str, id: i64) -> Result<(), ApiError> {
        let url = post_url(base_url, id)?;
        let resp = self.request(Method::DELETE, url, None)?;
        tracing::debug!(post_id = id, status = %resp.status(), "delete answered");
        Ok(())
    }

    pub fn like_post(&self, base_url: &str, id: i64) -> Result<Post, ApiError> {
        let url = like_url(base_url, id)?;
        let resp = self.request(Method::POST, url, None)?;
        decode(resp)
    }

    fn fetch_posts(&self, url: Url) -> Result<Vec<Post>, ApiError> {
        let resp = self.request(Method::GET, url, None)?;
        // The server reports an empty store as 404 with an error object.
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        decode(resp)
    }

    fn request(
        &self,
        method: Method,
        url: Url,
        body: Option<&PostDraft>,
    ) -> Result<Response, ApiError> {
        tracing::debug!(%method, %url, "sending request");
        let mut req = self
            .http
            .request(method, url)
            .header(USER_AGENT, &self.user_agent);
        if let Some(draft) = body {
            req = req.json(draft);
        }
        Ok(req.send()?)
    }
}

fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
    let status = resp.status();
    let body = resp.text()?;
    if !status.is_success() {
        return Err(ApiError::Status { status, body });
    }
    Ok(serde_json::from_str(&body)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://localhost:5002/api";

    #[test]
    fn list_without_sort_has_no_query() {
        let url = list_url(BASE, &ListOptions::default()).unwrap();
        assert_eq!(url.as_str(), "http://localhost:5002/api/posts");
        assert_eq!(url.query(), None);
    }

    #[test]
    fn list_with_sort_appends_both_params() {
        let opts = ListOptions {
            sort_by: "title".into(),
            direction: "asc".into(),
        };
        let url = list_url(BASE, &opts).unwrap();
        assert_eq!(url.path(), "/api/posts");
        assert_eq!(url.query(), Some("sort=title&direction=asc"));
    }

    #[test]
    fn sorted_options_use_server_vocabulary() {
        let opts = ListOptions::sorted(SortKey::Date, SortDirection::Descending);
        let url = list_url(BASE, &opts).unwrap();
        assert_eq!(url.query(), Some("sort=date&direction=descending"));
    }

    #[test]
    fn search_keeps_only_filled_fields() {
        let query = SearchQuery {
            author: "Jane".into(),
            ..Default::default()
        };
        let url = search_url(BASE, &query).unwrap();
        assert_eq!(url.path(), "/api/posts/search");
        assert_eq!(url.query(), Some("author=Jane"));
    }

    #[test]
    fn search_without_filters_has_no_query() {
        let url = search_url(BASE, &SearchQuery::default()).unwrap();
        assert_eq!(url.as_str(), "http://localhost:5002/api/posts/search");
    }

    #[test]
    fn search_params_keep_field_order_and_encode_values() {
        let query = SearchQuery {
            title: "rust tips".into(),
            date: "2024-01-31".into(),
            content: "a&b".into(),
            author: String::new(),
        };
        let url = search_url(BASE, &query).unwrap();
        assert_eq!(
            url.query(),
            Some("title=rust+tips&content=a%26b&date=2024-01-31")
        );
    }

    #[test]
    fn trailing_slash_on_base_is_ignored() {
        let url = post_url("http://localhost:5002/api/", 7).unwrap();
        assert_eq!(url.as_str(), "http://localhost:5002/api/posts/7");
        let like = like_url("http://localhost:5002/api", 7).unwrap();
        assert_eq!(like.path(), "/api/posts/7/like");
    }

    #[test]
    fn blank_base_url_is_rejected() {
        let err = list_url("   ", &ListOptions::default()).unwrap_err();
        assert!(matches!(err, ApiError::MissingBaseUrl));
    }

    #[test]
    fn relative_base_url_is_rejected() {
        let err = list_url("localhost/api", &ListOptions::default()).unwrap_err();
        assert!(matches!(err, ApiError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn post_decodes_server_shape() {
        let raw = r#"{"id":3,"title":"Hello","content":"World","author":"Jane","date":"2024-01-31","likes":5}"#;
        let post: Post = serde_json::from_str(raw).unwrap();
        assert_eq!(post.id, 3);
        assert_eq!(post.likes, 5);
        assert_eq!(post.author, "Jane");
    }

    #[test]
    fn sort_key_cycles_through_all_fields() {
        let mut key = SortKey::Title;
        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(key.as_str());
            key = key.next();
        }
        assert_eq!(seen, ["title", "content", "author", "date"]);
        assert_eq!(key, SortKey::Title);
    }

    #[test]
    fn client_requires_user_agent() {
        assert!(Client::new(ClientConfig::default()).is_err());
    }

    #[test]
    fn client_builds_from_user_agent_and_timeout() {
        let client = Client::new(ClientConfig {
            user_agent: "post-browser/test".into(),
            timeout: Some(Duration::from_secs(3)),
        })
        .unwrap();
        assert_eq!(client.user_agent, "post-browser/test");
    }
}
