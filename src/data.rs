use anyhow::{Context, Result};
use std::sync::Arc;

use crate::api::{self, ListOptions, Post, PostDraft, SearchQuery};

pub trait PostService: Send + Sync {
    fn list_posts(&self, base_url: &str, opts: &ListOptions) -> Result<Vec<Post>>;
    fn search_posts(&self, base_url: &str, query: &SearchQuery) -> Result<Vec<Post>>;
    fn create_post(&self, base_url: &str, draft: &PostDraft) -> Result<Post>;
    fn update_post(&self, base_url: &str, id: i64, draft: &PostDraft) -> Result<Post>;
    fn delete_post(&self, base_url: &str, id: i64) -> Result<()>;
    fn like_post(&self, base_url: &str, id: i64) -> Result<Post>;
}

pub struct HttpPostService {
    client: Arc<api::Client>,
}

impl HttpPostService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl PostService for HttpPostService {
    fn list_posts(&self, base_url: &str, opts: &ListOptions) -> Result<Vec<Post>> {
        self.client
            .list_posts(base_url, opts)
            .context("fetch post list")
    }

    fn search_posts(&self, base_url: &str, query: &SearchQuery) -> Result<Vec<Post>> {
        self.client
            .search_posts(base_url, query)
            .context("search posts")
    }

    fn create_post(&self, base_url: &str, draft: &PostDraft) -> Result<Post> {
        self.client
            .create_post(base_url, draft)
            .context("create post")
    }

    fn update_post(&self, base_url: &str, id: i64, draft: &PostDraft) -> Result<Post> {
        self.client
            .update_post(base_url, id, draft)
            .with_context(|| format!("update post {id}"))
    }

    fn delete_post(&self, base_url: &str, id: i64) -> Result<()> {
        self.client
            .delete_post(base_url, id)
            .with_context(|| format!("delete post {id}"))
    }

    fn like_post(&self, base_url: &str, id: i64) -> Result<Post> {
        self.client
            .like_post(base_url, id)
            .with_context(|| format!("like post {id}"))
    }
}
