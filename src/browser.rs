use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, error, info, warn};

use crate::api::{ListOptions, Post, SortDirection, SortKey};
use crate::data::PostService;
use crate::form::Form;
use crate::storage;
use crate::validate;

pub const INVALID_DATE_ALERT: &str = "Please enter a valid date in the format YYYY-MM-DD.";
const SET_BASE_URL_HINT: &str = "Press b to set the API base URL.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    #[default]
    Editable,
    ReadOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditState {
    pub post_id: i64,
    pub form: Form,
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub base_url: String,
    pub posts: Vec<Post>,
    pub mode: RenderMode,
    pub editing: Option<EditState>,
    pub selected: usize,
    pub add_form: Form,
    pub search_form: Form,
    pub sort_key: SortKey,
    pub sort_direction: SortDirection,
    pub alert: Option<String>,
    pub status: String,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            posts: Vec::new(),
            mode: RenderMode::Editable,
            editing: None,
            selected: 0,
            add_form: Form::post(),
            search_form: Form::post(),
            sort_key: SortKey::default(),
            sort_direction: SortDirection::default(),
            alert: None,
            status: SET_BASE_URL_HINT.to_string(),
        }
    }
}

impl AppState {
    pub fn selected_post(&self) -> Option<&Post> {
        self.posts.get(self.selected)
    }

    pub fn editing_post(&self, post_id: i64) -> Option<&EditState> {
        self.editing.as_ref().filter(|edit| edit.post_id == post_id)
    }

    fn idle_status(&self) -> String {
        if self.base_url.is_empty() {
            return SET_BASE_URL_HINT.to_string();
        }
        let label = match self.mode {
            RenderMode::Editable => "posts",
            RenderMode::ReadOnly => "search results",
        };
        format!("{} {} from {}", self.posts.len(), label, self.base_url)
    }
}

struct PendingList {
    request_id: u64,
    mode: RenderMode,
}

enum Response {
    Listed {
        request_id: u64,
        result: Result<Vec<Post>>,
    },
    Created {
        result: Result<Post>,
    },
    Updated {
        post_id: i64,
        result: Result<Post>,
    },
    Deleted {
        post_id: i64,
        result: Result<()>,
    },
    Liked {
        post_id: i64,
        result: Result<Post>,
    },
}

pub struct Browser {
    state: AppState,
    service: Arc<dyn PostService + Send + Sync>,
    store: Arc<storage::Store>,
    response_tx: Sender<Response>,
    response_rx: Receiver<Response>,
    next_request_id: u64,
    // Only the newest list or search may render.
    pending_list: Option<PendingList>,
    in_flight: usize,
}

impl Browser {
    pub fn new(service: Arc<dyn PostService + Send + Sync>, store: Arc<storage::Store>) -> Self {
        let (response_tx, response_rx) = unbounded();
        Self {
            state: AppState::default(),
            service,
            store,
            response_tx,
            response_rx,
            next_request_id: 1,
            pending_list: None,
            in_flight: 0,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut AppState {
        &mut self.state
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight > 0
    }

    pub fn initialize(&mut self) {
        match self.store.base_url() {
            Ok(Some(url)) if !url.trim().is_empty() => {
                info!(base_url = %url, "restored base url");
                self.state.base_url = url;
                self.load_list(ListOptions::default());
            }
            Ok(_) => {
                self.state.status = SET_BASE_URL_HINT.to_string();
            }
            Err(err) => {
                warn!("failed to restore base url: {err:#}");
            }
        }
    }

    pub fn set_base_url(&mut self, url: &str) {
        self.state.base_url = url.trim().to_string();
    }

    pub fn load_list(&mut self, opts: ListOptions) {
        if let Err(err) = self.store.set_base_url(&self.state.base_url) {
            error!("failed to persist base url: {err:#}");
        }
        self.state.status = if opts.sort_by.is_empty() {
            format!("Loading posts from {}…", self.state.base_url)
        } else {
            format!(
                "Loading posts sorted by {} ({})…",
                opts.sort_by, opts.direction
            )
        };
        let service = self.service.clone();
        let base_url = self.state.base_url.clone();
        self.issue_list(RenderMode::Editable, move || {
            service.list_posts(&base_url, &opts)
        });
    }

    pub fn search_posts(&mut self) {
        let query = self.state.search_form.to_search();
        self.state.status = "Searching posts…".to_string();
        let service = self.service.clone();
        let base_url = self.state.base_url.clone();
        self.issue_list(RenderMode::ReadOnly, move || {
            service.search_posts(&base_url, &query)
        });
    }

    pub fn sort_posts(&mut self) {
        let opts = ListOptions::sorted(self.state.sort_key, self.state.sort_direction);
        self.load_list(opts);
    }

    pub fn add_post(&mut self) {
        let draft = self.state.add_form.to_draft();
        let service = self.service.clone();
        let base_url = self.state.base_url.clone();
        self.spawn(move || Response::Created {
            result: service.create_post(&base_url, &draft),
        });
    }

    pub fn delete_post(&mut self, post_id: i64) {
        let service = self.service.clone();
        let base_url = self.state.base_url.clone();
        self.spawn(move || Response::Deleted {
            post_id,
            result: service.delete_post(&base_url, post_id),
        });
    }

    pub fn like_post(&mut self, post_id: i64) {
        let service = self.service.clone();
        let base_url = self.state.base_url.clone();
        self.spawn(move || Response::Liked {
            post_id,
            result: service.like_post(&base_url, post_id),
        });
    }

    pub fn enter_edit(&mut self, post_id: i64) {
        if self.state.mode == RenderMode::ReadOnly {
            debug!(post_id, "edit unavailable on search results");
            return;
        }
        let Some(post) = self.state.posts.iter().find(|post| post.id == post_id) else {
            return;
        };
        self.state.editing = Some(EditState {
            post_id,
            form: Form::seeded(post),
        });
    }

    pub fn cancel_edit(&mut self) {
        self.state.editing = None;
    }

    pub fn update_post(&mut self, post_id: i64) {
        let Some(edit) = self.state.editing_post(post_id) else {
            return;
        };
        let draft = edit.form.to_draft();
        if !validate::is_valid_date(&draft.date) {
            self.state.alert = Some(INVALID_DATE_ALERT.to_string());
            return;
        }
        let service = self.service.clone();
        let base_url = self.state.base_url.clone();
        self.spawn(move || Response::Updated {
            post_id,
            result: service.update_post(&base_url, post_id, &draft),
        });
    }

    pub fn dismiss_alert(&mut self) {
        self.state.alert = None;
    }

    pub fn move_selection(&mut self, delta: i32) {
        if self.state.posts.is_empty() {
            self.state.selected = 0;
            return;
        }
        let max = self.state.posts.len() as i64 - 1;
        let next = (self.state.selected as i64 + delta as i64).clamp(0, max);
        self.state.selected = next as usize;
    }

    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Ok(message) = self.response_rx.try_recv() {
            self.handle_response(message);
            changed = true;
        }
        changed
    }

    pub fn poll_timeout(&mut self, timeout: Duration) -> bool {
        match self.response_rx.recv_timeout(timeout) {
            Ok(message) => {
                self.handle_response(message);
                self.poll();
                true
            }
            Err(_) => false,
        }
    }

    fn issue_list<F>(&mut self, mode: RenderMode, fetch: F)
    where
        F: FnOnce() -> Result<Vec<Post>> + Send + 'static,
    {
        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        self.pending_list = Some(PendingList { request_id, mode });
        self.spawn(move || Response::Listed {
            request_id,
            result: fetch(),
        });
    }

    fn spawn<F>(&mut self, job: F)
    where
        F: FnOnce() -> Response + Send + 'static,
    {
        self.in_flight += 1;
        let tx = self.response_tx.clone();
        thread::spawn(move || {
            let _ = tx.send(job());
        });
    }

    fn handle_response(&mut self, message: Response) {
        self.in_flight = self.in_flight.saturating_sub(1);
        match message {
            Response::Listed { request_id, result } => {
                let Some(pending) = &self.pending_list else {
                    return;
                };
                if pending.request_id != request_id {
                    debug!(request_id, "discarding stale post list");
                    return;
                }
                let mode = pending.mode;
                self.pending_list = None;
                match result {
                    Ok(posts) => self.apply_posts(posts, mode),
                    Err(err) => {
                        error!("failed to load posts: {err:#}");
                        self.state.status = self.state.idle_status();
                    }
                }
            }
            Response::Created { result } => match result {
                Ok(post) => {
                    info!(post_id = post.id, title = %post.title, "post added");
                    self.load_list(ListOptions::default());
                }
                Err(err) => error!("failed to add post: {err:#}"),
            },
            Response::Updated { post_id, result } => match result {
                Ok(post) => {
                    info!(post_id = post.id, title = %post.title, "post updated");
                    self.load_list(ListOptions::default());
                }
                Err(err) => error!(post_id, "failed to update post: {err:#}"),
            },
            Response::Deleted { post_id, result } => match result {
                Ok(()) => {
                    info!(post_id, "post deleted");
                    self.load_list(ListOptions::default());
                }
                Err(err) => error!(post_id, "failed to delete post: {err:#}"),
            },
            Response::Liked { post_id, result } => match result {
                Ok(updated) => {
                    for post in self.state.posts.iter_mut().filter(|post| post.id == post_id) {
                        post.likes = updated.likes;
                    }
                }
                Err(err) => error!(post_id, "failed to like post: {err:#}"),
            },
        }
    }

    fn apply_posts(&mut self, posts: Vec<Post>, mode: RenderMode) {
        self.state.posts = posts;
        self.state.mode = mode;
        self.state.editing = None;
        if self.state.selected >= self.state.posts.len() {
            self.state.selected = self.state.posts.len().saturating_sub(1);
        }
        self.state.status = self.state.idle_status();
    }
}
