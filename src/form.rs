use crate::api::{Post, PostDraft, SearchQuery};

pub const POST_FIELDS: [&str; 4] = ["Title", "Content", "Author", "Date"];
pub const BASE_URL_FIELDS: [&str; 1] = ["Base URL"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub label: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Form {
    fields: Vec<Field>,
    active: usize,
}

impl Default for Form {
    fn default() -> Self {
        Self::post()
    }
}

impl Form {
    pub fn new(labels: &[&'static str]) -> Self {
        Self {
            fields: labels
                .iter()
                .map(|&label| Field {
                    label,
                    value: String::new(),
                })
                .collect(),
            active: 0,
        }
    }

    pub fn post() -> Self {
        Self::new(&POST_FIELDS)
    }

    pub fn base_url(current: &str) -> Self {
        let mut form = Self::new(&BASE_URL_FIELDS);
        form.set_value(0, current);
        form
    }

    pub fn seeded(post: &Post) -> Self {
        let mut form = Self::post();
        form.set_value(0, &post.title);
        form.set_value(1, &post.content);
        form.set_value(2, post.author.trim());
        form.set_value(3, post.date.trim());
        form
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn active(&self) -> usize {
        self.active
    }

    pub fn focus(&mut self, index: usize) {
        if index < self.fields.len() {
            self.active = index;
        }
    }

    pub fn next(&mut self) {
        if !self.fields.is_empty() {
            self.active = (self.active + 1) % self.fields.len();
        }
    }

    pub fn previous(&mut self) {
        if !self.fields.is_empty() {
            self.active = (self.active + self.fields.len() - 1) % self.fields.len();
        }
    }

    pub fn value(&self, index: usize) -> &str {
        self.fields
            .get(index)
            .map(|field| field.value.as_str())
            .unwrap_or("")
    }

    pub fn set_value(&mut self, index: usize, value: &str) {
        if let Some(field) = self.fields.get_mut(index) {
            field.value = value.to_string();
        }
    }

    fn active_value_mut(&mut self) -> Option<&mut String> {
        self.fields.get_mut(self.active).map(|field| &mut field.value)
    }

    pub fn insert_char(&mut self, ch: char) {
        if let Some(value) = self.active_value_mut() {
            value.push(ch);
        }
    }

    pub fn backspace(&mut self) {
        if let Some(value) = self.active_value_mut() {
            value.pop();
        }
    }

    pub fn clear_active(&mut self) {
        if let Some(value) = self.active_value_mut() {
            value.clear();
        }
    }

    pub fn to_draft(&self) -> PostDraft {
        PostDraft {
            title: self.value(0).to_string(),
            content: self.value(1).to_string(),
            author: self.value(2).to_string(),
            date: self.value(3).to_string(),
        }
    }

    pub fn to_search(&self) -> SearchQuery {
        SearchQuery {
            title: self.value(0).to_string(),
            content: self.value(1).to_string(),
            author: self.value(2).to_string(),
            date: self.value(3).to_string(),
        }
    }
}
