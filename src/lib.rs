#![allow(clippy::uninlined_format_args)]

pub mod api;
pub mod app;
pub mod browser;
pub mod config;
pub mod data;
pub mod form;
pub mod logging;
pub mod storage;
pub mod ui;
pub mod validate;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::{run, RunOptions};
