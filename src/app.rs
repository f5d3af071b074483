use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::api;
use crate::browser::Browser;
use crate::config;
use crate::data::{HttpPostService, PostService};
use crate::logging;
use crate::storage;
use crate::ui;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub config_file: Option<PathBuf>,
}

pub fn run(options: RunOptions) -> Result<()> {
    let config_path = options.config_file.clone().or_else(config::default_path);
    let cfg = config::load(config::LoadOptions {
        config_file: options.config_file,
        env_prefix: None,
    })
    .context("load config")?;
    let display_path = friendly_path(config_path.as_ref());

    let log_path = logging::init(&cfg.log)?;

    let store = Arc::new(
        storage::Store::open(storage::Options {
            path: cfg.storage.path.clone(),
        })
        .context("open storage")?,
    );

    let client = api::Client::new(api::ClientConfig {
        user_agent: cfg.api.user_agent.clone(),
        timeout: cfg.api.timeout,
    })
    .context("build post api client")?;
    let service: Arc<dyn PostService + Send + Sync> =
        Arc::new(HttpPostService::new(Arc::new(client)));

    let mut browser = Browser::new(service, store);
    browser.initialize();

    let mut model = ui::Model::new(ui::Options {
        browser,
        config_path: display_path,
        log_path: log_path.as_ref().map(|path| friendly_path(Some(path))),
    });
    model.run()?;

    tracing::info!("exiting");
    Ok(())
}

fn friendly_path(path: Option<&PathBuf>) -> String {
    if let Some(path) = path {
        if let Some(home) = dirs::home_dir() {
            if let Ok(stripped) = path.strip_prefix(&home) {
                let mut display = String::from("~");
                if !stripped.as_os_str().is_empty() {
                    display.push_str(&format!("/{}", stripped.display()));
                }
                return display;
            }
        }
        path.display().to_string()
    } else {
        "~/.config/post-browser/config.yaml".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn friendly_path_falls_back_to_default_location() {
        assert_eq!(friendly_path(None), "~/.config/post-browser/config.yaml");
    }

    #[test]
    fn friendly_path_keeps_paths_outside_home() {
        let path = PathBuf::from("/etc/post-browser/config.yaml");
        assert_eq!(friendly_path(Some(&path)), "/etc/post-browser/config.yaml");
    }
}
