use crate::{
    app::{
        backend::RemoteBackend, local::LocalStore, orchestrator::Orchestrator, remote::HttpBackend,
        url_index::UrlIndex,
    },
    config::Config,
    storage::{self, StorageManager},
};
use anyhow::{Context, Result};
use homedir::my_home;
use std::{sync::Arc, time::Duration};

/// Application factory for creating and configuring application components
pub struct AppFactory;

impl AppFactory {
    /// Build the orchestrator for `config`, storing local records under `paths.store_path`.
    pub fn create_orchestrator(paths: &AppPaths, config: &Config) -> Result<Orchestrator> {
        let store: Arc<dyn StorageManager> = Arc::new(
            storage::BackendLocal::new(&paths.store_path)
                .context("Failed to open local store")?,
        );

        let remote = Self::create_remote(config)?;

        Ok(Orchestrator::new(
            remote,
            LocalStore::new(store.clone()),
            UrlIndex::new(store),
            config.capture.clone(),
            config.search.clone(),
        ))
    }

    fn create_remote(config: &Config) -> Result<Option<Box<dyn RemoteBackend>>> {
        if config.backend.local_only {
            log::info!("local mode, remote backend disabled");
            return Ok(None);
        }

        let backend = HttpBackend::new(
            &config.backend.url,
            Duration::from_secs(config.backend.request_timeout_secs),
            Duration::from_secs(config.backend.health_timeout_secs),
        )
        .context("Failed to build http client")?;
        log::info!("using remote backend: {}", backend.addr());

        Ok(Some(Box::new(backend)))
    }

    /// Get application paths with validation
    pub fn get_paths() -> Result<AppPaths> {
        let base_path = Self::get_base_path()?;
        let store_path = format!("{base_path}/store");

        // Ensure base directory exists
        std::fs::create_dir_all(&base_path)
            .context("Failed to create application base directory")?;

        Ok(AppPaths {
            base_path,
            store_path,
        })
    }

    /// Load configuration and apply environment overrides
    pub fn create_config(base_path: &str) -> Result<Config> {
        let mut config = Config::load_with(base_path).context("Failed to load config")?;
        Self::apply_env(&mut config)?;
        config.validate()?;

        Ok(config)
    }

    /// `WEBMEM_BACKEND_URL` and `WEBMEM_LOCAL_ONLY` override the config file.
    fn apply_env(config: &mut Config) -> Result<()> {
        if let Ok(url) = std::env::var("WEBMEM_BACKEND_URL") {
            let url = url.trim();
            if !url.is_empty() {
                config.backend.url = url.to_string();
            }
        }

        if let Ok(value) = std::env::var("WEBMEM_LOCAL_ONLY") {
            config.backend.local_only = parse_flag(&value)
                .with_context(|| format!("Invalid WEBMEM_LOCAL_ONLY value {value:?}"))?;
        }

        Ok(())
    }

    /// Get the base path for the application
    fn get_base_path() -> Result<String> {
        if let Ok(base_path) = std::env::var("WEBMEM_BASE_PATH") {
            return Ok(base_path);
        }

        let home = my_home()
            .context("Could not determine home directory")?
            .context("Home directory path is empty")?;
        Ok(format!("{}/.local/share/webmem", home.to_string_lossy()))
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Application paths structure
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub base_path: String,
    pub store_path: String,
}
