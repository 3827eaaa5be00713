use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_USER_ID: &str = "local";

const ENV_USER_ID: &str = "CLASSBOOKD_USER_ID";
const ENV_WORKSPACE: &str = "CLASSBOOKD_WORKSPACE";
const ENV_GENERATOR_CMD: &str = "CLASSBOOKD_GENERATOR_CMD";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must not be empty")]
    Empty { var: &'static str },
    #[error("failed to read .env file: {0}")]
    DotEnv(#[from] dotenvy::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Owner written to every stored row and used to filter reads.
    pub user_id: String,
    /// Workspace opened at startup, before any `workspace.select`.
    pub workspace: Option<PathBuf>,
    /// Command line of the report text generator.
    pub generator_cmd: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_id: DEFAULT_USER_ID.to_string(),
            workspace: None,
            generator_cmd: None,
        }
    }
}

impl Config {
    /// Loads an optional `.env` file, then reads the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => info!(path = %path.display(), "loaded environment file"),
            Err(e) if e.not_found() => debug!("no .env file"),
            Err(e) => return Err(e.into()),
        }
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Config::default();

        if let Some(v) = lookup(ENV_USER_ID) {
            let v = v.trim().to_string();
            if v.is_empty() {
                return Err(ConfigError::Empty { var: ENV_USER_ID });
            }
            cfg.user_id = v;
        }
        cfg.workspace = lookup(ENV_WORKSPACE)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        cfg.generator_cmd = lookup(ENV_GENERATOR_CMD)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        Ok(cfg)
    }
}
