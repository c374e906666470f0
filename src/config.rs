use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub api_version: String,
    pub predefine_default_namespace: String,
    pub predefine_namespaces: Vec<String>,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Bucketed file storage API")]
pub struct Args {
    /// Host to bind to (overrides FILE_STORE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides FILE_STORE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides FILE_STORE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("FILE_STORE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("FILE_STORE_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing FILE_STORE_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 3000,
            Err(err) => return Err(err).context("reading FILE_STORE_PORT"),
        };
        let env_db = env::var("FILE_STORE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/file_store.db".into());
        let api_version = env::var("API_VERSION").unwrap_or_else(|_| "1.0.0".into());
        let predefine_default_namespace =
            env::var("PREDEFINE_DEFAULT_NAMESPACE").unwrap_or_else(|_| "Setting".into());
        let predefine_namespaces = env::var("PREDEFINE_NAMESPACES")
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            api_version,
            predefine_default_namespace,
            predefine_namespaces,
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Mount prefix derived from the API version, e.g. "1.0.0" => "/v1".
    pub fn version_prefix(&self) -> String {
        let major = self.api_version.split('.').next().unwrap_or("1");
        format!("/v{}", major)
    }
}
