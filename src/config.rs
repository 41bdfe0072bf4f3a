use anyhow::{Context, Result};
use clap::Parser;
use std::{env, path::Path, str::FromStr};

const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Root directory of the object store.
    pub storage_dir: String,
    /// Prefix blob URLs are resolved against.
    pub public_base_url: String,
    /// Metadata store connection string.
    pub database_url: String,
    pub max_upload_bytes: usize,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Photo diary API")]
pub struct Args {
    /// Host to bind to (overrides DIARY_API_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides DIARY_API_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where image blobs are stored (overrides DIARY_API_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Base URL used for blob links (overrides DIARY_API_PUBLIC_BASE_URL)
    #[arg(long)]
    pub public_base_url: Option<String>,

    /// Metadata database URL (overrides DIARY_API_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Largest accepted upload body in bytes (overrides DIARY_API_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        Ok((Self::from_args_with_env(args, |key| env::var(key))?, migrate))
    }

    /// Merge `args` over values looked up through `lookup`, then defaults.
    pub fn from_args_with_env<F>(args: Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let var = |key: &str| -> Result<Option<String>> {
            match lookup(key) {
                Ok(value) => Ok(Some(value)),
                Err(env::VarError::NotPresent) => Ok(None),
                Err(err) => Err(err).with_context(|| format!("reading {}", key)),
            }
        };
        let parsed = |key: &str| -> Result<Option<u64>> { parse_var(key, var(key)?) };

        let env_port = match parsed("DIARY_API_PORT")? {
            Some(port) => u16::try_from(port).context("DIARY_API_PORT out of range")?,
            None => 7071,
        };
        let env_max_upload = match parsed("DIARY_API_MAX_UPLOAD_BYTES")? {
            Some(bytes) => usize::try_from(bytes).context("DIARY_API_MAX_UPLOAD_BYTES out of range")?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let storage_dir = args
            .storage_dir
            .or(var("DIARY_API_STORAGE_DIR")?)
            .unwrap_or_else(|| "./data/objects".into());
        let public_base_url = match args.public_base_url.or(var("DIARY_API_PUBLIC_BASE_URL")?) {
            Some(url) => url,
            None => default_public_base_url(&storage_dir),
        };

        Ok(Self {
            host: args
                .host
                .or(var("DIARY_API_HOST")?)
                .unwrap_or_else(|| "0.0.0.0".into()),
            port: args.port.unwrap_or(env_port),
            storage_dir,
            public_base_url,
            database_url: args
                .database_url
                .or(var("DIARY_API_DATABASE_URL")?)
                .unwrap_or_else(|| "sqlite://./data/meta/diary.db".into()),
            max_upload_bytes: args.max_upload_bytes.unwrap_or(env_max_upload),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T>(key: &str, value: Option<String>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .map(|value| {
            value
                .parse::<T>()
                .with_context(|| format!("parsing {} value `{}`", key, value))
        })
        .transpose()
}

/// `file://` URL of the storage directory, absolute when it can be resolved.
fn default_public_base_url(storage_dir: &str) -> String {
    let path = Path::new(storage_dir);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    format!("file://{}", absolute.display())
}
