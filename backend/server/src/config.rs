use std::{env, fmt::Display, fs::read_to_string, str::FromStr, time::Duration};

use tracing::{info, warn};
use url::Url;

pub struct Config {
    pub port: u16,
    pub storage_url: String,
    pub storage_bucket: String,
    pub storage_key: String,
    pub managed_hosts: Vec<String>,
    pub preference_dir: String,
    pub default_prefer_local: bool,
    pub fetch_timeout: Duration,
}

impl Config {
    pub fn load() -> Self {
        let storage_url: String = try_load("STORAGE_URL", "http://localhost:54321");
        let default_hosts = host_of(&storage_url);

        Self {
            port: try_load("RUST_PORT", "1111"),
            storage_bucket: try_load("STORAGE_BUCKET", "images"),
            storage_key: read_secret("STORAGE_SERVICE_KEY"),
            managed_hosts: split_list(&try_load::<String>("MANAGED_HOSTS", &default_hosts)),
            preference_dir: try_load("PREFERENCE_DIR", "data/preferences"),
            default_prefer_local: try_load("DEFAULT_PREFER_LOCAL", "true"),
            fetch_timeout: Duration::from_millis(try_load("FETCH_TIMEOUT_MS", "10000")),
            storage_url,
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found, using default");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}

fn read_secret(secret_name: &str) -> String {
    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            warn!("Failed to read {secret_name} from file: {e}");
        })
        .expect("Secrets misconfigured!")
}

fn host_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .unwrap_or_default()
}

pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
