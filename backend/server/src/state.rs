use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Client;
use showcase::{Annotator, FileStore, ImagePreference, KeyValueStore, PreferenceStore};
use tracing::warn;

use super::{
    config::Config,
    content::RestContentStore,
    storage::{Bucket, RestBucket},
};

pub type Preferences = PreferenceStore<Box<dyn KeyValueStore>>;

pub struct State {
    pub http: Client,
    pub bucket: Arc<dyn Bucket>,
    pub preferences: Preferences,
    pub annotator: Annotator,
}

impl State {
    pub fn new(config: &Config) -> Result<Arc<Self>> {
        let http = Client::builder()
            .timeout(config.fetch_timeout)
            .build()
            .context("Failed to build http client")?;

        let bucket = Arc::new(RestBucket::new(
            http.clone(),
            &config.storage_url,
            &config.storage_bucket,
            &config.storage_key,
        )?);

        let versions = Arc::new(RestContentStore::new(
            http.clone(),
            &config.storage_url,
            &config.storage_key,
        ));

        let preferences = PreferenceStore::new(
            Box::new(FileStore::new(&config.preference_dir)) as Box<dyn KeyValueStore>,
            ImagePreference::new(config.default_prefer_local),
        );

        if let Err(e) = preferences.initialize_with_default() {
            warn!("Preference storage unavailable, keeping in-memory default: {e}");
        }

        Ok(Self::from_parts(
            http,
            bucket,
            preferences,
            Annotator::new(config.managed_hosts.clone(), versions),
        ))
    }

    pub fn from_parts(
        http: Client,
        bucket: Arc<dyn Bucket>,
        preferences: Preferences,
        annotator: Annotator,
    ) -> Arc<Self> {
        Arc::new(Self {
            http,
            bucket,
            preferences,
            annotator,
        })
    }
}
