//! Shared state for every subcommand.

use std::time::Duration;

use deckmend_engine::config::Config;
use deckmend_engine::{AnkiStore, ClientBuilder, Normalizer, RepairEngine, RetryPolicy};

use crate::Args;

/// Configuration merged from the file and the command line, plus the store.
pub struct Context {
    pub config: Config,
    pub store: AnkiStore,
    pub json: bool,
}

impl Context {
    /// Load the config file, if any, and let command-line flags override it.
    pub fn new(args: &Args) -> Result<Self, Box<dyn std::error::Error>> {
        let mut config = match &args.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        if let Some(host) = &args.host {
            config.anki.host = host.clone();
        }
        if let Some(port) = args.port {
            config.anki.port = port;
        }
        if let Some(secs) = args.timeout {
            config.anki.timeout_secs = secs;
        }
        if let Some(key) = &args.api_key {
            config.anki.api_key = Some(key.clone());
        }

        let mut builder = ClientBuilder::new()
            .host(&config.anki.host)
            .port(config.anki.port)
            .timeout(Duration::from_secs(config.anki.timeout_secs.max(1)));
        if let Some(key) = &config.anki.api_key {
            builder = builder.api_key(key.clone());
        }
        let store = AnkiStore::new(builder.try_build()?);

        Ok(Self {
            config,
            store,
            json: args.json,
        })
    }

    pub fn normalizer(&self) -> Result<Normalizer, Box<dyn std::error::Error>> {
        Ok(Normalizer::new(&self.config.repair)?)
    }

    /// A repair engine over the AnkiConnect store, sized by the batch config.
    pub fn engine(&self, dry_run: bool) -> Result<RepairEngine<'_, AnkiStore>, Box<dyn std::error::Error>> {
        Ok(RepairEngine::new(&self.store, self.normalizer()?)
            .with_batch_size(self.config.batch.size)
            .with_retry(RetryPolicy::from(&self.config.batch))
            .dry_run(dry_run))
    }
}
