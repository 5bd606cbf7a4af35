use crate::config::Config;
use crate::crypto::KeyPair;
use crate::ledger::Ledger;
use crate::persistence::Database;
use std::fs;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

/// Installs the global fmt subscriber at `level`; unknown levels fall back
/// to `info`.
pub fn init_tracing(level: &str) {
    let level = tracing::Level::from_str(level).unwrap_or(tracing::Level::INFO);
    let _ = tracing_subscriber::fmt().with_max_level(level).try_init();
}

pub struct Node {
    pub config: Config,
    pub ledger: Arc<Ledger>,
}

impl Node {
    /// Opens storage, rebuilds the ledger and seeds the validator registry.
    /// Any failure here is fatal to the process.
    pub fn init(config: Config) -> Result<Self, Box<dyn std::error::Error>> {
        let db_path = std::path::Path::new(&config.database.path);
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| format!("Failed to create data dir {:?}: {}", parent, e))?;
            }
        }

        let db = Database::open(db_path)?;
        let ledger = Ledger::open(Box::new(db))?;

        for validator in &config.validators {
            ledger.register_validator(validator.public_key_bytes()?, validator.stake)?;
        }
        if config.validators.is_empty() {
            let local = KeyPair::generate();
            warn!(
                validator = %hex::encode(local.public_key_bytes()),
                "No validators configured; registering an ephemeral local validator"
            );
            ledger.register_validator(local.public_key_bytes(), 1)?;
        }

        let stats = ledger.stats();
        info!(
            db = %config.database.path,
            height = stats.height,
            validators = stats.validators,
            "node.ready"
        );

        Ok(Self {
            config,
            ledger: Arc::new(ledger),
        })
    }

    /// Serves the HTTP API until `shutdown` resolves, then closes storage.
    #[cfg(feature = "api")]
    pub async fn run<F>(self, shutdown: F) -> Result<(), Box<dyn std::error::Error>>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.bind_address();
        let served = crate::api::run_api_server(self.ledger.clone(), &addr, shutdown).await;
        self.ledger.close()?;
        info!("node.stopped");
        served
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidatorConfig;

    #[test]
    fn test_init_creates_data_dir_and_registers_fallback_validator() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.database.path = dir
            .path()
            .join("nested/ledger.db")
            .to_string_lossy()
            .into_owned();

        let node = Node::init(config).unwrap();
        assert_eq!(node.ledger.validators().len(), 1);
        assert_eq!(node.ledger.snapshot().len(), 1);
    }

    #[test]
    fn test_init_uses_configured_validators() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.database.path = dir.path().join("ledger.db").to_string_lossy().into_owned();
        config.validators = vec![ValidatorConfig {
            public_key: "cd".repeat(64),
            stake: 9,
        }];

        let node = Node::init(config).unwrap();
        let validators = node.ledger.validators();
        assert_eq!(validators.len(), 1);
        assert_eq!(validators[0].stake, 9);
    }
}
