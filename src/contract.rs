//! Opaque contract records. Code is stored but never interpreted.

use crate::crypto::sha256;
use crate::error::ChainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const LAST_EXECUTION_KEY: &str = "lastExecution";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmartContract {
    pub id: String,
    pub code: String,
    pub state: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl SmartContract {
    pub fn new(code: impl Into<String>) -> Self {
        let code = code.into();
        let created_at = Utc::now();
        let mut seed = code.as_bytes().to_vec();
        seed.extend_from_slice(created_at.to_rfc3339().as_bytes());
        SmartContract {
            id: hex::encode(sha256(&seed)),
            code,
            state: HashMap::new(),
            created_at,
        }
    }

    pub fn validate(&self) -> Result<(), ChainError> {
        if self.code.trim().is_empty() {
            return Err(ChainError::Validation("Contract code is empty".to_string()));
        }
        Ok(())
    }

    /// Records `input` as the latest execution and returns the new state.
    pub fn execute(
        &mut self,
        input: serde_json::Value,
    ) -> Result<&HashMap<String, serde_json::Value>, ChainError> {
        self.validate()?;
        self.state.insert(LAST_EXECUTION_KEY.to_string(), input);
        Ok(&self.state)
    }
}
