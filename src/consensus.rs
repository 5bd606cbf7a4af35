//! Stake-weighted validator selection

use crate::error::ChainError;
use rand::rngs::OsRng;
use rand::{CryptoRng, Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    #[serde(with = "serde_bytes")]
    pub public_key: Vec<u8>,
    pub stake: u64,
}

impl Validator {
    pub fn new(public_key: Vec<u8>, stake: u64) -> Self {
        Validator { public_key, stake }
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(&self.public_key)
    }
}

/// Registry of validators keyed by the hex encoding of their public key.
#[derive(Debug, Clone, Default)]
pub struct ValidatorSet {
    validators: HashMap<String, Validator>,
}

impl ValidatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a validator or replaces the stake of an existing one. Rejects a
    /// stake that would push the registry total past `u64::MAX`.
    pub fn register(&mut self, validator: Validator) -> Result<(), ChainError> {
        let key = validator.public_key_hex();
        let others = self
            .validators
            .iter()
            .filter(|(k, _)| **k != key)
            .try_fold(0u64, |acc, (_, v)| acc.checked_add(v.stake));
        if others.and_then(|total| total.checked_add(validator.stake)).is_none() {
            return Err(ChainError::Validation(format!(
                "Stake {} for validator {} overflows the registry total",
                validator.stake, key
            )));
        }
        self.validators.insert(key, validator);
        Ok(())
    }

    pub fn remove(&mut self, public_key: &[u8]) -> Option<Validator> {
        self.validators.remove(&hex::encode(public_key))
    }

    pub fn get(&self, public_key: &[u8]) -> Option<&Validator> {
        self.validators.get(&hex::encode(public_key))
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Exact sum of all stakes; `register` keeps it within `u64`.
    pub fn total_stake(&self) -> u64 {
        self.validators.values().map(|v| v.stake).sum()
    }

    /// Validators ordered by public key; the walk order for selection.
    pub fn sorted(&self) -> Vec<&Validator> {
        let mut list: Vec<&Validator> = self.validators.values().collect();
        list.sort_by(|a, b| a.public_key.cmp(&b.public_key));
        list
    }
}

/// Picks a validator with probability proportional to its stake.
///
/// Draws `r` uniformly from `[1, total]` and walks validators in public-key
/// order, subtracting each stake until `r` reaches zero. Validators with
/// zero stake can never be chosen.
pub fn select_validator<'a, R>(set: &'a ValidatorSet, rng: &mut R) -> Result<&'a Validator, ChainError>
where
    R: RngCore + CryptoRng,
{
    let total = set.total_stake();
    if total == 0 {
        return Err(ChainError::NoEligibleValidator(format!(
            "{} registered validators hold no stake",
            set.len()
        )));
    }

    let mut remaining = rng.gen_range(1..=total);
    for validator in set.sorted() {
        if validator.stake >= remaining {
            return Ok(validator);
        }
        remaining -= validator.stake;
    }

    // Unreachable while total_stake is the exact sum.
    Err(ChainError::NoEligibleValidator(
        "Stake walk exhausted the registry".to_string(),
    ))
}

/// Selection using the operating system's CSPRNG.
pub fn proof_of_stake(set: &ValidatorSet) -> Result<&Validator, ChainError> {
    select_validator(set, &mut OsRng)
}
