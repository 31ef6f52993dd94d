use crate::domain::locator::DEFAULT_PROGRAM_ID;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_RPC_URL: &str = "https://api.devnet.solana.com";

#[derive(Debug, Clone)]
pub struct Config {
    pub rpc_url: String,
    pub program_id: Pubkey,
    pub keypair_path: String,
    pub commitment: CommitmentConfig,
    pub fast_tick_ms: u64,
    pub refresh_interval_ms: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let rpc_url = env_map
            .get("RPC_URL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_RPC_URL.to_string());

        let program_id_str = env_map
            .get("PROGRAM_ID")
            .map(|s| s.as_str())
            .unwrap_or(DEFAULT_PROGRAM_ID);
        let program_id = Pubkey::from_str(program_id_str).map_err(|_| {
            ConfigError::InvalidValue(
                "PROGRAM_ID".to_string(),
                "must be a base58 public key".to_string(),
            )
        })?;

        let keypair_path = env_map
            .get("KEYPAIR_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("KEYPAIR_PATH".to_string()))?;

        let commitment = match env_map
            .get("COMMITMENT")
            .map(|s| s.as_str())
            .unwrap_or("confirmed")
        {
            "processed" => CommitmentConfig::processed(),
            "confirmed" => CommitmentConfig::confirmed(),
            "finalized" => CommitmentConfig::finalized(),
            other => {
                return Err(ConfigError::InvalidValue(
                    "COMMITMENT".to_string(),
                    format!("must be processed, confirmed, or finalized, got {}", other),
                ))
            }
        };

        let fast_tick_ms = parse_interval_ms(&env_map, "FAST_TICK_MS", "1000")?;
        let refresh_interval_ms = parse_interval_ms(&env_map, "REFRESH_INTERVAL_MS", "20000")?;

        Ok(Config {
            rpc_url,
            program_id,
            keypair_path,
            commitment,
            fast_tick_ms,
            refresh_interval_ms,
        })
    }
}

fn parse_interval_ms(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<u64, ConfigError> {
    env_map
        .get(key)
        .map(|s| s.as_str())
        .unwrap_or(default)
        .parse::<u64>()
        .ok()
        .filter(|ms| *ms > 0)
        .ok_or_else(|| {
            ConfigError::InvalidValue(key.to_string(), "must be a positive integer".to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("KEYPAIR_PATH".to_string(), "/tmp/id.json".to_string());
        map
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.rpc_url, DEFAULT_RPC_URL);
        assert_eq!(config.program_id.to_string(), DEFAULT_PROGRAM_ID);
        assert_eq!(config.commitment, CommitmentConfig::confirmed());
        assert_eq!(config.fast_tick_ms, 1000);
        assert_eq!(config.refresh_interval_ms, 20000);
    }

    #[test]
    fn test_missing_keypair_path() {
        let result = Config::from_env_map(HashMap::new());
        match result {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "KEYPAIR_PATH"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_invalid_program_id() {
        let mut env_map = setup_required_env();
        env_map.insert("PROGRAM_ID".to_string(), "not-a-key".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PROGRAM_ID"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_invalid_commitment() {
        let mut env_map = setup_required_env();
        env_map.insert("COMMITMENT".to_string(), "eventually".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "COMMITMENT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut env_map = setup_required_env();
        env_map.insert("FAST_TICK_MS".to_string(), "0".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "FAST_TICK_MS"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_overrides() {
        let mut env_map = setup_required_env();
        env_map.insert("RPC_URL".to_string(), "http://localhost:8899".to_string());
        env_map.insert("COMMITMENT".to_string(), "finalized".to_string());
        env_map.insert("REFRESH_INTERVAL_MS".to_string(), "5000".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(config.rpc_url, "http://localhost:8899");
        assert_eq!(config.commitment, CommitmentConfig::finalized());
        assert_eq!(config.refresh_interval_ms, 5000);
    }
}
