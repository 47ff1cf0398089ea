use std::path::PathBuf;

use crate::together::DEFAULT_API_BASE;

#[derive(Debug, Clone)]
pub struct Config {
    pub together_api_key: Option<String>,
    pub together_api_base: String,
    pub scratch_dir: PathBuf,
    pub port: u16,
}

impl Config {
    /// Reads the process environment; call after `dotenv::dotenv()`.
    pub fn from_env() -> Self { Self::from_lookup(|key| std::env::var(key).ok()) }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            together_api_key: get("TOGETHER_API_KEY").filter(|k| !k.trim().is_empty()),
            together_api_base: get("TOGETHER_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            scratch_dir: get("SCRATCH_DIR").map(PathBuf::from).unwrap_or_else(std::env::temp_dir),
            port: get("PORT").and_then(|v| v.parse().ok()).unwrap_or(8080),
        }
    }

    pub fn redacted_key(&self) -> String {
        match &self.together_api_key {
            Some(key) => format!("{}...", key.chars().take(6).collect::<String>()),
            None => "<not configured>".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> Config {
        let env: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = lookup(&[]);
        assert_eq!(config.together_api_key, None);
        assert_eq!(config.together_api_base, DEFAULT_API_BASE);
        assert_eq!(config.scratch_dir, std::env::temp_dir());
        assert_eq!(config.port, 8080);
        assert_eq!(config.redacted_key(), "<not configured>");
    }

    #[test]
    fn reads_overrides() {
        let config = lookup(&[
            ("TOGETHER_API_KEY", "tgp_v1_secret"),
            ("TOGETHER_API_BASE", "http://localhost:9000/v1"),
            ("SCRATCH_DIR", "/var/tmp/docs"),
            ("PORT", "3000"),
        ]);
        assert_eq!(config.together_api_key.as_deref(), Some("tgp_v1_secret"));
        assert_eq!(config.together_api_base, "http://localhost:9000/v1");
        assert_eq!(config.scratch_dir, PathBuf::from("/var/tmp/docs"));
        assert_eq!(config.port, 3000);
        assert_eq!(config.redacted_key(), "tgp_v1...");
    }

    #[test]
    fn blank_key_counts_as_missing() {
        assert_eq!(lookup(&[("TOGETHER_API_KEY", "  ")]).together_api_key, None);
    }
}
