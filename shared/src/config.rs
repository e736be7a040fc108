use serde::Deserialize;

/// Value shipped in `.env.example`; treated the same as an unset key.
pub const PLACEHOLDER_API_KEY: &str = "your_anthropic_api_key_here";

fn default_anthropic_api_base() -> String {
    "https://api.anthropic.com".into()
}

fn default_anthropic_model() -> String {
    "claude-3-5-sonnet-20241022".into()
}

fn default_storage_bucket() -> String {
    "images".into()
}

fn default_bind_addr() -> String {
    "0.0.0.0:8085".into()
}

fn default_http_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default)]
    pub anthropic_api_key: String,
    #[serde(default = "default_anthropic_api_base")]
    pub anthropic_api_base: String,
    #[serde(default = "default_anthropic_model")]
    pub anthropic_model: String,
    #[serde(default)]
    pub supabase_url: String,
    #[serde(default)]
    pub supabase_anon_key: String,
    #[serde(default = "default_storage_bucket")]
    pub storage_bucket: String,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

impl Settings {
    pub fn new() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::default())
            .build()?
            .try_deserialize()
    }

    /// The hosted-model key, or `None` when it is empty or still the placeholder.
    pub fn anthropic_key(&self) -> Option<&str> {
        let key = self.anthropic_api_key.trim();
        if key.is_empty() || key == PLACEHOLDER_API_KEY {
            None
        } else {
            Some(key)
        }
    }

    /// Fails when the backend project URL or anon key is missing.
    pub fn require_backend(&self) -> Result<(), config::ConfigError> {
        if self.supabase_url.trim().is_empty() {
            return Err(config::ConfigError::NotFound("supabase_url".into()));
        }
        if self.supabase_anon_key.trim().is_empty() {
            return Err(config::ConfigError::NotFound("supabase_anon_key".into()));
        }
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            anthropic_api_key: String::new(),
            anthropic_api_base: default_anthropic_api_base(),
            anthropic_model: default_anthropic_model(),
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            storage_bucket: default_storage_bucket(),
            bind_addr: default_bind_addr(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for var in [
            "ANTHROPIC_API_KEY",
            "ANTHROPIC_API_BASE",
            "ANTHROPIC_MODEL",
            "SUPABASE_URL",
            "SUPABASE_ANON_KEY",
            "STORAGE_BUCKET",
            "BIND_ADDR",
            "HTTP_TIMEOUT_SECS",
        ] {
            std::env::remove_var(var);
        }
    }

    #[serial]
    #[test]
    fn defaults_when_env_is_empty() {
        clear_env();
        let s = Settings::new().unwrap();
        assert_eq!(s.anthropic_api_base, "https://api.anthropic.com");
        assert_eq!(s.storage_bucket, "images");
        assert_eq!(s.http_timeout_secs, 120);
        assert!(s.anthropic_key().is_none());
        assert!(s.require_backend().is_err());
    }

    #[serial]
    #[test]
    fn reads_environment() {
        clear_env();
        std::env::set_var("ANTHROPIC_API_KEY", "sk-test");
        std::env::set_var("SUPABASE_URL", "https://proj.supabase.co");
        std::env::set_var("SUPABASE_ANON_KEY", "anon");
        let s = Settings::new().unwrap();
        assert_eq!(s.anthropic_key(), Some("sk-test"));
        assert!(s.require_backend().is_ok());
        clear_env();
    }

    #[test]
    fn placeholder_key_counts_as_missing() {
        let s = Settings {
            anthropic_api_key: PLACEHOLDER_API_KEY.into(),
            ..Settings::default()
        };
        assert!(s.anthropic_key().is_none());
    }
}
