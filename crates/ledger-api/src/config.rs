/// Bind address and CORS switch for the REST surface.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub cors_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4000,
            cors_enabled: true,
        }
    }
}

impl ApiConfig {
    /// Reads `API_HOST`, `API_PORT` and `API_CORS_ENABLED`, falling back to
    /// the defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: env_parsed("API_PORT").unwrap_or(defaults.port),
            cors_enabled: env_parsed("API_CORS_ENABLED").unwrap_or(defaults.cors_enabled),
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bind_address() {
        let config = ApiConfig::default();
        assert_eq!(config.address(), "0.0.0.0:4000");
        assert!(config.cors_enabled);
    }
}
