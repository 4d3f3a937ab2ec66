use linkweave_core::CoreError;

/// Configuration for the HTTP creation client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpClientConfig {
    /// Base URL of the remote repository
    pub server_url: String,
    /// Timeout in seconds for a single request
    pub timeout_secs: u64,
    /// Bearer token sent with every request
    pub token: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://0.0.0.0:3333".to_string(),
            timeout_secs: 30,
            token: None,
        }
    }
}

impl HttpClientConfig {
    /// Defaults overridden by `LINKWEAVE_SERVER_URL`, `LINKWEAVE_TIMEOUT_SECS` and `LINKWEAVE_TOKEN`.
    ///
    /// A `.env` file is loaded first if present.
    pub fn from_env() -> Result<Self, CoreError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("LINKWEAVE_SERVER_URL") {
            config.server_url = url.trim().trim_end_matches('/').to_string();
        }
        if let Some(raw) = lookup("LINKWEAVE_TIMEOUT_SECS") {
            config.timeout_secs = raw.trim().parse().map_err(|e| {
                CoreError::ConfigurationError(format!("invalid value for LINKWEAVE_TIMEOUT_SECS: {e}"))
            })?;
        }
        config.token = lookup("LINKWEAVE_TOKEN").filter(|t| !t.is_empty());

        Ok(config)
    }
}
