use crate::error::QrFormError;

pub const DEFAULT_PUBLIC_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;

pub const ENV_PUBLIC_API_URL: &str = "QRFORM_PUBLIC_API_URL";
pub const ENV_API_URL: &str = "QRFORM_API_URL";
pub const ENV_HOST: &str = "QRFORM_HOST";
pub const ENV_PORT: &str = "QRFORM_PORT";

/// Deploy-time settings of the front-end.
#[derive(Clone, Debug, PartialEq)]
pub struct FrontendConfig {
    /// Base URL the form posts submissions to.
    pub public_api_url: String,
    /// Backend origin that `/api/proxy/*` is rewritten to.
    pub api_url: Option<String>,
    pub host: String,
    pub port: u16,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            public_api_url: DEFAULT_PUBLIC_API_URL.into(),
            api_url: None,
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
        }
    }
}

impl FrontendConfig {
    /// Loads the configuration from the process environment.
    pub fn from_env() -> Result<Self, QrFormError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, starting from defaults.
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, QrFormError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(v) = get(ENV_PUBLIC_API_URL) {
            config.public_api_url = validate_origin(ENV_PUBLIC_API_URL, &v)?;
        }
        if let Some(v) = get(ENV_API_URL) {
            config.api_url = Some(validate_origin(ENV_API_URL, &v)?);
        }
        if let Some(v) = get(ENV_HOST) {
            config.host = v;
        }
        if let Some(v) = get(ENV_PORT) {
            config.port = v
                .trim()
                .parse()
                .map_err(|_| QrFormError::Config(format!("{ENV_PORT} is not a port: `{v}`")))?;
        }

        Ok(config)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn validate_origin(key: &str, value: &str) -> Result<String, QrFormError> {
    let value = value.trim();
    url::Url::parse(value)
        .map_err(|e| QrFormError::Config(format!("{key} is not a URL ({e}): `{value}`")))?;
    Ok(value.trim_end_matches('/').to_string())
}
