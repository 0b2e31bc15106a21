//! Client and session configuration.
//!
//! `ClientConfig` is the single input needed to stand up a `CouchClient`.
//! It can be built by hand or read from a Cloud Foundry `VCAP_SERVICES`
//! document.

use reqwest::Url;
use secrecy::SecretString;
use serde::Deserialize;

use crate::defaults;
use crate::error::{CouchError, Result};
use crate::retry::BackOffPolicy;
use crate::types::HttpConfig;

/// Configuration of an `InterceptableSession`.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Maximum number of chain cycles for one logical request. Values below
    /// one are treated as one.
    pub max_attempts: u32,
    /// Replay policy for `429 Too Many Requests`; `None` delivers 429 as is.
    pub back_off: Option<BackOffPolicy>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::session::MAX_ATTEMPTS,
            back_off: None,
        }
    }
}

impl SessionConfig {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_back_off(mut self, policy: BackOffPolicy) -> Self {
        self.back_off = Some(policy);
        self
    }

    pub(crate) fn effective_max_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Username and password used for session-cookie authentication.
#[derive(Debug)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }
}

/// Everything needed to build a `CouchClient`.
#[derive(Debug)]
pub struct ClientConfig {
    /// Root URL of the server, e.g. `https://account.cloudant.com`
    pub url: Url,
    /// Credentials for cookie authentication; `None` sends requests unauthenticated
    pub credentials: Option<Credentials>,
    pub http: HttpConfig,
    pub session: SessionConfig,
    /// Width of the operation scheduler
    pub max_concurrent_operations: usize,
}

impl ClientConfig {
    pub fn builder(url: impl AsRef<str>) -> ClientConfigBuilder {
        ClientConfigBuilder::new(url)
    }

    /// Build a configuration from the contents of the Cloud Foundry
    /// `VCAP_SERVICES` environment variable.
    ///
    /// When `instance_name` is `None` the document must contain exactly one
    /// Cloudant service.
    pub fn from_vcap_services(vcap_services: &str, instance_name: Option<&str>) -> Result<Self> {
        #[derive(Deserialize)]
        struct VcapDocument {
            #[serde(rename = "cloudantNoSQLDB")]
            cloudant: Option<Vec<VcapService>>,
        }
        #[derive(Deserialize)]
        struct VcapService {
            name: Option<String>,
            credentials: Option<VcapCredentials>,
        }
        #[derive(Deserialize)]
        struct VcapCredentials {
            url: Option<String>,
        }

        let document: VcapDocument = serde_json::from_str(vcap_services).map_err(|e| {
            CouchError::Configuration(format!("VCAP_SERVICES is not valid JSON: {e}"))
        })?;
        let services = document.cloudant.ok_or_else(|| {
            CouchError::Configuration("VCAP_SERVICES has no cloudantNoSQLDB service".into())
        })?;

        let service = match instance_name {
            None if services.len() == 1 => services.into_iter().next(),
            None => {
                return Err(CouchError::Configuration(
                    "instance name is required when several Cloudant services are bound".into(),
                ));
            }
            Some(name) => services
                .into_iter()
                .find(|s| s.name.as_deref() == Some(name)),
        }
        .ok_or_else(|| {
            CouchError::Configuration("Cloudant service instance not found in VCAP_SERVICES".into())
        })?;

        let raw_url = service
            .credentials
            .and_then(|c| c.url)
            .ok_or_else(|| CouchError::Configuration("Cloudant service has no credentials URL".into()))?;

        let mut url =
            Url::parse(&raw_url).map_err(|e| CouchError::InvalidUrl(format!("{raw_url}: {e}")))?;

        // Credentials embedded in the URL become cookie-auth credentials and
        // are stripped from the root URL.
        let credentials = if url.username().is_empty() {
            None
        } else {
            let username = urlencoding::decode(url.username())
                .map_err(|e| CouchError::Configuration(e.to_string()))?
                .into_owned();
            let password = urlencoding::decode(url.password().unwrap_or_default())
                .map_err(|e| CouchError::Configuration(e.to_string()))?
                .into_owned();
            let _ = url.set_username("");
            let _ = url.set_password(None);
            Some(Credentials::new(username, password))
        };

        Ok(Self {
            url,
            credentials,
            http: HttpConfig::default(),
            session: SessionConfig::default(),
            max_concurrent_operations: defaults::queue::MAX_CONCURRENT_OPERATIONS,
        })
    }
}

/// Builder for `ClientConfig`
#[derive(Debug)]
pub struct ClientConfigBuilder {
    url: String,
    credentials: Option<Credentials>,
    http: Option<HttpConfig>,
    session: SessionConfig,
    max_concurrent_operations: Option<usize>,
}

impl ClientConfigBuilder {
    pub fn new(url: impl AsRef<str>) -> Self {
        Self {
            url: url.as_ref().to_string(),
            credentials: None,
            http: None,
            session: SessionConfig::default(),
            max_concurrent_operations: None,
        }
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::new(username, password));
        self
    }

    pub fn http_config(mut self, http: HttpConfig) -> Self {
        self.http = Some(http);
        self
    }

    pub fn session_config(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// Enable replaying requests answered with 429.
    pub fn back_off(mut self, policy: BackOffPolicy) -> Self {
        self.session.back_off = Some(policy);
        self
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.session.max_attempts = max_attempts;
        self
    }

    pub fn max_concurrent_operations(mut self, n: usize) -> Self {
        self.max_concurrent_operations = Some(n);
        self
    }

    pub fn build(self) -> Result<ClientConfig> {
        let url = Url::parse(&self.url)
            .map_err(|e| CouchError::InvalidUrl(format!("{}: {e}", self.url)))?;
        if url.cannot_be_a_base() {
            return Err(CouchError::InvalidUrl(format!(
                "{} cannot be used as a root URL",
                self.url
            )));
        }
        let max_concurrent_operations = self
            .max_concurrent_operations
            .unwrap_or(defaults::queue::MAX_CONCURRENT_OPERATIONS);
        if max_concurrent_operations == 0 {
            return Err(CouchError::Configuration(
                "max_concurrent_operations must be at least 1".into(),
            ));
        }
        Ok(ClientConfig {
            url,
            credentials: self.credentials,
            http: self.http.unwrap_or_default(),
            session: self.session,
            max_concurrent_operations,
        })
    }
}
