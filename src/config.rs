use std::time::Duration;

/// Connection settings shared by all backends. Each backend picks the
/// options it understands and ignores the rest.
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    connection_timeout: Option<Duration>,
    bucket: Option<String>,
    username: Option<String>,
    password: Option<String>,
    token: Option<String>,
    tls: bool,
}

impl StoreConfig {
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder::default()
    }

    pub fn connection_timeout(&self) -> Option<Duration> {
        self.connection_timeout
    }

    /// BoltDB bucket the record lives in.
    pub fn bucket(&self) -> Option<&str> {
        self.bucket.as_deref()
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Consul ACL token.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn tls(&self) -> bool {
        self.tls
    }

    /// Username/password pair, only when both are set.
    pub(crate) fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username(), self.password()) {
            (Some(u), Some(p)) => Some((u, p)),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct StoreConfigBuilder {
    config: StoreConfig,
}

impl StoreConfigBuilder {
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.connection_timeout = Some(timeout);
        self
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.config.bucket = Some(bucket.into());
        self
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.config.username = Some(username.into());
        self.config.password = Some(password.into());
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.config.token = Some(token.into());
        self
    }

    /// Use `https` for Consul endpoints without a scheme. Other backends
    /// refuse to connect with this set.
    pub fn with_tls(mut self, tls: bool) -> Self {
        self.config.tls = tls;
        self
    }

    pub fn build(self) -> StoreConfig {
        self.config
    }
}

/// Describes where the ACME record lives: backend name, endpoint addresses
/// and connection settings. Nothing is validated until a fetch is started.
#[derive(Debug, Clone)]
pub struct KvBackend {
    pub(crate) name: String,
    pub(crate) endpoints: Vec<String>,
    pub(crate) config: StoreConfig,
}

impl KvBackend {
    pub fn builder() -> KvBackendBuilder {
        KvBackendBuilder::default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}

#[derive(Default, Debug)]
pub struct KvBackendBuilder {
    name: Option<String>,
    endpoints: Vec<String>,
    config: Option<StoreConfig>,
}

impl KvBackendBuilder {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_endpoints<E: AsRef<str>, S: AsRef<[E]>>(mut self, endpoints: S) -> Self {
        self.endpoints = endpoints
            .as_ref()
            .iter()
            .map(|e| e.as_ref().to_string())
            .collect();
        self
    }

    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> KvBackend {
        KvBackend {
            name: self.name.unwrap_or_default(),
            endpoints: self.endpoints,
            config: self.config.unwrap_or_default(),
        }
    }
}
