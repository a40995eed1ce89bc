use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Role of this SCL in the registration pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SclRole {
    /// Parent SCL; accepts registrations.
    Nscl,
    /// Subordinate SCL; registers itself into an NSCL at boot.
    Gscl,
}

impl FromStr for SclRole {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "nscl" | "parent" => Ok(Self::Nscl),
            "gscl" | "subordinate" => Ok(Self::Gscl),
            _ => Err(anyhow::anyhow!("SCL_ROLE must be one of: nscl, gscl")),
        }
    }
}

/// SCL configuration
#[derive(Debug, Clone)]
pub struct SclConfig {
    /// Identifier of this SCL; also its sclBase path segment
    pub scl_id: String,

    pub role: SclRole,

    /// Bind host of the HTTP adapter
    pub host: String,

    /// Bind port of the HTTP adapter
    pub port: u16,

    /// Public base address peers use to reach this SCL
    pub poc: Option<String>,

    /// Identity holding every flag on the default access right
    pub admin_identity: String,

    /// Identity used for unauthenticated requests
    pub guest_identity: String,

    /// Lifetime given to resources created without an expirationTime
    pub default_ttl: Duration,

    pub container_default_instances: i64,

    /// Hard ceiling for a container's maxNrOfInstances
    pub container_max_instances: i64,

    /// Pause between registration attempts
    pub registration_retry: Duration,

    /// Member operations a group fan-out runs at once
    pub fanout_concurrency: usize,

    /// Timeout applied by the outbound HTTP client
    pub request_timeout: Duration,

    /// Parent SCL identifier (GSCL role)
    pub nscl_id: Option<String>,

    /// Parent SCL base address (GSCL role)
    pub nscl_poc: Option<String>,

    /// Tree snapshot written on shutdown and restored on boot
    pub snapshot_path: Option<PathBuf>,
}

impl SclConfig {
    /// Create a configuration with defaults for the given SCL id
    pub fn new(scl_id: &str) -> Self {
        Self {
            scl_id: scl_id.to_string(),
            role: SclRole::Nscl,
            host: "0.0.0.0".to_string(),
            port: 8080,
            poc: None,
            admin_identity: "admin:admin".to_string(),
            guest_identity: "guest:guest".to_string(),
            default_ttl: Duration::from_secs(3600 * 24 * 365),
            container_default_instances: 10,
            container_max_instances: 1000,
            registration_retry: Duration::from_secs(10),
            fanout_concurrency: 1,
            request_timeout: Duration::from_secs(30),
            nscl_id: None,
            nscl_poc: None,
            snapshot_path: None,
        }
    }

    pub fn role(mut self, role: SclRole) -> Self {
        self.role = role;
        self
    }

    pub fn host(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn poc(mut self, poc: &str) -> Self {
        self.poc = Some(poc.to_string());
        self
    }

    pub fn admin_identity(mut self, identity: &str) -> Self {
        self.admin_identity = identity.to_string();
        self
    }

    pub fn guest_identity(mut self, identity: &str) -> Self {
        self.guest_identity = identity.to_string();
        self
    }

    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set the default and the ceiling of a container's instance count
    pub fn container_instances(mut self, default: i64, max: i64) -> Self {
        self.container_default_instances = default;
        self.container_max_instances = max;
        self
    }

    pub fn registration_retry(mut self, interval: Duration) -> Self {
        self.registration_retry = interval;
        self
    }

    pub fn fanout_concurrency(mut self, workers: usize) -> Self {
        self.fanout_concurrency = workers;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Register into the given parent SCL at boot (switches role to GSCL)
    pub fn parent(mut self, nscl_id: &str, nscl_poc: &str) -> Self {
        self.role = SclRole::Gscl;
        self.nscl_id = Some(nscl_id.to_string());
        self.nscl_poc = Some(nscl_poc.to_string());
        self
    }

    pub fn snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    /// Load from `SCL_*` environment variables (and a `.env` file if present)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let scl_id = env::var("SCL_ID").unwrap_or_else(|_| "nscl".to_string());
        let mut config = Self::new(&scl_id);

        if let Ok(raw) = env::var("SCL_ROLE") {
            config.role = raw.parse()?;
        }
        if let Ok(host) = env::var("SCL_HOST") {
            config.host = host;
        }
        config.port = parse_var("SCL_PORT", config.port)?;
        config.poc = env::var("SCL_POC").ok();
        if let Ok(admin) = env::var("SCL_ADMIN") {
            config.admin_identity = admin;
        }
        if let Ok(guest) = env::var("SCL_GUEST") {
            config.guest_identity = guest;
        }
        config.default_ttl = Duration::from_secs(parse_var(
            "SCL_DEFAULT_TTL_SECS",
            config.default_ttl.as_secs(),
        )?);
        config.container_default_instances = parse_var(
            "SCL_CONTAINER_DEFAULT_INSTANCES",
            config.container_default_instances,
        )?;
        config.container_max_instances =
            parse_var("SCL_CONTAINER_MAX_INSTANCES", config.container_max_instances)?;
        config.registration_retry = Duration::from_millis(parse_var(
            "SCL_REGISTRATION_RETRY_MS",
            config.registration_retry.as_millis() as u64,
        )?);
        config.fanout_concurrency =
            parse_var("SCL_FANOUT_CONCURRENCY", config.fanout_concurrency)?;
        config.nscl_id = env::var("NSCL_ID").ok();
        config.nscl_poc = env::var("NSCL_POC").ok();
        config.snapshot_path = env::var("SCL_SNAPSHOT_PATH").ok().map(PathBuf::from);

        Ok(config)
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if self.scl_id.trim().is_empty() || self.scl_id.contains('/') {
            anyhow::bail!("scl_id must be a non-empty path segment");
        }
        if self.container_default_instances < 0
            || self.container_default_instances > self.container_max_instances
        {
            anyhow::bail!(
                "container default instances ({}) must be within 0..={}",
                self.container_default_instances,
                self.container_max_instances
            );
        }
        if self.fanout_concurrency == 0 {
            anyhow::bail!("fanout_concurrency must be at least 1");
        }
        if self.role == SclRole::Gscl && (self.nscl_id.is_none() || self.nscl_poc.is_none()) {
            anyhow::bail!("a GSCL needs NSCL_ID and NSCL_POC to register");
        }
        Ok(())
    }

    /// Base address peers use to reach this SCL
    pub fn public_poc(&self) -> String {
        self.poc
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.host, self.port))
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Path of this SCL's root resource
    pub fn base_uri(&self) -> String {
        format!("/{}", self.scl_id)
    }

    /// Default access right created at bootstrap
    pub fn default_access_right(&self) -> String {
        format!("/{}/accessRights/AR_ADMIN", self.scl_id)
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{} must be a valid {}", name, std::any::type_name::<T>())),
        Err(_) => Ok(default),
    }
}
