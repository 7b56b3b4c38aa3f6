use crate::driver::{self, Credentials, DriverName};
use crate::error::Error;
use crate::pool::{WorkerPool, DEFAULT_MAX_THREADS};
use crate::responder::{DnsResponder, TlsSniResponder};
use crate::util::{KeyType, RandomKeys};
use serde::Deserialize;
use serde_with::{serde_as, DurationSecondsWithFrac};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use trust_dns_proto::rr::Name;

/// Default wait after creating a TXT record before the challenge is answered.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(60);

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
    #[serde(default)]
    pub key_type: KeyType,
    pub dns: Option<DnsConfig>,
}

#[serde_as]
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct DnsConfig {
    pub driver: DriverName,
    #[serde(default)]
    pub credentials: Credentials,
    pub zone_name: Option<String>,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    #[serde(default = "default_settle_delay")]
    pub settle_delay: Duration,
    pub state_path: Option<String>,
}

fn default_worker_threads() -> usize {
    DEFAULT_MAX_THREADS
}

fn default_settle_delay() -> Duration {
    DEFAULT_SETTLE_DELAY
}

impl Config {
    /// Load and validate a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IO`] if the file can't be read, [`Error::InvalidJSON`] if it isn't a
    /// configuration, and [`Error::InvalidConfig`] if its values are inconsistent.
    pub fn try_from_file(p: impl AsRef<Path>) -> Result<Self, Error> {
        let f = File::open(p)?;
        let reader = BufReader::new(f);
        let conf: Config = serde_json::from_reader(reader)?;
        conf.validate()?;
        Ok(conf)
    }

    /// A new worker pool sized by `worker_threads`.
    #[must_use]
    pub fn worker_pool(&self) -> Arc<WorkerPool> {
        Arc::new(WorkerPool::new(self.worker_threads))
    }

    /// A TLS-SNI-01 responder generating indicator keys of the configured type.
    #[must_use]
    pub fn tls_responder(&self) -> TlsSniResponder {
        TlsSniResponder::with_key_generator(RandomKeys, self.key_type)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.worker_threads == 0 {
            return Err(Error::InvalidConfig(
                "worker_threads must be at least 1".to_string(),
            ));
        }
        match &self.dns {
            Some(dns) => dns.validate(),
            None => Ok(()),
        }
    }
}

impl DnsConfig {
    /// Connect the configured driver and build a DNS-01 responder running on `pool`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Driver`] if the driver can't be constructed and [`Error::InvalidName`]
    /// if `zone_name` isn't a valid DNS name.
    pub fn responder(&self, pool: Arc<WorkerPool>) -> Result<DnsResponder, Error> {
        let driver = driver::connect(self.driver, &self.credentials, self.state_path.as_deref())?;
        tracing::debug!("connected DNS driver \"{}\"", driver.name());
        DnsResponder::new(driver, self.zone_name.as_deref(), self.settle_delay, pool)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.driver == DriverName::File && self.state_path.is_none() {
            return Err(Error::InvalidConfig(
                "the file driver requires dns.state_path".to_string(),
            ));
        }
        if let Some(zone_name) = &self.zone_name {
            Name::from_str(zone_name).map_err(|err| Error::InvalidName(zone_name.clone(), err))?;
        }
        Ok(())
    }
}
