//! DNS provider drivers.
//!
//! The [DNS-01 responder][crate::responder::dns] depends only on the zone and record CRUD
//! surface described by [`DnsDriver`], never on a vendor SDK. Calls are blocking network
//! operations; the responder runs them on a [`WorkerPool`][crate::pool::WorkerPool].
//!
//! Two implementations are provided, [`memory::InMemoryDriver`] and [`file::FileDriver`]. The
//! former is the `"dummy"` driver: zones live in process memory and are lost on exit. The latter
//! writes its zone table to a JSON file after each update and loads it again on startup.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Debug;
use std::sync::Arc;
use trust_dns_proto::rr::RecordType;

pub mod file;
pub mod memory;

pub use file::FileDriver;
pub use memory::InMemoryDriver;

/// A DNS zone managed by a provider.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    pub id: String,
    pub domain: String,
}

/// A resource record inside a [`Zone`]. `name` is relative to the zone's domain.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: String,
    pub zone_id: String,
    pub name: String,
    pub record_type: RecordType,
    pub data: String,
}

/// Errors reported by a [`DnsDriver`].
#[derive(thiserror::Error, Debug)]
pub enum DriverError {
    #[error("zone \"{0}\" does not exist")]
    ZoneDoesNotExist(String),

    #[error("zone \"{0}\" already exists")]
    ZoneAlreadyExists(String),

    #[error("record \"{0}\" does not exist")]
    RecordDoesNotExist(String),

    #[error("authentication with the DNS provider failed: {0}")]
    Authentication(String),

    #[error("DNS provider IO error")]
    Io(#[from] std::io::Error),

    #[error("invalid DNS provider state")]
    InvalidJson(#[from] serde_json::Error),
}

/// The zone and record CRUD surface of a DNS provider.
///
/// Every method may block on network IO.
pub trait DnsDriver: Send + Sync + Debug {
    /// Returns the driver name (e.g. `"dummy"`).
    fn name(&self) -> &'static str;

    fn list_zones(&self) -> Result<Vec<Zone>, DriverError>;

    fn list_records(&self, zone: &Zone) -> Result<Vec<Record>, DriverError>;

    fn create_record(
        &self,
        zone: &Zone,
        name: &str,
        record_type: RecordType,
        data: &str,
    ) -> Result<Record, DriverError>;

    fn delete_record(&self, record: &Record) -> Result<(), DriverError>;

    fn create_zone(&self, domain: &str) -> Result<Zone, DriverError>;

    fn delete_zone(&self, zone: &Zone) -> Result<(), DriverError>;
}

/// `DynDriver` is a type alias for a [`DnsDriver`] shared between responders and the worker
/// threads executing its calls.
#[allow(clippy::module_name_repetitions)]
pub type DynDriver = Arc<dyn DnsDriver>;

/// Selects the driver implementation to [`connect`] to.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DriverName {
    Dummy,
    File,
}

/// Provider credentials. The bundled drivers don't authenticate and ignore them.
#[derive(Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Construct the named driver.
///
/// `state_path` is required by [`DriverName::File`].
///
/// # Errors
///
/// Returns [`DriverError::Io`] if the file driver's state can't be opened or created, and
/// [`DriverError::InvalidJson`] if existing state can't be parsed.
pub fn connect(
    name: DriverName,
    _credentials: &Credentials,
    state_path: Option<&str>,
) -> Result<DynDriver, DriverError> {
    match (name, state_path) {
        (DriverName::Dummy, _) => Ok(Arc::new(InMemoryDriver::new())),
        (DriverName::File, Some(path)) => Ok(Arc::new(FileDriver::try_from_file(path)?)),
        (DriverName::File, None) => Err(DriverError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "the file driver requires a state path",
        ))),
    }
}
