use crate::driver::{DnsDriver, DriverError, Record, Zone};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use trust_dns_proto::rr::RecordType;

/// The serializable zone table behind an [`InMemoryDriver`].
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct ZoneTable {
    zones: BTreeMap<String, StoredZone>,
    next_record_id: u64,
}

#[derive(Default, Debug, Clone, Serialize, Deserialize)]
struct StoredZone {
    domain: String,
    records: BTreeMap<String, Record>,
}

/// The `"dummy"` driver: an in-process DNS provider.
///
/// Zone ids are the zone's domain; record ids are allocated sequentially.
#[derive(Default, Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct InMemoryDriver {
    table: RwLock<ZoneTable>,
}

impl InMemoryDriver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_table(table: ZoneTable) -> Self {
        Self {
            table: RwLock::new(table),
        }
    }

    /// A copy of the current zone table.
    #[must_use]
    pub fn snapshot(&self) -> ZoneTable {
        self.table.read().clone()
    }

    #[must_use]
    pub fn into_table(self) -> ZoneTable {
        self.table.into_inner()
    }

    /// Swap in `table` wholesale.
    pub fn replace(&self, table: ZoneTable) {
        *self.table.write() = table;
    }
}

impl DnsDriver for InMemoryDriver {
    fn name(&self) -> &'static str {
        "dummy"
    }

    fn list_zones(&self) -> Result<Vec<Zone>, DriverError> {
        Ok(self
            .table
            .read()
            .zones
            .iter()
            .map(|(id, zone)| Zone {
                id: id.clone(),
                domain: zone.domain.clone(),
            })
            .collect())
    }

    fn list_records(&self, zone: &Zone) -> Result<Vec<Record>, DriverError> {
        self.table
            .read()
            .zones
            .get(&zone.id)
            .map(|stored| stored.records.values().cloned().collect())
            .ok_or_else(|| DriverError::ZoneDoesNotExist(zone.id.clone()))
    }

    fn create_record(
        &self,
        zone: &Zone,
        name: &str,
        record_type: RecordType,
        data: &str,
    ) -> Result<Record, DriverError> {
        let mut table = self.table.write();
        table.next_record_id += 1;
        let id = format!("record-{}", table.next_record_id);
        let stored = table
            .zones
            .get_mut(&zone.id)
            .ok_or_else(|| DriverError::ZoneDoesNotExist(zone.id.clone()))?;
        let record = Record {
            id: id.clone(),
            zone_id: zone.id.clone(),
            name: name.to_string(),
            record_type,
            data: data.to_string(),
        };
        stored.records.insert(id, record.clone());
        Ok(record)
    }

    fn delete_record(&self, record: &Record) -> Result<(), DriverError> {
        self.table
            .write()
            .zones
            .get_mut(&record.zone_id)
            .and_then(|stored| stored.records.remove(&record.id))
            .map(|_| ())
            .ok_or_else(|| DriverError::RecordDoesNotExist(record.id.clone()))
    }

    fn create_zone(&self, domain: &str) -> Result<Zone, DriverError> {
        let mut table = self.table.write();
        if table.zones.contains_key(domain) {
            return Err(DriverError::ZoneAlreadyExists(domain.to_string()));
        }
        table.zones.insert(
            domain.to_string(),
            StoredZone {
                domain: domain.to_string(),
                records: BTreeMap::default(),
            },
        );
        Ok(Zone {
            id: domain.to_string(),
            domain: domain.to_string(),
        })
    }

    fn delete_zone(&self, zone: &Zone) -> Result<(), DriverError> {
        self.table
            .write()
            .zones
            .remove(&zone.id)
            .map(|_| ())
            .ok_or_else(|| DriverError::ZoneDoesNotExist(zone.id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_and_record_crud() {
        let driver = InMemoryDriver::new();
        let zone = driver.create_zone("example.com").unwrap();
        assert_eq!(driver.list_zones().unwrap(), vec![zone.clone()]);
        assert!(matches!(
            driver.create_zone("example.com"),
            Err(DriverError::ZoneAlreadyExists(_))
        ));

        let first = driver
            .create_record(&zone, "_acme-challenge", RecordType::TXT, "one")
            .unwrap();
        let second = driver
            .create_record(&zone, "_acme-challenge", RecordType::TXT, "two")
            .unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(driver.list_records(&zone).unwrap().len(), 2);

        driver.delete_record(&first).unwrap();
        assert_eq!(driver.list_records(&zone).unwrap(), vec![second]);
        assert!(matches!(
            driver.delete_record(&first),
            Err(DriverError::RecordDoesNotExist(_))
        ));
    }

    #[test]
    fn deleted_zone_is_gone() {
        let driver = InMemoryDriver::new();
        let zone = driver.create_zone("example.com").unwrap();
        driver.delete_zone(&zone).unwrap();
        assert!(driver.list_zones().unwrap().is_empty());
        assert!(matches!(
            driver.list_records(&zone),
            Err(DriverError::ZoneDoesNotExist(_))
        ));
        assert!(matches!(
            driver.create_record(&zone, "x", RecordType::TXT, "y"),
            Err(DriverError::ZoneDoesNotExist(_))
        ));
    }
}
