//! A JSON file-backed implementation of the [`DnsDriver`][super::DnsDriver] trait.
//!
//! Wraps a [`InMemoryDriver`][super::memory::InMemoryDriver] instance, persisting
//! updates to a JSON file on disk that can be reloaded across restarts.
use crate::driver::memory::{InMemoryDriver, ZoneTable};
use crate::driver::{DnsDriver, DriverError, Record, Zone};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use trust_dns_proto::rr::RecordType;

/// A file-backed DNS provider. After each update a JSON file on disk is rewritten with the
/// zone table. This file can be reloaded across restarts to avoid losing state.
///
/// Wraps a [`InMemoryDriver`][super::memory::InMemoryDriver], operating the same way except
/// for maintaining state beyond in-memory.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct FileDriver {
    driver: InMemoryDriver,
    path: PathBuf,
    // Held across stage-save-commit so saves land in mutation order.
    save_lock: Mutex<()>,
}

impl FileDriver {
    /// Save the zone table as JSON to the driver's configured path, or return an Error.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::InvalidJson`] if the table can't be serialized to JSON.
    ///
    /// Returns [`DriverError::Io`] if the serialized state can't be written to the backing
    /// file path.
    pub fn save(&self) -> Result<(), DriverError> {
        let _guard = self.save_lock.lock();
        self.write_state(&self.driver.snapshot())
    }

    /// Load a [`FileDriver`] from the JSON zone table located at the given path, creating an
    /// empty table there if the file doesn't exist, or return an Error.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::InvalidJson`] if the JSON state file is invalid.
    ///
    /// Returns [`DriverError::Io`] if the path can't be opened, created or read.
    pub fn try_from_file(p: impl AsRef<Path>) -> Result<Self, DriverError> {
        let p = p.as_ref();
        let contents = match File::open(p) {
            Ok(mut f) => {
                let mut buf = vec![];
                f.read_to_end(&mut buf)?;
                buf
            }
            Err(err) => match err.kind() {
                ErrorKind::NotFound => Self::write_empty_state(File::create(p)?)?,
                _ => return Err(DriverError::Io(err)),
            },
        };

        let table: ZoneTable = serde_json::from_slice(&contents)?;
        Ok(Self {
            driver: InMemoryDriver::from_table(table),
            path: p.to_path_buf(),
            save_lock: Mutex::default(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_empty_state(mut f: File) -> Result<Vec<u8>, DriverError> {
        let default_data = serde_json::to_string_pretty(&ZoneTable::default())?;
        let default_bytes = default_data.as_bytes();
        f.write_all(default_bytes)?;
        f.flush()?;
        Ok(default_bytes.to_vec())
    }

    fn write_state(&self, table: &ZoneTable) -> Result<(), DriverError> {
        let data = serde_json::to_string_pretty(table)?;
        let mut output_file = File::create(&self.path)?;
        output_file.write_all(data.as_bytes())?;
        output_file.flush()?;
        Ok(())
    }

    // The op runs against a staged copy of the table. Memory only changes once the new state
    // is on disk, so a failed save leaves both as they were.
    fn mutate<T>(
        &self,
        op: impl FnOnce(&InMemoryDriver) -> Result<T, DriverError>,
    ) -> Result<T, DriverError> {
        let _guard = self.save_lock.lock();
        let staged = InMemoryDriver::from_table(self.driver.snapshot());
        let result = op(&staged)?;
        let table = staged.into_table();
        self.write_state(&table)?;
        self.driver.replace(table);
        Ok(result)
    }
}

impl DnsDriver for FileDriver {
    fn name(&self) -> &'static str {
        "file"
    }

    fn list_zones(&self) -> Result<Vec<Zone>, DriverError> {
        self.driver.list_zones()
    }

    fn list_records(&self, zone: &Zone) -> Result<Vec<Record>, DriverError> {
        self.driver.list_records(zone)
    }

    fn create_record(
        &self,
        zone: &Zone,
        name: &str,
        record_type: RecordType,
        data: &str,
    ) -> Result<Record, DriverError> {
        self.mutate(|driver| driver.create_record(zone, name, record_type, data))
    }

    fn delete_record(&self, record: &Record) -> Result<(), DriverError> {
        self.mutate(|driver| driver.delete_record(record))
    }

    fn create_zone(&self, domain: &str) -> Result<Zone, DriverError> {
        self.mutate(|driver| driver.create_zone(domain))
    }

    fn delete_zone(&self, zone: &Zone) -> Result<(), DriverError> {
        self.mutate(|driver| driver.delete_zone(zone))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zones.json");
        let driver = FileDriver::try_from_file(&path).unwrap();
        assert!(driver.list_zones().unwrap().is_empty());
        assert!(path.exists());
    }

    #[test]
    fn state_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zones.json");
        let record = {
            let driver = FileDriver::try_from_file(&path).unwrap();
            let zone = driver.create_zone("example.com").unwrap();
            driver
                .create_record(&zone, "_acme-challenge.sub", RecordType::TXT, "value")
                .unwrap()
        };

        let reloaded = FileDriver::try_from_file(&path).unwrap();
        let zones = reloaded.list_zones().unwrap();
        assert_eq!(zones.len(), 1);
        assert_eq!(reloaded.list_records(&zones[0]).unwrap(), vec![record.clone()]);

        reloaded.delete_record(&record).unwrap();
        let again = FileDriver::try_from_file(&path).unwrap();
        assert!(again.list_records(&zones[0]).unwrap().is_empty());
    }

    #[test]
    fn failed_save_leaves_state_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zones.json");
        let driver = FileDriver::try_from_file(&path).unwrap();
        let zone = driver.create_zone("example.com").unwrap();

        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();
        assert!(matches!(driver.save(), Err(DriverError::Io(_))));
        assert!(matches!(
            driver.create_record(&zone, "_acme-challenge", RecordType::TXT, "value"),
            Err(DriverError::Io(_))
        ));
        assert!(driver.list_records(&zone).unwrap().is_empty());
        assert!(matches!(
            driver.delete_zone(&zone),
            Err(DriverError::Io(_))
        ));
        assert_eq!(driver.list_zones().unwrap(), vec![zone.clone()]);

        std::fs::remove_dir(&path).unwrap();
        let record = driver
            .create_record(&zone, "_acme-challenge", RecordType::TXT, "value")
            .unwrap();
        let reloaded = FileDriver::try_from_file(&path).unwrap();
        assert_eq!(reloaded.list_records(&zone).unwrap(), vec![record]);
    }

    #[test]
    fn invalid_state_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zones.json");
        std::fs::write(&path, b"not json").unwrap();
        assert!(matches!(
            FileDriver::try_from_file(&path),
            Err(DriverError::InvalidJson(_))
        ));
    }
}
