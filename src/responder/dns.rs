//! `dns-01` responder.
//!
//! Publishes the response's validation value as a TXT record at
//! `_acme-challenge.<server name>` inside a zone managed through a [`DnsDriver`], and removes it
//! again afterwards.
//!
//! E.g. responding for `sub.example.com` with the zone `example.com` configured creates a TXT
//! record named `_acme-challenge.sub` in that zone. The zone apex is a valid target: responding
//! for `example.com` itself uses the record name `_acme-challenge`.
//!
//! Driver calls run on a [`WorkerPool`]. After a record is created the responder waits for the
//! configured settle delay before resolving, giving the provider time to propagate the change.

use crate::challenge::{Challenge, ChallengeType, Response};
use crate::driver::{DnsDriver, DynDriver, Record, Zone};
use crate::error::Error;
use crate::pool::WorkerPool;
use crate::responder::Responder;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use trust_dns_proto::rr::{Name, RecordType};

pub struct DnsResponder {
    driver: DynDriver,
    zone_name: Option<String>,
    settle_delay: Duration,
    pool: Arc<WorkerPool>,
}

impl DnsResponder {
    /// Create a responder publishing records through `driver`.
    ///
    /// With a `zone_name` every server name must lie inside that zone. Without one, the longest
    /// zone at the provider that contains the validation name is used.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidName`] if `zone_name` isn't a valid DNS name.
    pub fn new(
        driver: DynDriver,
        zone_name: Option<&str>,
        settle_delay: Duration,
        pool: Arc<WorkerPool>,
    ) -> Result<Self, Error> {
        Ok(Self {
            driver,
            zone_name: zone_name.map(normalize_name).transpose()?,
            settle_delay,
            pool,
        })
    }

    #[must_use]
    pub fn driver(&self) -> &DynDriver {
        &self.driver
    }

    #[must_use]
    pub fn zone_name(&self) -> Option<&str> {
        self.zone_name.as_deref()
    }

    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    /// The normalized validation name for `server_name`, checked against the configured zone.
    fn validation_name(&self, server_name: &str, challenge: &Challenge) -> Result<String, Error> {
        let server_name = normalize_name(server_name)?;
        if let Some(zone_name) = &self.zone_name {
            if !in_zone(&server_name, zone_name) {
                return Err(Error::NotInZone {
                    server_name,
                    zone_name: zone_name.clone(),
                });
            }
        }
        Ok(challenge.validation_domain_name(&server_name))
    }
}

impl std::fmt::Debug for DnsResponder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DnsResponder")
            .field("driver", &self.driver.name())
            .field("zone_name", &self.zone_name)
            .field("settle_delay", &self.settle_delay)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Responder for DnsResponder {
    fn challenge_type(&self) -> ChallengeType {
        ChallengeType::Dns01
    }

    async fn start_responding(
        &self,
        server_name: &str,
        challenge: &Challenge,
        response: &Response,
    ) -> Result<(), Error> {
        let validation = response.as_dns01()?.validation();
        let full_name = self.validation_name(server_name, challenge)?;
        let driver = self.driver.clone();
        let zone_name = self.zone_name.clone();
        let created = self
            .pool
            .run(move || {
                add_txt_record(driver.as_ref(), zone_name.as_deref(), &full_name, &validation)
            })
            .await?;

        match created {
            Some(record) => {
                tracing::info!(
                    "created TXT record \"{}\" in zone \"{}\" for \"{server_name}\"",
                    record.name,
                    record.zone_id
                );
                tokio::time::sleep(self.settle_delay).await;
            }
            None => tracing::debug!("TXT record for \"{server_name}\" already exists"),
        }
        Ok(())
    }

    async fn stop_responding(
        &self,
        server_name: &str,
        challenge: &Challenge,
        response: &Response,
    ) -> Result<(), Error> {
        let validation = response.as_dns01()?.validation();
        let full_name = self.validation_name(server_name, challenge)?;
        let driver = self.driver.clone();
        let zone_name = self.zone_name.clone();
        let removed = self
            .pool
            .run(move || {
                delete_txt_record(driver.as_ref(), zone_name.as_deref(), &full_name, &validation)
            })
            .await?;

        if removed > 0 {
            tracing::info!("removed {removed} TXT record(s) for \"{server_name}\"");
        }
        Ok(())
    }
}

/// Lowercase ASCII form of `name`, without a trailing dot.
fn normalize_name(name: &str) -> Result<String, Error> {
    let parsed = Name::from_str(name).map_err(|err| Error::InvalidName(name.to_string(), err))?;
    let ascii = parsed.to_lowercase().to_ascii();
    let trimmed = ascii.trim_end_matches('.');
    if trimmed.is_empty() {
        return Err(Error::InvalidName(
            name.to_string(),
            "empty name".to_string().into(),
        ));
    }
    Ok(trimmed.to_string())
}

fn in_zone(name: &str, zone_name: &str) -> bool {
    name == zone_name
        || name
            .strip_suffix(zone_name)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// The part of `name` preceding `zone_name`, or `None` when `name` isn't inside the zone.
fn split_zone<'a>(name: &'a str, zone_name: &str) -> Option<&'a str> {
    if name == zone_name {
        return Some("");
    }
    name.strip_suffix(zone_name)?.strip_suffix('.')
}

fn find_zone(
    driver: &dyn DnsDriver,
    zone_name: Option<&str>,
    full_name: &str,
) -> Result<(Zone, String), Error> {
    let mut zones = driver
        .list_zones()?
        .into_iter()
        .filter_map(|zone| zone_domain(&zone).map(|domain| (zone, domain)));
    let (zone, domain) = match zone_name {
        Some(zone_name) => zones
            .find(|(_, domain)| domain == zone_name)
            .ok_or_else(|| Error::ZoneNotFound {
                zone_name: zone_name.to_string(),
            })?,
        None => zones
            .filter(|(_, domain)| in_zone(full_name, domain))
            .max_by_key(|(_, domain)| domain.len())
            .ok_or_else(|| Error::NoZoneFor {
                server_name: full_name.to_string(),
            })?,
    };
    let subdomain = split_zone(full_name, &domain).ok_or_else(|| Error::NotInZone {
        server_name: full_name.to_string(),
        zone_name: domain.clone(),
    })?;
    Ok((zone, subdomain.to_string()))
}

/// The provider's zone domain in the same form as configured names. Zones whose domain isn't
/// a valid DNS name can't hold a validation record and are skipped.
fn zone_domain(zone: &Zone) -> Option<String> {
    match normalize_name(&zone.domain) {
        Ok(domain) => Some(domain),
        Err(err) => {
            tracing::debug!("skipping zone \"{}\": {err}", zone.id);
            None
        }
    }
}

fn existing_records(
    driver: &dyn DnsDriver,
    zone: &Zone,
    subdomain: &str,
    validation: &str,
) -> Result<Vec<Record>, Error> {
    Ok(driver
        .list_records(zone)?
        .into_iter()
        .filter(|record| {
            record.name == subdomain
                && record.record_type == RecordType::TXT
                && record.data == validation
        })
        .collect())
}

fn add_txt_record(
    driver: &dyn DnsDriver,
    zone_name: Option<&str>,
    full_name: &str,
    validation: &str,
) -> Result<Option<Record>, Error> {
    let (zone, subdomain) = find_zone(driver, zone_name, full_name)?;
    if !existing_records(driver, &zone, &subdomain, validation)?.is_empty() {
        return Ok(None);
    }
    let record = driver.create_record(&zone, &subdomain, RecordType::TXT, validation)?;
    Ok(Some(record))
}

fn delete_txt_record(
    driver: &dyn DnsDriver,
    zone_name: Option<&str>,
    full_name: &str,
    validation: &str,
) -> Result<usize, Error> {
    let (zone, subdomain) = find_zone(driver, zone_name, full_name)?;
    let existing = existing_records(driver, &zone, &subdomain, validation)?;
    for record in &existing {
        driver.delete_record(record)?;
    }
    Ok(existing.len())
}
