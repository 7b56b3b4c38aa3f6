//! `tls-sni-01` responder.
//!
//! The authority connects to the server name being validated with SNI set to the response's
//! [`z_domain`][crate::challenge::TlsSni01Response::z_domain] and expects a certificate naming
//! it. [`TlsSniResponder`] keeps one indicator certificate per `z_domain` in a shared table, and
//! [`TlsSniResponder::wrap_host_map`] lays that table over the TLS server's own host map so SNI
//! lookups resolve indicator certificates without the server special-casing challenge traffic.

use crate::challenge::{CertifiedKey, Challenge, ChallengeType, Response};
use crate::error::Error;
use crate::layered::{Layered, Mapping};
use crate::responder::Responder;
use crate::util::{KeyGenerator, KeyType, RandomKeys};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A shared `server name -> certificate and key` table.
pub type HostMap = Arc<RwLock<HashMap<String, Arc<CertifiedKey>>>>;

pub struct TlsSniResponder {
    indicators: HostMap,
    key_generator: Arc<dyn KeyGenerator>,
    key_type: KeyType,
}

impl TlsSniResponder {
    /// A responder generating random [`KeyType::EcdsaP256`] indicator keys.
    #[must_use]
    pub fn new() -> Self {
        Self::with_key_generator(RandomKeys, KeyType::default())
    }

    /// A responder drawing indicator keys of `key_type` from `key_generator`.
    pub fn with_key_generator(
        key_generator: impl KeyGenerator + 'static,
        key_type: KeyType,
    ) -> Self {
        Self {
            indicators: HostMap::default(),
            key_generator: Arc::new(key_generator),
            key_type,
        }
    }

    /// The indicator certificates currently installed, keyed by `z_domain`.
    #[must_use]
    pub fn indicators(&self) -> &HostMap {
        &self.indicators
    }

    /// Compose the indicator table over `host_map`.
    ///
    /// The returned view resolves `z_domain` names to indicator certificates while they are
    /// installed; every other name falls through to `host_map` untouched.
    pub fn wrap_host_map<M>(&self, host_map: M) -> Layered<HostMap, M>
    where
        M: Mapping<Key = String, Value = Arc<CertifiedKey>>,
    {
        Layered::new(self.indicators.clone(), host_map)
    }
}

impl Default for TlsSniResponder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TlsSniResponder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsSniResponder")
            .field("indicators", &self.indicators.read().len())
            .field("key_type", &self.key_type)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Responder for TlsSniResponder {
    fn challenge_type(&self) -> ChallengeType {
        ChallengeType::TlsSni01
    }

    async fn start_responding(
        &self,
        server_name: &str,
        _challenge: &Challenge,
        response: &Response,
    ) -> Result<(), Error> {
        let response = response.as_tls_sni01()?;
        let z_domain = response.z_domain();
        if self.indicators.read().contains_key(&z_domain) {
            tracing::debug!("already responding for \"{server_name}\" at \"{z_domain}\"");
            return Ok(());
        }

        let key_pair = self.key_generator.generate(self.key_type)?;
        let certified = Arc::new(response.gen_cert(&key_pair)?);
        self.indicators
            .write()
            .entry(z_domain.clone())
            .or_insert(certified);
        tracing::info!("responding for \"{server_name}\" at \"{z_domain}\"");
        Ok(())
    }

    async fn stop_responding(
        &self,
        server_name: &str,
        _challenge: &Challenge,
        response: &Response,
    ) -> Result<(), Error> {
        let z_domain = response.as_tls_sni01()?.z_domain();
        if self.indicators.write().remove(&z_domain).is_some() {
            tracing::info!("stopped responding for \"{server_name}\" at \"{z_domain}\"");
        }
        Ok(())
    }
}
