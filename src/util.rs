//! Key generation helpers.

use crate::error::Error;
use rcgen::{KeyPair, SignatureAlgorithm};
use serde::{Deserialize, Serialize};

/// The kinds of private key that can be generated.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum KeyType {
    #[default]
    EcdsaP256,
    EcdsaP384,
    Ed25519,
}

impl KeyType {
    #[must_use]
    pub fn algorithm(self) -> &'static SignatureAlgorithm {
        match self {
            KeyType::EcdsaP256 => &rcgen::PKCS_ECDSA_P256_SHA256,
            KeyType::EcdsaP384 => &rcgen::PKCS_ECDSA_P384_SHA384,
            KeyType::Ed25519 => &rcgen::PKCS_ED25519,
        }
    }
}

/// Generate a random private key of the given type.
///
/// # Errors
///
/// Returns [`Error::Certificate`] if the system random source fails.
pub fn generate_private_key(key_type: KeyType) -> Result<KeyPair, Error> {
    Ok(KeyPair::generate_for(key_type.algorithm())?)
}

/// A strategy for producing private keys.
///
/// The [TLS-SNI-01 responder][crate::responder::tls::TlsSniResponder] generates a throwaway key
/// for every indicator certificate it installs. Substituting the generator makes those keys
/// deterministic in tests.
pub trait KeyGenerator: Send + Sync {
    /// Produce a private key of the given type.
    ///
    /// # Errors
    ///
    /// Returns an error if a key can't be produced.
    fn generate(&self, key_type: KeyType) -> Result<KeyPair, Error>;
}

impl<F> KeyGenerator for F
where
    F: Fn(KeyType) -> Result<KeyPair, Error> + Send + Sync,
{
    fn generate(&self, key_type: KeyType) -> Result<KeyPair, Error> {
        self(key_type)
    }
}

/// The default [`KeyGenerator`], backed by [`generate_private_key`].
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomKeys;

impl KeyGenerator for RandomKeys {
    fn generate(&self, key_type: KeyType) -> Result<KeyPair, Error> {
        generate_private_key(key_type)
    }
}
