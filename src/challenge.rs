//! Challenges issued by an ACME certificate authority and the responses that satisfy them.
//!
//! The [ACME client][RFC-8555] that fetches challenges from the authority is external to this
//! crate. It constructs a [`Challenge`] from the authority's challenge object, derives a
//! [`Response`] with its [`AccountKey`], and hands both to a
//! [`Responder`][crate::responder::Responder].
//!
//! [RFC-8555]: https://www.rfc-editor.org/rfc/rfc8555

use crate::error::Error;
use crate::util::{generate_private_key, KeyType};
use base64::engine::general_purpose;
use base64::{alphabet, engine, DecodeError, Engine};
use lazy_static::lazy_static;
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use x509_parser::prelude::GeneralName;

const TOKEN_DECODED_LEN_BYTES: usize = 32;

const DNS01_LABEL: &str = "_acme-challenge";

const HTTP01_PATH_PREFIX: &str = "/.well-known/acme-challenge/";

const TLS_SNI01_SUFFIX: &str = "acme.invalid";

lazy_static! {
    static ref BASE64_ENGINE: engine::GeneralPurpose =
        engine::GeneralPurpose::new(&alphabet::URL_SAFE, general_purpose::NO_PAD);
}

/// The challenge types a responder can satisfy.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChallengeType {
    #[serde(rename = "tls-sni-01")]
    TlsSni01,
    #[serde(rename = "dns-01")]
    Dns01,
    #[serde(rename = "http-01")]
    Http01,
}

impl ChallengeType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ChallengeType::TlsSni01 => "tls-sni-01",
            ChallengeType::Dns01 => "dns-01",
            ChallengeType::Http01 => "http-01",
        }
    }
}

impl fmt::Display for ChallengeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum TokenError {
    #[error("invalid encoding: {0}")]
    InvalidEncoding(DecodeError),
    #[error("invalid decoded length: found {actual} bytes, expected {expected}")]
    InvalidDecodedLength { actual: usize, expected: usize },
}

/// A challenge token: 32 random bytes chosen by the authority, base64url encoded without padding.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Token(String);

impl Token {
    #[must_use]
    pub fn from_bytes(raw: &[u8; TOKEN_DECODED_LEN_BYTES]) -> Self {
        Token(BASE64_ENGINE.encode(raw))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Token {
    type Error = TokenError;

    fn try_from(encoded: String) -> Result<Self, Self::Error> {
        match BASE64_ENGINE.decode(&encoded) {
            Ok(raw) => match raw.len() {
                TOKEN_DECODED_LEN_BYTES => Ok(Token(encoded)),
                _ => Err(TokenError::InvalidDecodedLength {
                    actual: raw.len(),
                    expected: TOKEN_DECODED_LEN_BYTES,
                }),
            },
            Err(err) => Err(TokenError::InvalidEncoding(err)),
        }
    }
}

impl From<Token> for String {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An ACME account key pair.
///
/// Only the public half matters to responders: its [JWK thumbprint][RFC-7638] binds a
/// challenge token to the account in the key authorization.
///
/// [RFC-7638]: https://www.rfc-editor.org/rfc/rfc7638
pub struct AccountKey {
    key_pair: KeyPair,
}

impl AccountKey {
    /// Generate a new random account key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Certificate`] if key generation fails.
    pub fn generate(key_type: KeyType) -> Result<Self, Error> {
        Ok(Self {
            key_pair: generate_private_key(key_type)?,
        })
    }

    /// Load an account key from a PKCS#8 PEM document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Certificate`] if the PEM can't be parsed as a supported key.
    pub fn from_pem(pem: &str) -> Result<Self, Error> {
        Ok(Self {
            key_pair: KeyPair::from_pem(pem)?,
        })
    }

    #[must_use]
    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    /// The base64url encoded SHA-256 digest of the key's canonical JWK.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedKey`] for key algorithms without a JWK form here.
    pub fn thumbprint(&self) -> Result<String, Error> {
        let jwk = self.canonical_jwk()?;
        Ok(BASE64_ENGINE.encode(Sha256::digest(jwk.as_bytes())))
    }

    // Members in lexicographic order with no whitespace, per RFC 7638 section 3.
    fn canonical_jwk(&self) -> Result<String, Error> {
        let alg = self.key_pair.algorithm();
        let raw = self.key_pair.public_key_raw();
        if alg == &rcgen::PKCS_ED25519 {
            return Ok(format!(
                r#"{{"crv":"Ed25519","kty":"OKP","x":"{}"}}"#,
                BASE64_ENGINE.encode(raw)
            ));
        }
        let crv = if alg == &rcgen::PKCS_ECDSA_P256_SHA256 {
            "P-256"
        } else if alg == &rcgen::PKCS_ECDSA_P384_SHA384 {
            "P-384"
        } else {
            return Err(Error::UnsupportedKey);
        };
        // Uncompressed SEC1 point: 0x04 || x || y.
        match raw.split_first() {
            Some((&0x04, point)) if point.len() % 2 == 0 => {
                let (x, y) = point.split_at(point.len() / 2);
                Ok(format!(
                    r#"{{"crv":"{crv}","kty":"EC","x":"{}","y":"{}"}}"#,
                    BASE64_ENGINE.encode(x),
                    BASE64_ENGINE.encode(y)
                ))
            }
            _ => Err(Error::UnsupportedKey),
        }
    }
}

impl fmt::Debug for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountKey")
            .field("algorithm", self.key_pair.algorithm())
            .finish_non_exhaustive()
    }
}

/// A challenge issued by the authority: what must be proven, for which token.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Challenge {
    #[serde(rename = "type")]
    challenge_type: ChallengeType,
    token: Token,
}

impl Challenge {
    #[must_use]
    pub fn new(challenge_type: ChallengeType, token: Token) -> Self {
        Self {
            challenge_type,
            token,
        }
    }

    #[must_use]
    pub fn tls_sni01(token: Token) -> Self {
        Self::new(ChallengeType::TlsSni01, token)
    }

    #[must_use]
    pub fn dns01(token: Token) -> Self {
        Self::new(ChallengeType::Dns01, token)
    }

    #[must_use]
    pub fn http01(token: Token) -> Self {
        Self::new(ChallengeType::Http01, token)
    }

    #[must_use]
    pub fn challenge_type(&self) -> ChallengeType {
        self.challenge_type
    }

    #[must_use]
    pub fn token(&self) -> &Token {
        &self.token
    }

    /// `token || '.' || thumbprint(account key)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedKey`] if the account key has no thumbprint.
    pub fn key_authorization(&self, account_key: &AccountKey) -> Result<String, Error> {
        Ok(format!("{}.{}", self.token, account_key.thumbprint()?))
    }

    /// Derive the response proving control with the given account key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedKey`] if the account key has no thumbprint.
    pub fn response(&self, account_key: &AccountKey) -> Result<Response, Error> {
        let key_authorization = self.key_authorization(account_key)?;
        Ok(Response::new(self.challenge_type, key_authorization))
    }

    /// The name a DNS-01 TXT record must be published under for `server_name`. A leading
    /// wildcard label is validated through its base domain.
    #[must_use]
    pub fn validation_domain_name(&self, server_name: &str) -> String {
        let base = server_name.strip_prefix("*.").unwrap_or(server_name);
        format!("{DNS01_LABEL}.{base}")
    }

    /// The HTTP-01 resource path the authority will fetch.
    #[must_use]
    pub fn path(&self) -> String {
        format!("{HTTP01_PATH_PREFIX}{}", self.token)
    }
}

/// Proof for a [`Challenge`], specific to its type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    TlsSni01(TlsSni01Response),
    Dns01(Dns01Response),
    Http01(Http01Response),
}

impl Response {
    #[must_use]
    pub fn new(challenge_type: ChallengeType, key_authorization: String) -> Self {
        match challenge_type {
            ChallengeType::TlsSni01 => Response::TlsSni01(TlsSni01Response { key_authorization }),
            ChallengeType::Dns01 => Response::Dns01(Dns01Response { key_authorization }),
            ChallengeType::Http01 => Response::Http01(Http01Response { key_authorization }),
        }
    }

    #[must_use]
    pub fn challenge_type(&self) -> ChallengeType {
        match self {
            Response::TlsSni01(_) => ChallengeType::TlsSni01,
            Response::Dns01(_) => ChallengeType::Dns01,
            Response::Http01(_) => ChallengeType::Http01,
        }
    }

    #[must_use]
    pub fn key_authorization(&self) -> &str {
        match self {
            Response::TlsSni01(r) => &r.key_authorization,
            Response::Dns01(r) => &r.key_authorization,
            Response::Http01(r) => &r.key_authorization,
        }
    }

    /// # Errors
    ///
    /// Returns [`Error::ResponseMismatch`] for any other response type.
    pub fn as_tls_sni01(&self) -> Result<&TlsSni01Response, Error> {
        match self {
            Response::TlsSni01(r) => Ok(r),
            _ => Err(self.mismatch(ChallengeType::TlsSni01)),
        }
    }

    /// # Errors
    ///
    /// Returns [`Error::ResponseMismatch`] for any other response type.
    pub fn as_dns01(&self) -> Result<&Dns01Response, Error> {
        match self {
            Response::Dns01(r) => Ok(r),
            _ => Err(self.mismatch(ChallengeType::Dns01)),
        }
    }

    /// # Errors
    ///
    /// Returns [`Error::ResponseMismatch`] for any other response type.
    pub fn as_http01(&self) -> Result<&Http01Response, Error> {
        match self {
            Response::Http01(r) => Ok(r),
            _ => Err(self.mismatch(ChallengeType::Http01)),
        }
    }

    fn mismatch(&self, expected: ChallengeType) -> Error {
        Error::ResponseMismatch {
            expected,
            found: self.challenge_type(),
        }
    }
}

/// A certificate and the private key it was issued for.
#[derive(Clone, PartialEq, Eq)]
pub struct CertifiedKey {
    certificate_der: Vec<u8>,
    certificate_pem: String,
    private_key_der: Vec<u8>,
    private_key_pem: String,
}

impl CertifiedKey {
    #[must_use]
    pub fn certificate_der(&self) -> &[u8] {
        &self.certificate_der
    }

    #[must_use]
    pub fn certificate_pem(&self) -> &str {
        &self.certificate_pem
    }

    /// The PKCS#8 encoded private key.
    #[must_use]
    pub fn private_key_der(&self) -> &[u8] {
        &self.private_key_der
    }

    #[must_use]
    pub fn private_key_pem(&self) -> &str {
        &self.private_key_pem
    }
}

impl fmt::Debug for CertifiedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertifiedKey")
            .field("certificate_pem", &self.certificate_pem)
            .finish_non_exhaustive()
    }
}

/// Response to a `tls-sni-01` challenge.
///
/// The authority connects with SNI set to [`z_domain`][Self::z_domain] and expects a
/// certificate naming it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsSni01Response {
    key_authorization: String,
}

impl TlsSni01Response {
    /// Lowercase hex SHA-256 digest of the key authorization.
    #[must_use]
    pub fn z(&self) -> String {
        Sha256::digest(self.key_authorization.as_bytes())
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }

    /// `z[0..32] "." z[32..64] ".acme.invalid"`.
    #[must_use]
    pub fn z_domain(&self) -> String {
        let z = self.z();
        format!("{}.{}.{TLS_SNI01_SUFFIX}", &z[..32], &z[32..])
    }

    /// Build a self-signed certificate for [`z_domain`][Self::z_domain] using `key_pair`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Certificate`] if the certificate can't be created.
    pub fn gen_cert(&self, key_pair: &KeyPair) -> Result<CertifiedKey, Error> {
        let z_domain = self.z_domain();
        let mut params = CertificateParams::new(vec![z_domain.clone()])?;
        let mut distinguished_name = DistinguishedName::new();
        distinguished_name.push(DnType::CommonName, z_domain);
        params.distinguished_name = distinguished_name;
        let certificate = params.self_signed(key_pair)?;
        Ok(CertifiedKey {
            certificate_der: certificate.der().to_vec(),
            certificate_pem: certificate.pem(),
            private_key_der: key_pair.serialize_der(),
            private_key_pem: key_pair.serialize_pem(),
        })
    }

    /// Whether the DER encoded certificate satisfies this response: its subject alternative
    /// names include [`z_domain`][Self::z_domain].
    #[must_use]
    pub fn verify_cert(&self, certificate_der: &[u8]) -> bool {
        let Ok((_, certificate)) = x509_parser::parse_x509_certificate(certificate_der) else {
            return false;
        };
        let Ok(Some(san)) = certificate.tbs_certificate.subject_alternative_name() else {
            return false;
        };
        let z_domain = self.z_domain();
        san.value
            .general_names
            .iter()
            .any(|name| matches!(name, GeneralName::DNSName(dns) if *dns == z_domain))
    }
}

/// Response to a `dns-01` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dns01Response {
    key_authorization: String,
}

impl Dns01Response {
    /// The TXT record value: base64url SHA-256 digest of the key authorization.
    #[must_use]
    pub fn validation(&self) -> String {
        BASE64_ENGINE.encode(Sha256::digest(self.key_authorization.as_bytes()))
    }
}

/// Response to an `http-01` challenge. The key authorization is served verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Http01Response {
    key_authorization: String,
}

impl Http01Response {
    #[must_use]
    pub fn key_authorization(&self) -> &str {
        &self.key_authorization
    }
}
