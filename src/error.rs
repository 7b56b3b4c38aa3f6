//! Error types.

use crate::challenge::{ChallengeType, TokenError};
use crate::driver::DriverError;
use trust_dns_proto::error::ProtoError;

/// Error enumerates the possible responder error states.
///
/// The calling protocol layer can match on the variant to decide whether a different challenge
/// type is worth attempting for the same authorization.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Returned by the [DNS-01 responder][crate::responder::dns::DnsResponder] when the server
    /// name being validated is not the configured zone or one of its subdomains. No provider call
    /// is made before this check.
    #[error("\"{server_name}\" is not in zone \"{zone_name}\"")]
    NotInZone {
        server_name: String,
        zone_name: String,
    },

    /// Returned when the configured zone does not exist at the DNS provider at the time of the
    /// call. Zones are looked up on every call and never cached.
    #[error("zone \"{zone_name}\" not found at the DNS provider")]
    ZoneNotFound { zone_name: String },

    /// Returned when no zone was configured and none of the zones at the DNS provider contains
    /// the validation name.
    #[error("no zone at the DNS provider contains \"{server_name}\"")]
    NoZoneFor { server_name: String },

    /// Returned when a server or zone name can't be parsed as a DNS name.
    #[error("invalid DNS name \"{0}\"")]
    InvalidName(String, #[source] ProtoError),

    /// Returned when a challenge token isn't a valid base64url encoded 32 byte value.
    #[error("invalid challenge token: {0}")]
    InvalidToken(#[from] TokenError),

    /// Returned when a responder is handed a response computed for another challenge type.
    #[error("responder for {expected} was given a {found} response")]
    ResponseMismatch {
        expected: ChallengeType,
        found: ChallengeType,
    },

    /// Returned when an account key's algorithm has no JWK thumbprint representation.
    #[error("unsupported account key algorithm")]
    UnsupportedKey,

    /// Returned by the [HTTP-01 resource][crate::responder::http] for tokens that aren't
    /// currently being responded to.
    #[error("no challenge response for token \"{0}\"")]
    UnknownToken(String),

    /// Returned when a [`Config`][crate::config::Config] is structurally valid JSON but can't be
    /// used to build responders.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Returned when key generation or self-signed certificate creation fails.
    #[error("certificate generation failed")]
    Certificate(#[from] rcgen::Error),

    /// Returned verbatim when the DNS provider fails (transport, authentication, missing
    /// resources). These are never retried internally.
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// Returned when a task dispatched to the [`WorkerPool`][crate::pool::WorkerPool] panics or
    /// is cancelled by a pool shutdown.
    #[error("worker pool task failed")]
    WorkerPool(#[from] tokio::task::JoinError),

    /// Returned when a generic IO error occurs.
    #[error("an IO error occurred")]
    IO(#[from] std::io::Error),

    /// Returned when processing JSON from disk (e.g. when
    /// [trying to load a `Config`][crate::config::Config::try_from_file]) fails due to invalid
    /// JSON content.
    #[error("invalid JSON")]
    InvalidJSON(#[from] serde_json::Error),
}
