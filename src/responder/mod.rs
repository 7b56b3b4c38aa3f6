//! Challenge responders.
//!
//! A responder makes evidence of control over a domain appear where the certificate authority
//! will probe for it, and removes it again once validation completes. Each supported challenge
//! type has one strategy behind the common [`Responder`] trait:
//!
//! * [`tls::TlsSniResponder`] for `tls-sni-01`, serving throwaway indicator certificates through
//!   a TLS server's host map.
//! * [`dns::DnsResponder`] for `dns-01`, publishing TXT records through a
//!   [DNS driver][crate::driver].
//! * [`http::Http01Responder`] for `http-01`, serving key authorizations from an HTTP resource.
//!
//! Callers hold responders as [`DynResponder`]s and pick one by
//! [`challenge_type`][Responder::challenge_type], typically with [`select`].

use crate::challenge::{Challenge, ChallengeType, Response};
use crate::error::Error;
use std::sync::Arc;

pub mod dns;
pub mod http;
pub mod tls;

pub use dns::DnsResponder;
pub use http::Http01Responder;
pub use tls::TlsSniResponder;

/// `DynResponder` is a type alias for a [`Responder`] shared between the ACME client and
/// whatever serves the responder's evidence.
#[allow(clippy::module_name_repetitions)]
pub type DynResponder = Arc<dyn Responder>;

/// An async trait describing a strategy that satisfies one type of ACME challenge.
///
/// Both operations are keyed by a provider-specific identifier derived from the arguments (a
/// server name for TLS, a record name for DNS, a token for HTTP), so one responder can serve many
/// validations at once.
#[async_trait::async_trait]
pub trait Responder: Send + Sync {
    /// The challenge type this responder satisfies.
    fn challenge_type(&self) -> ChallengeType;

    /// Begin satisfying `challenge` for `server_name`.
    ///
    /// Calling this again before [`stop_responding`][Self::stop_responding] succeeds without
    /// creating anything new.
    async fn start_responding(
        &self,
        server_name: &str,
        challenge: &Challenge,
        response: &Response,
    ) -> Result<(), Error>;

    /// Stop satisfying `challenge` for `server_name`.
    ///
    /// Succeeds without effect when nothing is being served for it.
    async fn stop_responding(
        &self,
        server_name: &str,
        challenge: &Challenge,
        response: &Response,
    ) -> Result<(), Error>;
}

/// The first responder able to satisfy `challenge`, if any.
#[must_use]
pub fn select<'a>(
    responders: &'a [DynResponder],
    challenge: &Challenge,
) -> Option<&'a DynResponder> {
    responders
        .iter()
        .find(|responder| responder.challenge_type() == challenge.challenge_type())
}
