//! ACME Responders
//!
//! Strategies for proving control of a domain to an [RFC-8555][RFC-8555] certificate authority.
//!
//! Each [`Responder`] satisfies one challenge type by making evidence appear where the authority
//! will look for it and removing it afterwards:
//!
//! * `tls-sni-01`: a throwaway self-signed certificate for the challenge's derived server name,
//!   served through a [layered][layered::Layered] view of a TLS server's host map.
//! * `dns-01`: a TXT record at `_acme-challenge.<server name>`, managed through a
//!   [DNS provider driver][driver::DnsDriver] on a [`WorkerPool`].
//! * [`http-01`][HTTP-01]: the key authorization served by an axum router.
//!
//! Talking to the certificate authority is the caller's job. Callers hand a responder the
//! [`Challenge`] and its [`Response`] and let it arrange the evidence.
//!
//! [RFC-8555]: https://www.rfc-editor.org/rfc/rfc8555
//! [HTTP-01]: https://www.rfc-editor.org/rfc/rfc8555#section-8.3
//!
#![warn(clippy::pedantic)]

pub mod challenge;
pub mod config;
pub mod driver;
pub mod error;
pub mod layered;
pub mod pool;
pub mod responder;
pub mod util;

pub use challenge::{AccountKey, Challenge, ChallengeType, Response, Token};
pub use config::{Config, DnsConfig};
pub use driver::{DnsDriver, DynDriver, FileDriver, InMemoryDriver};
pub use error::Error;
pub use layered::{Layered, Mapping};
pub use pool::WorkerPool;
pub use responder::{DnsResponder, DynResponder, Http01Responder, Responder, TlsSniResponder};
pub use util::{generate_private_key, KeyType};
