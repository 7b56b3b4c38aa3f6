//! `http-01` responder.
//!
//! The authority fetches `http://<server name>/.well-known/acme-challenge/<token>` and expects
//! the key authorization as the body. [`Http01Responder`] keeps a shared `token -> key
//! authorization` table that [`Http01Responder::router`] serves.
//!
//! # Endpoints
//!
//! ## `/.well-known/acme-challenge/:token` (GET)
//!
//!   Returns HTTP 200 (OK) with the `text/plain` key authorization for `token` while the
//!   responder is responding to it.
//!
//!   Returns HTTP 404 (Not Found) and a JSON body of the form:
//!
//!   ```json
//!   { "error": "no challenge response for token \"XXXX\"" }
//!   ```
//!
//!   for any other token.

use crate::challenge::{Challenge, ChallengeType, Response};
use crate::error::Error;
use crate::responder::Responder;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

mod api_error;
mod routes;
mod server;

/// A shared `token -> key authorization` table.
pub type Resources = Arc<RwLock<HashMap<String, String>>>;

#[derive(Default)]
pub struct Http01Responder {
    resources: Resources,
}

impl Http01Responder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The key authorizations currently served, keyed by token.
    #[must_use]
    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    /// A router serving the responder's resources. Merge it into an existing application or
    /// [`serve`][Self::serve] it directly.
    pub fn router(&self) -> axum::Router {
        routes::new(self.resources.clone())
    }

    /// Serve [`router`][Self::router] on `addr` until the returned future is dropped.
    pub fn serve(&self, addr: &SocketAddr) -> impl Future<Output = hyper::Result<()>> {
        server::new(addr, self.router())
    }
}

impl fmt::Debug for Http01Responder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Http01Responder")
            .field("resources", &self.resources.read().len())
            .finish()
    }
}

#[async_trait::async_trait]
impl Responder for Http01Responder {
    fn challenge_type(&self) -> ChallengeType {
        ChallengeType::Http01
    }

    async fn start_responding(
        &self,
        server_name: &str,
        challenge: &Challenge,
        response: &Response,
    ) -> Result<(), Error> {
        let key_authorization = response.as_http01()?.key_authorization();
        let token = challenge.token().as_str();
        let mut resources = self.resources.write();
        if resources.contains_key(token) {
            tracing::debug!("already responding for \"{server_name}\" at {}", challenge.path());
            return Ok(());
        }
        resources.insert(token.to_string(), key_authorization.to_string());
        tracing::info!("responding for \"{server_name}\" at {}", challenge.path());
        Ok(())
    }

    async fn stop_responding(
        &self,
        server_name: &str,
        challenge: &Challenge,
        response: &Response,
    ) -> Result<(), Error> {
        response.as_http01()?;
        if self
            .resources
            .write()
            .remove(challenge.token().as_str())
            .is_some()
        {
            tracing::info!("stopped responding for \"{server_name}\" at {}", challenge.path());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenge::{AccountKey, Token};
    use crate::util::KeyType;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn http01(raw: u8) -> (Challenge, Response) {
        let account_key = AccountKey::generate(KeyType::EcdsaP256).unwrap();
        let challenge = Challenge::http01(Token::from_bytes(&[raw; 32]));
        let response = challenge.response(&account_key).unwrap();
        (challenge, response)
    }

    async fn fetch(router: axum::Router, path: &str) -> (StatusCode, String, String) {
        let response = router
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get("content-type")
            .map(|value| value.to_str().unwrap().to_string())
            .unwrap_or_default();
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        (status, content_type, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn serves_key_authorization_while_responding() {
        let (challenge, response) = http01(1);
        let responder = Http01Responder::new();
        assert_eq!(responder.challenge_type(), ChallengeType::Http01);

        let (status, _, _) = fetch(responder.router(), &challenge.path()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        responder
            .start_responding("example.com", &challenge, &response)
            .await
            .unwrap();
        responder
            .start_responding("example.com", &challenge, &response)
            .await
            .unwrap();
        assert_eq!(responder.resources().read().len(), 1);

        let (status, content_type, body) = fetch(responder.router(), &challenge.path()).await;
        assert_eq!(status, StatusCode::OK);
        assert!(content_type.starts_with("text/plain"));
        assert_eq!(body, response.key_authorization());

        responder
            .stop_responding("example.com", &challenge, &response)
            .await
            .unwrap();
        let (status, content_type, body) = fetch(responder.router(), &challenge.path()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(content_type, "application/json");
        let body: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert!(body["error"].as_str().unwrap().contains(challenge.token().as_str()));
    }

    #[tokio::test]
    async fn stop_responding_already_stopped() {
        let (challenge, response) = http01(2);
        let responder = Http01Responder::new();
        responder
            .stop_responding("example.com", &challenge, &response)
            .await
            .unwrap();
        assert!(responder.resources().read().is_empty());
    }

    #[tokio::test]
    async fn rejects_other_response_types() {
        let account_key = AccountKey::generate(KeyType::EcdsaP256).unwrap();
        let challenge = Challenge::dns01(Token::from_bytes(&[3; 32]));
        let response = challenge.response(&account_key).unwrap();
        let result = Http01Responder::new()
            .start_responding("example.com", &challenge, &response)
            .await;
        assert!(matches!(
            result,
            Err(Error::ResponseMismatch {
                expected: ChallengeType::Http01,
                found: ChallengeType::Dns01
            })
        ));
    }

    #[tokio::test]
    async fn serves_over_tcp() {
        let (challenge, response) = http01(4);
        let responder = Http01Responder::new();
        responder
            .start_responding("example.com", &challenge, &response)
            .await
            .unwrap();

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let server = tokio::spawn(responder.serve(&addr));
        tokio::task::yield_now().await;

        let uri: hyper::Uri = format!("http://{addr}{}", challenge.path()).parse().unwrap();
        let mut fetched = None;
        for _ in 0..50 {
            if let Ok(resp) = hyper::Client::new().get(uri.clone()).await {
                fetched = Some(resp);
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        let fetched = fetched.unwrap();
        assert_eq!(fetched.status(), StatusCode::OK);
        let body = hyper::body::to_bytes(fetched.into_body()).await.unwrap();
        assert_eq!(body, response.key_authorization().as_bytes());
        server.abort();
    }
}
