use crate::error::Error;
use crate::responder::http::api_error::APIError;
use crate::responder::http::Resources;
use axum::extract::{Path, State};
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

pub(super) fn new(resources: Resources) -> Router {
    Router::new()
        .route("/.well-known/acme-challenge/:token", get(challenge_resource))
        .layer(TraceLayer::new_for_http())
        .with_state(resources)
}

#[allow(clippy::unused_async)]
async fn challenge_resource(
    State(resources): State<Resources>,
    Path(token): Path<String>,
) -> Result<String, APIError> {
    match resources.read().get(&token) {
        Some(key_authorization) => {
            tracing::debug!("served key authorization for token \"{token}\"");
            Ok(key_authorization.clone())
        }
        None => {
            tracing::debug!("no key authorization for token \"{token}\"");
            Err(Error::UnknownToken(token).into())
        }
    }
}
