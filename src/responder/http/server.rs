use axum::Router;
use std::future::Future;
use std::net::SocketAddr;

pub(super) fn new(addr: &SocketAddr, router: Router) -> impl Future<Output = hyper::Result<()>> {
    tracing::info!("HTTP-01 responder listening on {addr}");
    axum::Server::bind(addr).serve(router.into_make_service())
}
