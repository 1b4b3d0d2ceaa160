//! HTTP server loop

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use crate::handlers;
use crate::state::AppState;

/// Bind and serve until the task is cancelled or the listener fails.
pub async fn serve(addr: SocketAddr, state: Arc<AppState>) -> anyhow::Result<()> {
	let listener = TcpListener::bind(addr).await?;
	tracing::info!(%addr, "biblion listening");

	loop {
		let (stream, peer) = listener.accept().await?;
		let state = Arc::clone(&state);

		tokio::task::spawn(async move {
			let io = TokioIo::new(stream);
			let service = service_fn(move |req| {
				let state = Arc::clone(&state);
				async move { Ok::<_, Infallible>(handlers::handle(state, req).await) }
			});
			if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
				tracing::debug!(%peer, error = %err, "connection closed with error");
			}
		});
	}
}
