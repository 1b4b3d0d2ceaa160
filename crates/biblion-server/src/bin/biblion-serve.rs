use std::sync::Arc;

use anyhow::Context;

use biblion_catalogue::Catalogue;
use biblion_pool::ConnectionPool;
use biblion_server::{AppState, ServiceConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| "info".into()),
		)
		.init();

	let config = ServiceConfig::from_env().context("loading configuration")?;

	let pool = Arc::new(ConnectionPool::new(config.database_url.clone()));
	tracing::info!(database = %pool.url(), "using catalogue store");

	let catalogue = Catalogue::new(Arc::clone(&pool));
	catalogue
		.create_schema()
		.await
		.context("bootstrapping the catalogue schema")?;

	let state = Arc::new(AppState::new(catalogue));
	biblion_server::server::serve(config.bind_addr, state).await
}
