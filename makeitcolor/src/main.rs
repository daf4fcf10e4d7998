use std::{convert::Infallible, net::SocketAddr};

use hyper::{server::Server, service::make_service_fn};
use tracing::info;

use makeitcolor::{
    colorize_service::ColorizeService,
    config::Settings,
    errors::{Result, ServiceError},
    init_logging,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let settings = Settings::load("makeitcolor")?;
    settings.validate()?;
    let addr: SocketAddr = settings.bind.parse()?;
    std::fs::create_dir_all(&settings.work_dir)?;

    let service = ColorizeService::from_settings(&settings);
    let server = Server::try_bind(&addr)?.serve(make_service_fn(move |_conn| {
        let service = service.clone();
        async move { Ok::<_, Infallible>(service) }
    }));

    info!(%addr, work_dir = ?settings.work_dir, model = %settings.model.id, "makeitcolor listening");
    server
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "could not listen for shutdown signal");
            }
        })
        .await
        .map_err(ServiceError::from)
}
