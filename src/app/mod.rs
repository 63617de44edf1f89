pub mod server;

pub use server::{create_router, AppState, Server};

use crate::core::model::select_device;
use crate::core::{ConstructionLock, ModelCatalog, PredictionRegistry, PretrainedFactory};
use crate::envconfig::ScribeConfig;
use crate::infra::PretrainedRepository;
use std::sync::Arc;

pub type Result<T> = anyhow::Result<T>;

/// Registry over the builtin catalog, loading weights the way `config` says.
pub fn registry_from_config(config: &ScribeConfig) -> Result<PredictionRegistry> {
    let device = select_device(config.device)?;
    let factory = PretrainedFactory::new(PretrainedRepository::new(&config.models_dir), device);
    let lock = match &config.lock_file {
        Some(path) => ConstructionLock::with_file(path),
        None => ConstructionLock::in_process(),
    };

    Ok(PredictionRegistry::new(ModelCatalog::builtin(), factory.into_builder())
        .with_lock(lock)
        .lock_timeout(config.lock_timeout))
}

pub async fn serve(config: ScribeConfig) -> Result<()> {
    let registry = Arc::new(registry_from_config(&config)?);

    if config.preload {
        let warm = Arc::clone(&registry);
        let outcomes = tokio::task::spawn_blocking(move || warm.warm_up()).await?;
        let ready = outcomes.iter().filter(|(_, outcome)| outcome.is_ok()).count();
        tracing::info!("{}/{} models preloaded", ready, outcomes.len());
    }

    let state = AppState {
        registry,
        default_model: config.default_model,
        prediction_timeout: config.prediction_timeout,
    };

    Server::new()
        .host(config.host.host.clone())
        .port(config.host.port)
        .routes(create_router(state))
        .run()
        .await
}
