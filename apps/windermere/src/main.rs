//! Windermere, a multi-tenant SCIM provisioning server for the Swedish
//! school federation (SS12000:2018), with scheduled imports from SS12000
//! v2 sources.

mod admin;
mod config;
mod logging;

use std::sync::Arc;

use axum::middleware;
use axum::Router;
use tracing::info;

use config::Config;
use windermere_api::{api_key_auth, scim_router, ApiKeys};
use windermere_db::{downgrade_schema, ObjectParser, SqlBackend};
use windermere_import::{ImportController, ImportManager, ImportPersistence, ReconcileBackend};
use windermere_model::{optional_validator, parse_resource, Validator};

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
    };

    logging::init_logging(&config.log_filter);

    // `windermere downgrade <version>` reverts the storage schema and
    // exits; used before rolling back to an older release.
    let args: Vec<String> = std::env::args().collect();
    if args.get(1).map(String::as_str) == Some("downgrade") {
        let Some(target) = args.get(2).and_then(|v| v.parse::<i64>().ok()) else {
            eprintln!("usage: windermere downgrade <version>");
            std::process::exit(2);
        };
        if let Err(err) = downgrade_schema(&config.storage_url, target).await {
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
        info!(target, "schema downgrade complete");
        return;
    }

    if let Err(err) = serve(config).await {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn object_parser(config: &Config) -> ObjectParser {
    let validator: Arc<Validator> = Arc::new(optional_validator(
        config.validate_uuids,
        config.validate_school_unit_codes,
    ));
    Arc::new(move |resource_type, resource| {
        let Some(entity) = parse_resource(resource_type, resource)? else {
            return Ok(None);
        };
        (*validator)(&entity)?;
        Ok(Some(entity))
    })
}

async fn serve(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %config.listen_addr,
        "starting windermere"
    );

    let backend = Arc::new(SqlBackend::open(&config.storage_url, object_parser(&config)).await?);

    // Import sub-system: persistence, manager, controller; then start the
    // runners for every already configured import.
    let persistence = Arc::new(ImportPersistence::open(&config.import_database_url).await?);
    let manager = Arc::new(ImportManager::new());
    let controller = Arc::new(ImportController::new(
        Arc::clone(&persistence),
        Arc::clone(&manager),
        ReconcileBackend::new(Arc::clone(&backend)),
    ));
    controller.start_all().await;

    let api_keys = ApiKeys {
        header: config.api_key_header.clone(),
        tenants: Arc::new(config.clients.clone()),
    };
    let app = Router::new()
        .nest("/admin", admin::import_admin_router(Arc::clone(&controller)))
        .merge(
            scim_router(Arc::clone(&backend))
                .layer(middleware::from_fn_with_state(api_keys, api_key_auth)),
        );

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!("listening for SCIM requests");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Runners may be mid-import; stop them cleanly before exiting.
    info!("shutting down import runners");
    manager.quit().await;
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "failed to listen for shutdown signal");
    }
}
