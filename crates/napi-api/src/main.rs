use std::str::FromStr;

use clap::CommandFactory;
use napi_api::cfg::{Command, Config, Options};
use napi_api::state::ApiState;
use napi_core::networks;
use napi_model::{Aggregation, Entity, Network, NetworkPool, Nic, NicTag};
use napi_store::Store;
use sqlx::PgPool;
use sqlx::postgres::PgConnectOptions;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let opts = Options::load();
    if opts.version {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let sub_cmd = match &opts.sub_cmd {
        None => return Ok(Options::command().print_long_help()?),
        Some(s) => s,
    };

    match sub_cmd {
        Command::Migrate(m) => {
            tracing::info!("running migrations");
            let connect_options = PgConnectOptions::from_str(&m.datastore)?;
            let pool = PgPool::connect_with(connect_options).await?;
            napi_store::migrations::migrate(&pool).await?;
        }
        Command::Run(daemon) => {
            let config_str = tokio::fs::read_to_string(&daemon.config_path).await?;
            let site_config_str = match &daemon.site_config_path {
                Some(path) => Some(tokio::fs::read_to_string(path).await?),
                None => None,
            };
            let config = Config::load(&config_str, site_config_str.as_deref())?;

            tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::new(&config.log_level))
                .init();

            let pool = PgPool::connect(&config.database_url()).await?;
            let store = Store::new(pool);
            bootstrap_buckets(&store).await?;
            seed_initial_networks(&store, &config).await?;

            let state = std::sync::Arc::new(ApiState::new(store, &config));
            let router = napi_api::web::router(state);
            let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
            tracing::info!(port = config.port, "napi-api listening");
            axum::serve(listener, router).await?;
        }
    }
    Ok(())
}

/// Creates the five fixed buckets if they don't already exist (`create_bucket`
/// is `CREATE TABLE IF NOT EXISTS` under the hood). Per-network IP buckets
/// are created on demand by [`networks::create_network`].
async fn bootstrap_buckets(store: &Store) -> eyre::Result<()> {
    for spec in [
        NicTag::bucket(),
        Network::bucket(),
        NetworkPool::bucket(),
        Nic::bucket(),
        Aggregation::bucket(),
    ] {
        store.create_bucket(&spec).await?;
    }
    Ok(())
}

/// Creates any `initial_networks` entries whose name isn't already taken,
/// so a freshly stood-up environment isn't an empty control plane.
async fn seed_initial_networks(store: &Store, config: &Config) -> eyre::Result<()> {
    for initial in &config.initial_networks {
        let name = initial.params.name.clone();
        let filter = napi_store::Filter::eq("name", name.clone());
        let existing = store
            .find("napi_networks", &filter, &napi_store::FindOptions::default())
            .await?;
        if !existing.is_empty() {
            continue;
        }
        tracing::info!(network = name, "creating initial network");
        networks::create_network(store, initial.params.clone().into()).await?;
    }
    Ok(())
}
