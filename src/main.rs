//! Bridge daemon entry point.
//!
//! Wires configuration, the route store, the dispatcher, the two
//! ingest loops, and the optional wireless scan loop together, then
//! waits for a shutdown signal.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use weft::bridge::{BrokerBridge, RoutingIngest};
use weft::config::schema::BridgeConfig;
use weft::config::validation::validate_config;
use weft::config::load_config;
use weft::dispatch::{Dispatcher, RedisTransport, Transport};
use weft::lifecycle::{shutdown_on_signal, Shutdown};
use weft::observability;
use weft::routing::{Router, SubstitutionContext};
use weft::store::RedisRouteStore;
use weft::wireless::{
    AssociateSettings, Associator, CommandLink, HttpProvisioner, Pattern,
};

#[derive(Parser)]
#[command(name = "weft", about = "Rule-driven bridge between Redis pub/sub and MQTT")]
struct Args {
    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the store host.
    #[arg(long)]
    db_host: Option<String>,

    /// Override the store port.
    #[arg(long)]
    db_port: Option<u16>,

    /// Override the broker host.
    #[arg(long)]
    broker_host: Option<String>,

    /// Override the broker port.
    #[arg(long)]
    broker_port: Option<u16>,

    /// Allow routes to invoke external commands.
    #[arg(long)]
    allow_shell_calls: bool,

    /// Do not supply $DB_* / $BROKER_* substitution variables.
    #[arg(long)]
    no_basic_env_vars: bool,
}

impl Args {
    fn apply_to(&self, config: &mut BridgeConfig) {
        if let Some(host) = &self.db_host {
            config.store.host = host.clone();
        }
        if let Some(port) = self.db_port {
            config.store.port = port;
        }
        if let Some(host) = &self.broker_host {
            config.broker.host = host.clone();
        }
        if let Some(port) = self.broker_port {
            config.broker.port = port;
        }
        if self.allow_shell_calls {
            config.dispatch.allow_shell_calls = true;
        }
        if self.no_basic_env_vars {
            config.substitution.basic_env_vars = false;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    observability::logging::init("weft=info");

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => BridgeConfig::default(),
    };
    args.apply_to(&mut config);

    // Overrides can invalidate a previously valid config; check again.
    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            tracing::error!(%error, "invalid configuration");
        }
        return Err("configuration validation failed".into());
    }

    let store_endpoint = format!("{}:{}", config.store.host, config.store.port);
    let broker_endpoint = format!("{}:{}", config.broker.host, config.broker.port);
    tracing::info!(
        store = %store_endpoint,
        broker = %broker_endpoint,
        allow_shell_calls = config.dispatch.allow_shell_calls,
        wireless = config.wireless.enabled,
        "weft starting"
    );

    // An unreachable store at startup is the one fatal error; every
    // steady-state failure after this point is contained and logged.
    let store = RedisRouteStore::connect(&config.store.host, config.store.port).await?;
    tracing::info!(namespace = store.namespace(), "route store connected");

    let transport: Arc<dyn Transport> = Arc::new(
        RedisTransport::connect(&config.store.host, config.store.port).await?,
    );

    let dispatcher = Dispatcher::new(
        Arc::clone(&transport),
        config.dispatch.allow_shell_calls,
        config.dispatch.shell_timeout_secs.map(Duration::from_secs),
    );
    let router = Arc::new(Router::new(Arc::new(store), dispatcher));

    let extra = if config.substitution.basic_env_vars {
        vec![
            ("$DB_HOST".to_string(), config.store.host.clone()),
            ("$DB_PORT".to_string(), config.store.port.to_string()),
            ("$BROKER_HOST".to_string(), config.broker.host.clone()),
            ("$BROKER_PORT".to_string(), config.broker.port.to_string()),
        ]
    } else {
        Vec::new()
    };

    let shutdown = Shutdown::new();
    let mut tasks = Vec::new();

    let ingest_client =
        redis::Client::open(format!("redis://{}:{}/", config.store.host, config.store.port))?;
    let ingest = RoutingIngest::new(ingest_client, Arc::clone(&router), extra);
    tasks.push(tokio::spawn(ingest.run(shutdown.subscribe())));

    let broker = BrokerBridge::new(config.broker.clone(), Arc::clone(&transport));
    tasks.push(tokio::spawn(broker.run(shutdown.subscribe())));

    if config.wireless.enabled {
        let template = config
            .wireless
            .resolve_template()
            .map_err(|err| format!("failed to read wireless template: {err}"))?
            .ok_or("wireless is enabled but no template is configured")?;

        let patterns: Vec<Pattern> = config
            .wireless
            .patterns
            .iter()
            .map(|glob| Pattern::new(glob))
            .collect();

        let mut template_vars = SubstitutionContext::new();
        for (name, value) in &config.wireless.template_vars {
            template_vars.insert(name, value);
        }

        let associator = Associator::new(
            Arc::new(CommandLink::new(config.wireless.use_sudo)),
            Arc::new(HttpProvisioner::new(reqwest::Client::new())),
            config.wireless.interface.clone(),
            AssociateSettings {
                delay: Duration::from_secs(config.wireless.associate_delay_secs),
                retries: config.wireless.retries,
                settle: Duration::from_secs(config.wireless.settle_secs),
            },
        );

        let interval = Duration::from_secs(config.wireless.scan_interval_secs);
        let rx = shutdown.subscribe();
        tasks.push(tokio::spawn(async move {
            associator
                .run_scan_loop(&patterns, &template, &template_vars, interval, rx)
                .await;
        }));
    }

    shutdown_on_signal(&shutdown).await;

    for task in tasks {
        let _ = task.await;
    }
    tracing::info!("weft stopped");
    Ok(())
}
