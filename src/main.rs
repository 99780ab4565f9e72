use clap::Parser;
use grid_node::GridInstance;
use grid_node::config::InstanceConfig;
use grid_node::instance::node::LocalNode;
use grid_node::proxy::types::{NamedProxy, ProxyHandle, services};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "grid-node")]
#[command(about = "Standalone data grid node")]
struct Cli {
    /// Address this node advertises.
    #[arg(long, env = "GRID_BIND", default_value = "127.0.0.1:5701")]
    bind: String,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(flatten)]
    instance: InstanceConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&cli.log_level))
        .init();

    let mut builder = GridInstance::builder(cli.instance)
        .with_node(Arc::new(LocalNode::new(&cli.bind)))
        .with_lifecycle_listener(|state| {
            tracing::info!("Lifecycle event: {}", state);
            Ok(())
        })
        .with_object_listener(|event| {
            tracing::info!("Distributed object {:?}: {}", event.kind, event.key);
            Ok(())
        });

    // Standalone nodes keep no state behind their proxies.
    for service_name in services::ALL {
        builder = builder.with_service(service_name, |key| async move {
            Ok(Arc::new(NamedProxy::new(key)) as ProxyHandle)
        });
    }

    let instance = builder.start().await?;
    tracing::info!("{} is running", instance);
    tracing::info!("Press Ctrl+C to shutdown");

    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down {}", instance.name());
    instance.shutdown().await;

    Ok(())
}
