//! Portico operator - onboard applications behind a shared gateway

use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, CustomResourceExt};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use portico::config::{ControllerArgs, OperatorConfig};
use portico::controller::{error_policy, reconcile_with_timeout, Context};
use portico::crd::AppOnboarding;
use portico::FIELD_MANAGER;

/// Portico - onboard applications behind a shared gateway with optional OIDC
#[derive(Parser, Debug)]
#[command(name = "portico", version, about, long_about = None)]
struct Cli {
    /// Generate the CRD manifest and exit
    #[arg(long)]
    crd: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the AppOnboarding controller
    Controller(ControllerArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
        eprintln!(
            "CRITICAL: Failed to install aws-lc-rs crypto provider: {:?}. \
             TLS to the API server and identity providers cannot work without it.",
            e
        );
        std::process::exit(1);
    }

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    if cli.crd {
        let crd = serde_yaml::to_string(&AppOnboarding::crd())
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        println!("{crd}");
        return Ok(());
    }

    match cli.command {
        Some(Commands::Controller(args)) => run_controller(args).await,
        None => anyhow::bail!("no command given: run `portico controller` or `portico --crd`"),
    }
}

/// Install or update the AppOnboarding CRD via server-side apply
async fn ensure_crd_installed(client: &Client) -> anyhow::Result<()> {
    use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
    use kube::api::{Patch, PatchParams};

    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(FIELD_MANAGER).force();

    tracing::info!("Installing AppOnboarding CRD...");
    crds.patch(
        "apponboardings.portico.dev",
        &params,
        &Patch::Apply(&AppOnboarding::crd()),
    )
    .await
    .map_err(|e| anyhow::anyhow!("Failed to install AppOnboarding CRD: {}", e))?;

    Ok(())
}

/// Run the controller until a shutdown signal arrives
async fn run_controller(args: ControllerArgs) -> anyhow::Result<()> {
    let config = OperatorConfig::from_args(&args)
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    if args.install_crd {
        ensure_crd_installed(&client).await?;
    }

    tracing::info!(
        providers = ?config.providers,
        gateway_namespace = %config.gateways.namespace,
        namespace_label = %config.namespace_label,
        "Starting AppOnboarding controller"
    );

    let ctx = Arc::new(
        Context::builder(client.clone(), config)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build controller context: {}", e))?,
    );

    let onboardings: Api<AppOnboarding> = Api::all(client.clone());
    let secrets: Api<Secret> = Api::all(client);

    Controller::new(onboardings, WatcherConfig::default())
        .owns(secrets, WatcherConfig::default())
        .shutdown_on_signal()
        .run(reconcile_with_timeout, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok(action) => {
                    tracing::debug!(?action, "AppOnboarding reconciliation completed");
                }
                Err(e) => {
                    tracing::error!(error = ?e, "AppOnboarding reconciliation error");
                }
            }
        })
        .await;

    tracing::info!("Controller shut down");
    Ok(())
}
