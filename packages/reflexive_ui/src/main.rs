use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::prelude::*;

use reflexive_ui::config::{ClientConfig, ClientFileConfig, load_config};
use reflexive_ui::dispatch::MAIN_CONTAINER_ID;
use reflexive_ui::{
    ActionRegistry, Dispatcher, DomPort, ElementSpec, Enhancer, MemoryDom, NodeId, StreamListener,
    runtime,
};

#[derive(Parser)]
#[command(name = "reflexive")]
#[command(about = "Headless client for reflexive UI event streams")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML config file (env vars with the REFLEXIVE_ prefix override it)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Subscribe and apply events to an in-memory document
    Listen(ListenArgs),

    /// Print the resolved subscription URL
    Url(TargetArgs),
}

#[derive(Args)]
struct TargetArgs {
    /// Environment name: dev, staging, or anything else for origin-relative
    #[arg(long)]
    env: Option<String>,

    /// Page origin used when the environment has no fixed host
    #[arg(long)]
    origin: Option<String>,

    /// Path of the document the client pretends to be on
    #[arg(long, default_value = "/")]
    path: String,
}

#[derive(Args)]
struct ListenArgs {
    #[command(flatten)]
    target: TargetArgs,

    /// Print the document as HTML when the stream ends
    #[arg(long)]
    dump: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

/// Logs every subtree handed to the progressive-enhancement step.
struct TracingEnhancer;

impl Enhancer for TracingEnhancer {
    fn process(&mut self, node: NodeId) {
        debug!(node = node.0, "enhancement scan");
    }
}

fn resolve_config(config: Option<&PathBuf>, target: &TargetArgs) -> Result<ClientConfig> {
    let mut fc: ClientFileConfig = load_config(config.map(PathBuf::as_path))
        .extract()
        .context("Failed to load configuration")?;
    if target.env.is_some() {
        fc.env = target.env.clone();
    }
    if target.origin.is_some() {
        fc.origin = target.origin.clone();
    }
    Ok(ClientConfig::from_file(&fc))
}

fn headless_document(path: &str) -> MemoryDom {
    let mut dom = MemoryDom::new().with_location(path);
    let body = dom.body();
    dom.append_element(body, &ElementSpec::new("main").attr("id", MAIN_CONTAINER_ID));
    dom
}

fn builtin_actions() -> ActionRegistry {
    let mut actions = ActionRegistry::new();
    actions.register("log", |ctx| {
        info!(
            event = %ctx.event.name,
            target = ctx.target.unwrap_or("document"),
            args = %ctx.args,
            "action fired"
        );
    });
    actions
}

async fn listen(config: Option<&PathBuf>, args: ListenArgs) -> Result<()> {
    let client_config = resolve_config(config, &args.target)?;
    let url = client_config.subscription_url()?;
    let listener = StreamListener::new(url).with_retry(client_config.retry);

    let mut dispatcher = Dispatcher::with_enhancer(headless_document(&args.target.path), TracingEnhancer)
        .with_actions(builtin_actions());

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
            ctrl_c.cancel();
        }
    });

    let result = runtime::run(
        listener,
        &mut dispatcher,
        client_config.channel_capacity,
        cancel,
    )
    .await;

    if args.dump {
        println!("{}", dispatcher.dom().to_html());
    }

    match result {
        Ok(stats) => {
            info!(
                applied = stats.applied,
                ignored = stats.ignored,
                failed = stats.failed,
                "done"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "subscription failed");
            Err(e.into())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let debug = matches!(&cli.command, Commands::Listen(args) if args.debug);
    let default_directive = if debug {
        "reflexive_ui=debug,reflexive=debug"
    } else {
        "reflexive_ui=info,reflexive=info"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();

    match cli.command {
        Commands::Listen(args) => listen(cli.config.as_ref(), args).await,
        Commands::Url(target) => {
            let client_config = resolve_config(cli.config.as_ref(), &target)?;
            println!("{}", client_config.subscription_url()?);
            Ok(())
        }
    }
}
