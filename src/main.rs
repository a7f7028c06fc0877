use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use manifoldmcp::{
    config::{HttpConfig, ProcessFlags},
    demo::{demo_spec, DemoContext},
    mcp::{SessionMode, SessionRouter},
    server::serve_http,
    shutdown::ShutdownCoordinator,
    stdio::serve_stdio,
};

#[derive(Parser)]
#[command(author, version, about = "Session-routing MCP server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve over stdin/stdout (default)
    Stdio,
    /// Serve streamable HTTP at /mcp and REST at /api
    Http,
}

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing. Logs go to stderr so stdout stays clean for the
    // stdio transport.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "manifoldmcp=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let shutdown = Arc::new(ShutdownCoordinator::new());
    shutdown.clone().install_signal_handlers();

    let result = match cli.command.unwrap_or(Command::Stdio) {
        Command::Stdio => run_stdio().await,
        Command::Http => run_http(&shutdown).await,
    };

    let exit_code = match result {
        Ok(()) => shutdown.trigger(0).await.unwrap_or(0),
        Err(error) => {
            tracing::error!(error = %error, "server error");
            shutdown.trigger(1).await.unwrap_or(1)
        }
    };
    std::process::exit(exit_code);
}

async fn run_stdio() -> anyhow::Result<()> {
    tracing::info!("starting stdio server");
    let context = DemoContext::default();
    let process_flags = ProcessFlags::from_env();
    let spec = demo_spec();
    serve_stdio(&context, &process_flags, &spec).await
}

async fn run_http(shutdown: &Arc<ShutdownCoordinator>) -> anyhow::Result<()> {
    let config = HttpConfig::from_env();
    let mode = if config.stateless {
        SessionMode::Stateless
    } else {
        SessionMode::Stateful
    };

    let sessions = Arc::new(SessionRouter::new(
        mode,
        DemoContext::default(),
        Arc::new(demo_spec()),
        ProcessFlags::from_env(),
    ));

    serve_http(sessions, &config, shutdown).await?;
    Ok(())
}
