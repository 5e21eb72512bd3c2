use anyhow::{Context, Result};
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use tracing::{error, info, warn};

use arbiter::completion::{CompletionClient, CompletionConfig};
use arbiter::constants::{DEFAULT_GATEWAY_URL, DEFAULT_PORT};
use arbiter::{chat, gateway};

// Define the command-line interface structure using clap
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

// Define the available subcommands
#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Start the completion gateway and serve the web chat.
    Serve {
        #[arg(long, env = "ARBITER_HOST", default_value = "0.0.0.0", help = "Address to bind.")]
        host: IpAddr,
        #[arg(long, env = "ARBITER_PORT", default_value_t = DEFAULT_PORT, help = "Port for the gateway.")]
        port: u16,
    },
    /// Chat with a running gateway from the terminal.
    Chat {
        #[arg(long, env = "ARBITER_GATEWAY_URL", default_value = DEFAULT_GATEWAY_URL, help = "Base URL of the gateway.")]
        gateway: String,
    },
    /// Ask a single question and print the parsed answer.
    Ask {
        question: String,
    },
}

fn completion_client() -> CompletionClient {
    let config = CompletionConfig::from_env();
    if config.api_key.is_empty() {
        warn!("OPENAI_API_KEY is not set; completion requests will be rejected upstream");
    }
    CompletionClient::new(config)
}

// The main entry point of the application, using tokio's async runtime
#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (for environment variables like API keys)
    dotenvy::dotenv().ok();

    // Reads log level from RUST_LOG environment variable (e.g., RUST_LOG=info,arbiter=debug)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    info!("Arbiter starting with command: {:?}", cli.command);

    match cli.command {
        Commands::Serve { host, port } => {
            let addr = SocketAddr::new(host, port);
            let completion = completion_client();
            info!("Using model {} at {}", completion.config().model, completion.config().base_url);

            let mut gateway_handle =
                tokio::spawn(async move { gateway::start_gateway(addr, completion).await });

            let ctrl_c = tokio::signal::ctrl_c();
            tokio::pin!(ctrl_c);

            tokio::select! {
                _ = &mut ctrl_c => {
                    info!("Ctrl-C received, initiating shutdown...");
                }
                res = &mut gateway_handle => {
                    match res {
                        Ok(Ok(())) => info!("Gateway task completed unexpectedly."),
                        Ok(Err(e)) => {
                            error!("Gateway failed: {:?}", e);
                            return Err(e);
                        }
                        Err(e) if e.is_panic() => {
                            error!("Gateway task panicked: {:?}", e);
                            return Err(e).context("Gateway task panicked");
                        }
                        Err(e) => {
                            error!("Gateway task failed: {:?}", e);
                            return Err(e).context("Gateway task failed");
                        }
                    }
                }
            }

            if !gateway_handle.is_finished() {
                info!("Aborting gateway task...");
                gateway_handle.abort();
            }
            info!("Shutdown complete.");
        }
        Commands::Chat { gateway } => {
            chat::run_chat(&gateway).await.context("Chat session failed")?;
        }
        Commands::Ask { question } => {
            let completion = completion_client();
            let parsed = gateway::answer_question(&completion, &question)
                .await
                .context("Completion request failed")?;

            println!("{}", parsed.text);
            println!();
            println!("Règles utilisées :");
            for rule in &parsed.rules {
                println!("- {}", rule);
            }
        }
    }

    Ok(())
}
