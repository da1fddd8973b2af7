use clap::{Parser, Subcommand};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "clipchat")]
#[command(about = "Clipboard-relay chat-completion gateway", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Run the gateway. Each completion request is copied to the clipboard;
    /// paste it into any AI chat, then copy the reply back to finish the request.
    Serve {
        /// Config file path (default: CLIPCHAT_CONFIG_PATH or ~/.clipchat/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default from config or 5005)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Send one message to a running gateway and print the assistant reply.
    Ask {
        /// Config file path (default: CLIPCHAT_CONFIG_PATH or ~/.clipchat/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Model name to echo in the request (informational only).
        #[arg(long, short, default_value = "clipboard")]
        model: String,

        /// The user message.
        message: String,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("clipchat {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Serve { config, port }) => {
            if let Err(e) = run_serve(config, port).await {
                log::error!("serve failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Ask {
            config,
            model,
            message,
        }) => {
            if let Err(e) = run_ask(config, model, message).await {
                log::error!("ask failed: {}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

async fn run_serve(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let (mut config, _path) = lib::config::load_config(config_path)?;
    if let Some(p) = port {
        config.server.port = p;
    }
    log::info!(
        "starting gateway on {}:{}",
        config.server.bind,
        config.server.port
    );
    lib::server::run_server(config, Arc::new(lib::medium::SystemClipboard::new())).await
}

async fn run_ask(
    config_path: Option<std::path::PathBuf>,
    model: String,
    message: String,
) -> anyhow::Result<()> {
    let (config, _) = lib::config::load_config(config_path)?;
    let url = format!(
        "http://{}:{}/v1/chat/completions",
        config.server.bind.trim(),
        config.server.port
    );
    let body = serde_json::json!({
        "model": model,
        "messages": [{ "role": "user", "content": message }],
    });

    let client = reqwest::Client::new();
    let res = client.post(&url).json(&body).send().await?;
    if !res.status().is_success() {
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        anyhow::bail!("ask failed: {} {}", status, body);
    }
    let data: serde_json::Value = res.json().await?;
    let content = data
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|v| v.as_str())
        .unwrap_or("");
    println!("{}", content);
    Ok(())
}
