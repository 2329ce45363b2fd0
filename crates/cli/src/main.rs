use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tgflow")]
#[command(about = "Relay Telegram messages through Dialogflow", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a template config file.
    Init {
        /// Config file path (default: TGFLOW_CONFIG_PATH or ~/.tgflow/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Run the webhook server. Credentials come from the config file or TELEGRAM_TOKEN, DIALOGFLOW_PROJECT_ID, GOOGLE_CLIENT_EMAIL, GOOGLE_PRIVATE_KEY.
    Serve {
        /// Config file path (default: TGFLOW_CONFIG_PATH or ~/.tgflow/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default from config or 3000)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Register or remove the Telegram webhook without running the server.
    Webhook {
        /// Config file path (default: TGFLOW_CONFIG_PATH or ~/.tgflow/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        #[command(subcommand)]
        action: WebhookAction,
    },
}

#[derive(Subcommand)]
enum WebhookAction {
    /// Point Telegram at URL (uses telegram.webhookSecret when configured).
    Set {
        /// Public HTTPS URL of this server
        url: String,
    },
    /// Remove the webhook registration.
    Delete,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("tgflow {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Serve { config, port }) => {
            if let Err(e) = run_serve(config, port).await {
                log::error!("serve failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Webhook { config, action }) => {
            if let Err(e) = run_webhook(config, action).await {
                log::error!("webhook failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(lib::config::default_config_path);
    let dir = lib::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_serve(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let (mut config, path) = lib::config::load_config(config_path)?;
    if let Some(p) = port {
        config.server.port = p;
    }
    log::info!(
        "starting tgflow on {}:{} (config {})",
        config.server.bind,
        config.server.port,
        path.display()
    );
    lib::gateway::run_gateway(config).await
}

async fn run_webhook(
    config_path: Option<std::path::PathBuf>,
    action: WebhookAction,
) -> anyhow::Result<()> {
    let (config, _) = lib::config::load_config(config_path)?;
    let token = lib::config::resolve_telegram_token(&config).ok_or_else(|| {
        anyhow::anyhow!("telegram bot token not configured (set TELEGRAM_TOKEN or telegram.botToken)")
    })?;
    let telegram =
        lib::channels::TelegramChannel::with_api_base(Some(token), config.telegram.api_base.clone());
    match action {
        WebhookAction::Set { url } => {
            telegram
                .set_webhook(&url, config.telegram.webhook_secret.as_deref())
                .await?;
            println!("webhook set to {}", url);
        }
        WebhookAction::Delete => {
            telegram.delete_webhook().await?;
            println!("webhook deleted");
        }
    }
    Ok(())
}
