use clap::{Parser, Subcommand};
use jawhar::channels::{SendError, WhatsAppChannel};
use jawhar::directory::{Directory, DirectoryClient};

const DEFAULT_TEST_MESSAGE: &str = "Hello! This is a test message from your WhatsApp chatbot.";

#[derive(Parser)]
#[command(name = "jawhar")]
#[command(about = "Jawhar WhatsApp gateway CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Write a default config file if none exists.
    Init {
        /// Config file path (default: JAWHAR_CONFIG_PATH or ~/.jawhar/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Run the webhook gateway.
    Serve {
        /// Config file path (default: JAWHAR_CONFIG_PATH or ~/.jawhar/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default from config or 8000)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Check the WhatsApp credentials by fetching the business phone number details.
    Check {
        /// Config file path (default: JAWHAR_CONFIG_PATH or ~/.jawhar/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Send one text message and print the platform message id.
    Send {
        /// Recipient phone number (international format, no +)
        to: String,

        /// Message text
        #[arg(default_value = DEFAULT_TEST_MESSAGE)]
        message: String,

        /// Config file path (default: JAWHAR_CONFIG_PATH or ~/.jawhar/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Show a user's points balance from the directory.
    Balance {
        phone: String,

        /// Config file path (default: JAWHAR_CONFIG_PATH or ~/.jawhar/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Add (or with a negative delta, remove) points for a user. Needs the directory admin secret.
    AwardPoints {
        phone: String,

        #[arg(allow_hyphen_values = true)]
        delta: i64,

        /// Config file path (default: JAWHAR_CONFIG_PATH or ~/.jawhar/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Version) => {
            println!("jawhar {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Some(Commands::Init { config }) => run_init(config).map_err(|e| ("init", e)),
        Some(Commands::Serve { config, port }) => {
            run_serve(config, port).await.map_err(|e| ("gateway", e))
        }
        Some(Commands::Check { config }) => run_check(config).await.map_err(|e| ("check", e)),
        Some(Commands::Send {
            to,
            message,
            config,
        }) => run_send(config, &to, &message)
            .await
            .map_err(|e| ("send", e)),
        Some(Commands::Balance { phone, config }) => {
            run_balance(config, &phone).await.map_err(|e| ("balance", e))
        }
        Some(Commands::AwardPoints {
            phone,
            delta,
            config,
        }) => run_award_points(config, &phone, delta)
            .await
            .map_err(|e| ("award-points", e)),
        None => {
            println!("Run with --help for usage");
            Ok(())
        }
    };

    if let Err((command, e)) = result {
        log::error!("{} failed: {:#}", command, e);
        std::process::exit(1);
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(jawhar::config::default_config_path);
    if jawhar::config::init_config_file(&path)? {
        println!("wrote default configuration to {}", path.display());
    } else {
        println!("configuration already exists at {}", path.display());
    }
    Ok(())
}

async fn run_serve(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let (mut config, path) = jawhar::config::load_config(config_path)?;
    if let Some(p) = port {
        config.gateway.port = p;
    }
    log::info!(
        "starting gateway on {}:{} (config {})",
        config.gateway.bind,
        config.gateway.port,
        path.display()
    );
    jawhar::gateway::run_gateway(config).await
}

async fn run_check(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let (config, _) = jawhar::config::load_config(config_path)?;
    let channel = WhatsAppChannel::from_config(&config);
    match channel.phone_number_info().await {
        Ok(info) => {
            println!("credentials OK");
            println!("  phone number:  {}", info.display_phone_number.as_deref().unwrap_or("-"));
            println!("  verified name: {}", info.verified_name.as_deref().unwrap_or("-"));
            Ok(())
        }
        Err(e) => {
            if let Some(hint) = check_hint(&e) {
                eprintln!("{}", hint);
            }
            Err(e.into())
        }
    }
}

fn check_hint(e: &SendError) -> Option<&'static str> {
    match e {
        SendError::NotConfigured => {
            Some("set WHATSAPP_API_TOKEN and WHATSAPP_PHONE_NUMBER_ID (or whatsapp.apiToken / whatsapp.phoneNumberId in the config)")
        }
        SendError::Status { status: 401, .. } => {
            Some("the access token is invalid or expired; generate a new one in the Meta developer console")
        }
        SendError::Status { status: 404, .. } => {
            Some("the phone number id was not found; copy it from the WhatsApp API setup page")
        }
        _ => None,
    }
}

async fn run_send(
    config_path: Option<std::path::PathBuf>,
    to: &str,
    message: &str,
) -> anyhow::Result<()> {
    let (config, _) = jawhar::config::load_config(config_path)?;
    let channel = WhatsAppChannel::from_config(&config);
    let id = channel.send_text(to, message).await?;
    if id.is_empty() {
        println!("sent (no message id returned)");
    } else {
        println!("sent {}", id);
    }
    Ok(())
}

async fn run_balance(config_path: Option<std::path::PathBuf>, phone: &str) -> anyhow::Result<()> {
    let (config, _) = jawhar::config::load_config(config_path)?;
    let directory = DirectoryClient::from_config(&config);
    let reply = directory.check_balance(phone).await?;
    if !reply.is_success() {
        anyhow::bail!(
            "directory error: {}",
            reply.message.as_deref().unwrap_or("no message")
        );
    }
    match reply.points() {
        Some(points) => println!("{} has {} points", phone, points),
        None => println!("{} has no points balance", phone),
    }
    Ok(())
}

async fn run_award_points(
    config_path: Option<std::path::PathBuf>,
    phone: &str,
    delta: i64,
) -> anyhow::Result<()> {
    let (config, _) = jawhar::config::load_config(config_path)?;
    let Some(secret) = jawhar::config::resolve_directory_admin_secret(&config) else {
        anyhow::bail!("directory admin secret not set (DIRECTORY_ADMIN_SECRET or directory.adminSecret)");
    };
    let directory = DirectoryClient::from_config(&config);
    let reply = directory.update_points(phone, delta, &secret).await?;
    if !reply.is_success() {
        anyhow::bail!(
            "directory error: {}",
            reply.message.as_deref().unwrap_or("no message")
        );
    }
    match reply.points() {
        Some(points) => println!("updated {}: now {} points", phone, points),
        None => println!("updated {} by {}", phone, delta),
    }
    Ok(())
}
