use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "relay")]
#[command(about = "Relay Smooch conversations to LiveChat agents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config file.
    Init {
        /// Config file path (default: RELAY_CONFIG_PATH or ~/.relay/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Run the webhook server and poll worker. Credentials come from the config file and environment.
    Serve {
        /// Config file path (default: RELAY_CONFIG_PATH or ~/.relay/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default from PORT, config, or 8000)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Print the effective configuration (file + environment) with secrets redacted.
    Config {
        /// Config file path (default: RELAY_CONFIG_PATH or ~/.relay/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("relay {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Serve { config, port }) => {
            if let Err(e) = run_serve(config, port).await {
                log::error!("relay failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Config { config }) => {
            if let Err(e) = run_show_config(config) {
                log::error!("config failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(relay::config::default_config_path);
    if relay::init::init_config_file(&path)? {
        println!("initialized configuration at {}", path.display());
    } else {
        println!("configuration already exists at {}", path.display());
    }
    Ok(())
}

async fn run_serve(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let (mut config, path) = relay::config::load_config(config_path)?;
    if let Some(p) = port {
        config.server.port = p;
    }
    log::info!(
        "starting relay on {}:{} (config {})",
        config.server.bind,
        config.server.port,
        path.display()
    );
    relay::gateway::run_server(config).await
}

fn run_show_config(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let (config, path) = relay::config::load_config(config_path)?;
    println!("# {}", path.display());
    println!("{}", serde_json::to_string_pretty(&config.redacted())?);
    let missing = config.missing_settings();
    if !missing.is_empty() {
        println!("# missing: {}", missing.join(", "));
    }
    Ok(())
}
