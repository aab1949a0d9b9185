use std::error::Error;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use log::{info, warn};
use minutai::ProviderId;
use minutai::client::SummaryClient;
use minutai::core::config::{self, CliOverrides};
use minutai::core::logging;
use minutai::core::request::InputType;
use minutai::inference::ProviderRegistry;
use minutai::server::{self, AppState};
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(name = "minutai", version, about = "Meeting transcripts in, structured summaries out")]
struct Args {
    /// Config file (default: ~/.minutai/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level: error, warn, info, debug, trace
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve {
        #[arg(long)]
        bind: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Summarize a transcript through a running server
    Summarize {
        /// Transcript file, or `-` for stdin
        input: PathBuf,
        #[arg(short, long, default_value_t, value_enum)]
        provider: ProviderId,
        #[arg(short, long, default_value_t, value_enum)]
        input_type: InputType,
        #[arg(long, default_value = "http://127.0.0.1:3000")]
        server: String,
    },
    /// Run two providers on the same transcript through a running server
    Compare {
        /// Transcript file, or `-` for stdin
        input: PathBuf,
        #[arg(long, value_enum, num_args = 2, required = true)]
        providers: Vec<ProviderId>,
        #[arg(long, default_value = "http://127.0.0.1:3000")]
        server: String,
    },
}

fn read_input(path: &Path) -> std::io::Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        Ok(text)
    } else {
        std::fs::read_to_string(path)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    dotenv::dotenv().ok();

    let (bind, port) = match &args.command {
        Command::Serve { bind, port } => (bind.clone(), *port),
        _ => (None, None),
    };
    let cli = CliOverrides {
        bind,
        port,
        log_level: args.log_level.clone(),
    };
    logging::init_logging(
        logging::parse_level(&config::log_level(&cli)),
        args.log_file.as_deref(),
    )?;

    let file_config = config::load_config(args.config.as_deref())?;
    let resolved = config::resolve(&file_config, &cli);

    match args.command {
        Command::Serve { .. } => {
            let registry = ProviderRegistry::from_config(&resolved)?;
            let configured: Vec<&str> = ProviderId::ALL
                .into_iter()
                .filter(|id| registry.is_configured(*id))
                .map(ProviderId::label)
                .collect();
            if configured.is_empty() {
                warn!("No provider API keys configured; summarize requests will be rejected");
            } else {
                info!("Providers: {}", configured.join(", "));
            }
            let listener = TcpListener::bind((resolved.bind.as_str(), resolved.port)).await?;
            info!("MinutAI {} starting", env!("CARGO_PKG_VERSION"));
            server::serve(listener, AppState::in_memory(registry)).await?;
        }
        Command::Summarize {
            input,
            provider,
            input_type,
            server,
        } => {
            let text = read_input(&input)?;
            let client = SummaryClient::new(server);
            let summary = client
                .summarize(&text, provider, input_type, |state| {
                    eprint!("\rProgress: {:>3}%", state.progress());
                    let _ = std::io::stderr().flush();
                })
                .await;
            eprintln!();
            println!("{}", serde_json::to_string_pretty(&summary?)?);
        }
        Command::Compare {
            input,
            providers,
            server,
        } => {
            let text = read_input(&input)?;
            let [a, b] = providers[..] else {
                return Err("exactly two providers are required".into());
            };
            let response = SummaryClient::new(server).compare(&text, [a, b]).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }
    Ok(())
}
