use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use streamscope_cli::{
    render_groups, replay_file, watch, Config, OutputFormat, WatchRequest, REPLAY_URL,
};
use streamscope_panel::{resolve_language, set_language, FilePreferenceStore, Language, PanelSession};

#[derive(Parser)]
#[command(name = "streamscope", about = "Inspect streamed responses the way a devtools panel sees them")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch or subscribe to a live URL and show the reconstructed stream
    Watch {
        url: String,

        /// Open the URL as an EventSource
        #[arg(long)]
        event_source: bool,

        #[arg(long, default_value = "GET")]
        method: String,

        /// Request header as `name: value` (repeatable)
        #[arg(long = "header", short = 'H')]
        headers: Vec<String>,

        #[arg(long)]
        body: Option<String>,

        /// Only show events whose URL, kind or event name contains this text
        #[arg(long)]
        filter: Option<String>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },

    /// Replay a captured response body through the pipeline
    Replay {
        file: PathBuf,

        /// URL the capture is attributed to
        #[arg(long, default_value = REPLAY_URL)]
        url: String,

        /// Bytes per delivered chunk (overrides config)
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Response content type (overrides config)
        #[arg(long)]
        content_type: Option<String>,

        #[arg(long)]
        filter: Option<String>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },

    /// Show or set the panel display language
    Language {
        /// One of en, zh_CN, ja, fr
        #[arg(long)]
        set: Option<String>,

        /// UI locale used when no language was chosen
        #[arg(long, default_value = "en")]
        locale: String,

        #[arg(long, default_value = "streamscope-prefs.json")]
        store: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file
    dotenvy::dotenv().ok();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    let cli = Cli::parse();
    if let Err(e) = run(cli.command, config).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(command: Commands, mut config: Config) -> Result<()> {
    match command {
        Commands::Watch {
            url,
            event_source,
            method,
            headers,
            body,
            filter,
            output,
        } => {
            let request = WatchRequest {
                url,
                event_source,
                method,
                headers: headers
                    .iter()
                    .map(|h| parse_header(h))
                    .collect::<Result<Vec<_>>>()?,
                body,
            };
            let client = reqwest::Client::builder().build()?;
            let session = watch(config, client, request).await?;
            print_session(session, filter, output)
        }
        Commands::Replay {
            file,
            url,
            chunk_size,
            content_type,
            filter,
            output,
        } => {
            if let Some(chunk_size) = chunk_size {
                config.capture = config.capture.with_chunk_size(chunk_size);
            }
            if let Some(content_type) = content_type {
                config.capture = config.capture.with_content_type(content_type);
            }
            let session = replay_file(config, &file, &url).await?;
            print_session(session, filter, output)
        }
        Commands::Language { set, locale, store } => {
            let store = FilePreferenceStore::new(store);
            if let Some(choice) = set {
                let language: Language = choice.parse()?;
                set_language(&store, language).await?;
            }
            println!("{}", resolve_language(&store, &locale).await);
            Ok(())
        }
    }
}

fn parse_header(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| anyhow!("header must look like `name: value`, got {:?}", raw))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}

fn print_session(mut session: PanelSession, filter: Option<String>, output: OutputFormat) -> Result<()> {
    if let Some(filter) = filter {
        session.set_filter_text(&filter);
    }
    tracing::info!(events = session.len(), "capture complete");
    let stdout = std::io::stdout();
    render_groups(&mut stdout.lock(), &session.snapshot(), output)
}

fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    // stdout carries the rendered capture
    match config.logging.format.as_str() {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
                .init();
        }
    }
}
