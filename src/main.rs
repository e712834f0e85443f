use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};
use upload_converter::imaging::{Converter, ImageEngine, RustEngine};
use upload_converter::pipeline::{self, FsBucket, UploadEvent};
use upload_converter::{config, output};

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "upload-converter")]
#[command(about = "Convert uploaded images to a single format, with optional thumbnails")]
#[command(long_about = "\
Convert uploaded images to a single format, with optional thumbnails

A bucket is a directory. Every object written to it is checked against the
allow-list, converted to the target format and, when enabled, given a
bounded thumbnail stored next to it:

  bucket/
  ├── uploads/photo.png            # Upload (deleted after conversion)
  ├── uploads/photo.jpg            # Converted output  (converted=true)
  └── uploads/photo_thumb.jpg      # Thumbnail         (thumbnail=true)

Custom object metadata lives in <object>.meta.json sidecars. Objects tagged
converted=true or thumbnail=true are never processed again.

Configuration layers (later wins):
  stock defaults → config.toml → IMAGECONVERTER_<KEY> environment variables

Run 'upload-converter gen-config' to generate a documented config.toml.
Set RUST_LOG to control log verbosity (default: info).")]
#[command(version = version_string())]
struct Cli {
    /// Bucket directory (defaults to img_bucket from the configuration)
    #[arg(long, global = true)]
    bucket: Option<PathBuf>,

    /// Configuration file
    #[arg(long, default_value = "config.toml", global = true)]
    config: PathBuf,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process a single upload
    Handle {
        /// Object name inside the bucket
        #[arg(required_unless_present = "event")]
        object: Option<String>,
        /// Read the finalize event from a JSON file instead
        #[arg(long, conflicts_with = "object")]
        event: Option<PathBuf>,
    },
    /// Print format and dimensions of an image file as JSON
    Probe {
        file: PathBuf,
    },
    /// Validate configuration and print the resolved values
    Check,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match cli.command {
        Command::Handle { object, event } => {
            let config = config::load_config(Some(&cli.config), std::env::vars())?;
            let bucket = open_bucket(cli.bucket, &config)?;
            let event = match (event, object) {
                (Some(path), _) => UploadEvent::from_json(&std::fs::read_to_string(path)?)?,
                (None, Some(name)) => bucket.event_for(&name)?,
                (None, None) => return Err("an object name or --event is required".into()),
            };
            let converter = converter_for(&bucket, &config);
            let outcome = pipeline::handle_upload(&bucket, &converter, &config, &event)?;
            output::print_upload_outcome(&outcome);
            if outcome.has_failure() {
                return Err(format!("processing {} failed", outcome.name()).into());
            }
        }
        Command::Probe { file } => {
            let buffer = std::fs::read(&file)?;
            let metadata = RustEngine::new().probe(&buffer)?;
            println!("{}", serde_json::to_string_pretty(&metadata)?);
        }
        Command::Check => {
            println!("==> Checking {}", cli.config.display());
            let config = config::load_config(Some(&cli.config), std::env::vars())?;
            print!("{}", toml::to_string_pretty(&config)?);
            println!("==> Configuration is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Install the global subscriber. Logs go to stderr so stdout stays clean
/// for command output.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Resolve the bucket directory: `--bucket` wins over `img_bucket`.
fn open_bucket(
    cli_bucket: Option<PathBuf>,
    config: &config::ConverterConfig,
) -> Result<FsBucket, Box<dyn std::error::Error>> {
    let root = match cli_bucket {
        Some(root) => root,
        None if !config.img_bucket.is_empty() => PathBuf::from(&config.img_bucket),
        None => return Err("no bucket: pass --bucket or set img_bucket".into()),
    };
    Ok(FsBucket::new(root)?)
}

fn converter_for(bucket: &FsBucket, config: &config::ConverterConfig) -> Converter<RustEngine> {
    let span = tracing::info_span!(
        "converter",
        bucket = %bucket.name(),
        location = %config.location
    );
    Converter::with_span(RustEngine::new(), span)
}
