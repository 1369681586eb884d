use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stitchkit::models::AppConfig;
use stitchkit::services::{
    CommandShare, FilePicker, HttpTransferClient, LogShare, PipelineController, PipelineState,
    ShareSink,
};

#[derive(Parser)]
#[command(name = "stitchkit")]
#[command(about = "Turn a photo into a stitch pattern via a remote transformation service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send an image to the service and export the returned pattern
    Convert {
        /// Image file to transform
        image: PathBuf,

        /// Number of thread colours (2-15)
        #[arg(short, long)]
        colors: Option<i64>,

        /// Print size (positive)
        #[arg(short, long)]
        size: Option<i64>,

        /// Directory the pattern is exported to (overrides config)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Config file (overrides CONFIG_FILE)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Hand the exported file to the configured share command
        #[arg(long)]
        share: bool,

        /// Print the export record as JSON
        #[arg(long)]
        json: bool,

        /// Only log warnings and errors
        #[arg(short, long)]
        quiet: bool,
    },
    /// Show environment and effective configuration
    Status {
        /// Config file (overrides CONFIG_FILE)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Convert {
            image,
            colors,
            size,
            output_dir,
            config,
            share,
            json,
            quiet,
        }) => {
            init_logging(quiet);
            run_convert_command(ConvertArgs {
                image,
                colors,
                size,
                output_dir,
                config,
                share,
                json,
            })
            .await
        }
        Some(Commands::Status { config }) => {
            init_logging(true);
            run_status_command(config.as_deref())
        }
        None => {
            init_logging(true);
            run_status_command(None)
        }
    }
}

fn init_logging(quiet: bool) {
    let default_filter = if quiet {
        "stitchkit=warn"
    } else {
        "stitchkit=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();
}

struct ConvertArgs {
    image: PathBuf,
    colors: Option<i64>,
    size: Option<i64>,
    output_dir: Option<PathBuf>,
    config: Option<PathBuf>,
    share: bool,
    json: bool,
}

fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var("CONFIG_FILE").ok().map(PathBuf::from))
}

/// One-shot pipeline run: select, transform, export
async fn run_convert_command(args: ConvertArgs) -> anyhow::Result<()> {
    let mut config = AppConfig::load(config_path(args.config.as_deref()).as_deref());
    if let Some(dir) = args.output_dir {
        config.export_dir = dir;
    }
    config.validate().context("Invalid configuration")?;

    let share: Arc<dyn ShareSink> = if args.share {
        match config.share_command.as_deref().and_then(CommandShare::from_argv) {
            Some(command) => Arc::new(command),
            None => {
                tracing::warn!("No share_command configured, only writing the file");
                Arc::new(LogShare)
            }
        }
    } else {
        Arc::new(LogShare)
    };

    let client = HttpTransferClient::from_config(&config)?;
    let mut pipeline = PipelineController::from_config(&config, Arc::new(client), share)?;

    if let Some(colors) = args.colors {
        pipeline.set_color_count(colors)?;
    }
    if let Some(size) = args.size {
        pipeline.set_print_size(size)?;
    }

    let picker = FilePicker::new(&args.image);
    let request = pipeline
        .select_image(&picker)
        .await
        .with_context(|| format!("Failed to select {}", args.image.display()))?;

    pipeline.run(&request).await;
    if pipeline.state() != PipelineState::Ready {
        let reason = pipeline
            .error()
            .map(ToString::to_string)
            .unwrap_or_else(|| format!("pipeline is {}", pipeline.state()));
        anyhow::bail!("Transformation failed: {reason}");
    }

    let handle = pipeline.export().await.context("Export failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&handle)?);
    } else {
        println!("{}", handle.path.display());
    }
    Ok(())
}

fn run_status_command(explicit_config: Option<&Path>) -> anyhow::Result<()> {
    const VERSION: &str = env!("CARGO_PKG_VERSION");

    let config_file = std::env::var("CONFIG_FILE").ok();
    let endpoint_url = std::env::var("ENDPOINT_URL").ok();

    println!("Stitchkit v{VERSION}");
    println!("Photo to stitch pattern client\n");

    println!("Environment Variables:");
    println!(
        "  CONFIG_FILE  = {}",
        config_file.as_deref().unwrap_or("(not set)")
    );
    println!(
        "  ENDPOINT_URL = {}",
        endpoint_url.as_deref().unwrap_or("(not set)")
    );

    let path = config_path(explicit_config);
    let source = match &path {
        Some(p) if p.exists() => p.display().to_string(),
        Some(_) => "defaults (file not found)".to_string(),
        None => "defaults".to_string(),
    };
    let config = AppConfig::load(path.as_deref());

    println!("\nConfiguration ({source}):");
    println!("  Endpoint:        {}", config.endpoint);
    println!(
        "  Timeouts:        {}s request, {}s connect",
        config.request_timeout_secs, config.connect_timeout_secs
    );
    println!(
        "  Defaults:        colors={} size={}",
        config.default_colors, config.default_size
    );
    println!("  Image field:     {}", config.image_field);
    println!("  Export dir:      {}", config.export_dir.display());
    println!(
        "  Share command:   {}",
        config
            .share_command
            .as_ref()
            .map(|argv| argv.join(" "))
            .unwrap_or_else(|| "(none)".to_string())
    );

    if let Err(e) = config.validate() {
        println!("\n  Warning: {e}");
    }

    println!("\nRun 'stitchkit convert <IMAGE>' to transform a photo.");
    println!("Run 'stitchkit --help' for all options.");
    Ok(())
}
