//! CLI entry point for the TFR GeoJSON builder.
//!
//! Fetches the active Temporary Flight Restriction list, retrieves each
//! notice's detail document, and writes the restricted areas as a GeoJSON
//! FeatureCollection. Also offers a listing dump, a CSV summary and a raw
//! XML archive.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand, error::ErrorKind};
use tfr_geojson::{
    config::{ListingFormat, Settings},
    fetch::client_from_settings,
    listing::resolve_notices,
    output::{append_summary, write_geojson},
    pipeline::{archive_documents, build_feature_collection, collect_records},
};
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "tfr_geojson")]
#[command(about = "Convert active FAA TFR notices into GeoJSON", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    // Used when no subcommand is given: `tfr_geojson <OUTPUT_FILE>`.
    #[command(flatten)]
    geojson: GeojsonArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the GeoJSON FeatureCollection of all active TFRs
    Geojson(GeojsonArgs),
    /// Resolve and log the active notice identifiers
    List {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Append one CSV row per active notice
    Summary {
        /// CSV file to append rows to
        #[arg(value_name = "OUTPUT_CSV")]
        output: PathBuf,

        #[command(flatten)]
        source: SourceArgs,
    },
    /// Download raw detail XML documents into a directory
    Archive {
        /// Directory to save detail_<id>.xml files in
        #[arg(value_name = "DIR", default_value = "tfr_xml_files")]
        dir: PathBuf,

        #[command(flatten)]
        source: SourceArgs,
    },
}

#[derive(Args)]
struct GeojsonArgs {
    /// Path to the output file
    #[arg(value_name = "OUTPUT_FILE")]
    output_file: Option<PathBuf>,

    /// Gzip-compress the output
    #[arg(long, default_value_t = false)]
    gzip: bool,

    #[command(flatten)]
    source: SourceArgs,
}

/// Endpoint and pool overrides shared by every subcommand.
#[derive(Args)]
struct SourceArgs {
    /// Listing shape: json, html-table or detail-links
    #[arg(short, long)]
    format: Option<ListingFormat>,

    /// Listing endpoint URL
    #[arg(long)]
    list_url: Option<String>,

    /// Detail URL template, `{}` is replaced by the notice id
    #[arg(long)]
    detail_url_template: Option<String>,

    /// Maximum number of concurrent detail downloads
    #[arg(short, long)]
    concurrency: Option<usize>,
}

impl SourceArgs {
    fn apply(self, mut settings: Settings) -> Result<Settings> {
        if let Some(format) = self.format {
            settings = settings.with_format(format);
        }
        if let Some(url) = self.list_url {
            settings.list_url = url;
        }
        if let Some(template) = self.detail_url_template {
            settings.detail_url_template = template;
        }
        if let Some(concurrency) = self.concurrency {
            settings.concurrency = concurrency;
        }
        settings.validate()?;
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/tfr_geojson.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("tfr_geojson.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Geojson(cli.geojson));
    let base = Settings::from_env()?;

    match command {
        Commands::Geojson(GeojsonArgs {
            output_file,
            gzip,
            source,
        }) => {
            let Some(output_file) = output_file else {
                Cli::command()
                    .error(ErrorKind::MissingRequiredArgument, "OUTPUT_FILE is required")
                    .exit();
            };
            let settings = source.apply(base)?;
            let client = Arc::new(client_from_settings(&settings)?);
            // A failed listing returns early here, before any file is created.
            let (collection, _report) = build_feature_collection(client, &settings).await?;
            write_geojson(&output_file, &collection, gzip)?;
        }
        Commands::List { source } => {
            let settings = source.apply(base)?;
            let client = client_from_settings(&settings)?;
            let notices = resolve_notices(&client, &settings).await?;

            for notice in &notices {
                let meta = &notice.metadata;
                info!(
                    notam = %notice.id,
                    facility = meta.facility.as_deref().unwrap_or("-"),
                    state = meta.state.as_deref().unwrap_or("-"),
                    kind = meta.notice_type.as_deref().unwrap_or("-"),
                    description = meta.description.as_deref().unwrap_or("-"),
                    "Notice"
                );
            }

            let with_metadata = notices
                .iter()
                .filter(|n| n.metadata.facility.is_some() || n.metadata.notice_type.is_some())
                .count();
            info!(total = notices.len(), with_metadata, "Listing summary");
        }
        Commands::Summary { output, source } => {
            let settings = source.apply(base)?;
            let client = Arc::new(client_from_settings(&settings)?);
            let report = collect_records(client, &settings).await?;
            append_summary(&output, &report.records)?;
            report.log_summary(report.feature_collection().features.len());
        }
        Commands::Archive { dir, source } => {
            let settings = source.apply(base)?;
            let client = Arc::new(client_from_settings(&settings)?);
            archive_documents(client, &settings, &dir).await?;
        }
    }

    Ok(())
}
