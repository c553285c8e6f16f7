use clap::Parser;
use color_eyre::eyre::{Result, eyre};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use pixload::Engine;
use pixload::domain::entities::{
    CancelCause, DownloadData, ErrorCause, ImageFrom, MaxSize, Outcome, RequestKind,
    RequestResult, Resize, ResizeMode,
};
use pixload::infrastructure::cache::DiskCache;
use pixload::infrastructure::config::args::KindArg;
use pixload::infrastructure::config::{AppConfig, CliArgs, Command, EngineConfig, FetchArgs, StorageManager};
use pixload::infrastructure::request::{DisplayOptions, DownloadOptions, LoadOptions, RequestHandle};

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if let Some(log_path) = config.effective_log_path() {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();

        info!(path = %log_path.display(), "Logging initialized");
    } else {
        tracing_subscriber::registry().with(filter).init();
    }

    Ok(())
}

fn load_config(args: &CliArgs) -> Result<AppConfig> {
    let storage = StorageManager::new()?;
    let mut config = storage.load_config(args.config.as_deref())?;
    config.merge_with_args(args);
    Ok(config)
}

#[derive(Debug, Serialize)]
struct FetchReport<'a> {
    uri: &'a str,
    kind: RequestKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<ImageFrom>,
    #[serde(skip_serializing_if = "Option::is_none")]
    width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorCause>,
    #[serde(skip_serializing_if = "Option::is_none")]
    canceled: Option<CancelCause>,
}

impl<'a> FetchReport<'a> {
    fn new(uri: &'a str, kind: RequestKind, outcome: Outcome) -> Self {
        let mut report = Self {
            uri,
            kind,
            from: None,
            width: None,
            height: None,
            mime_type: None,
            path: None,
            error: None,
            canceled: None,
        };
        match outcome {
            Outcome::Completed(result) => {
                report.from = Some(result.image_from());
                match result {
                    RequestResult::Download(download) => {
                        if let DownloadData::DiskCache(entry) = download.data {
                            report.path = Some(entry.path().display().to_string());
                        }
                    }
                    RequestResult::Load(image) | RequestResult::Display(image) => {
                        report.width = Some(image.image.bitmap().width());
                        report.height = Some(image.image.bitmap().height());
                        report.mime_type = Some(image.image.info().mime_type.clone());
                    }
                }
            }
            Outcome::Failed(cause) => report.error = Some(cause),
            Outcome::Canceled(cause) => report.canceled = Some(cause),
        }
        report
    }

    fn print(&self, json: bool) -> Result<()> {
        if json {
            println!("{}", serde_json::to_string(self)?);
            return Ok(());
        }
        match (self.from, self.error, self.canceled) {
            (Some(from), _, _) => match (self.width, self.height) {
                (Some(width), Some(height)) => {
                    println!("{} ok {width}x{height} from {from}", self.uri);
                }
                _ => println!(
                    "{} ok from {from}{}",
                    self.uri,
                    self.path.as_ref().map(|p| format!(" at {p}")).unwrap_or_default()
                ),
            },
            (None, Some(cause), _) => println!("{} failed: {cause}", self.uri),
            (None, None, Some(cause)) => println!("{} canceled: {cause}", self.uri),
            (None, None, None) => println!("{} unknown outcome", self.uri),
        }
        Ok(())
    }
}

fn load_options(fetch: &FetchArgs) -> LoadOptions {
    let mode = if fetch.exact {
        ResizeMode::Exactly
    } else {
        ResizeMode::AspectRatioSame
    };
    LoadOptions {
        download: DownloadOptions {
            request_level: fetch.level.into(),
            disk_cache_policy: fetch.disk_cache.into(),
        },
        max_size: fetch.max_size.map(|(width, height)| MaxSize::new(width, height)),
        resize: fetch
            .resize
            .map(|(width, height)| Resize::with_mode(width, height, mode)),
        pixel_format: fetch.pixel_format.map(Into::into),
        low_quality_image: fetch.low_quality,
        ..LoadOptions::default()
    }
}

fn submit(engine: &Engine, fetch: &FetchArgs, uri: &str) -> RequestHandle {
    match fetch.kind {
        KindArg::Download => engine
            .download(uri)
            .options(load_options(fetch).download)
            .sync(fetch.sync)
            .commit(),
        KindArg::Load => engine
            .load(uri)
            .options(load_options(fetch))
            .sync(fetch.sync)
            .commit(),
        KindArg::Display => engine
            .display(uri)
            .options(DisplayOptions {
                load: load_options(fetch),
                memory_cache_policy: fetch.memory_cache.into(),
            })
            .sync(fetch.sync)
            .commit(),
    }
}

async fn run_fetch(config: EngineConfig, fetch: &FetchArgs) -> Result<()> {
    let engine = Engine::new(config).await?;
    let handles: Vec<RequestHandle> = fetch
        .uris
        .iter()
        .map(|uri| submit(&engine, fetch, uri))
        .collect();

    let mut failed = 0usize;
    for (uri, handle) in fetch.uris.iter().zip(&handles) {
        let outcome = handle.wait().await;
        if matches!(outcome, Outcome::Failed(_)) {
            failed += 1;
        }
        FetchReport::new(uri, fetch.kind.into(), outcome).print(fetch.json)?;
    }

    info!(stats = %engine.memory_cache().stats(), "Fetch finished");
    engine.shutdown();

    if failed > 0 {
        warn!(failed, "Some requests failed");
        return Err(eyre!("{failed} of {} request(s) failed", handles.len()));
    }
    Ok(())
}

async fn open_disk_cache(config: &EngineConfig) -> Result<DiskCache> {
    let cache = DiskCache::open_in(
        &config.effective_cache_dir(),
        config.app_version,
        config.disk_cache_size,
    )
    .await?;
    Ok(cache)
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = CliArgs::parse();
    let config = load_config(&args)?;
    init_logging(&config)?;

    info!(version = pixload::VERSION, "Starting pixload");

    match &args.command {
        Command::Fetch(fetch) => run_fetch(config.engine, fetch).await,
        Command::CacheInfo => {
            let cache = open_disk_cache(&config.engine).await?;
            println!("directory: {}", cache.dir().display());
            println!("entries:   {}", cache.len().await);
            println!("size:      {} / {} bytes", cache.size().await, cache.max_size());
            Ok(())
        }
        Command::ClearCache => {
            let cache = open_disk_cache(&config.engine).await?;
            cache.clear().await?;
            println!("cleared {}", cache.dir().display());
            Ok(())
        }
    }
}
