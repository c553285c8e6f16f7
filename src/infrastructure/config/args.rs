use super::app_config::LogLevel;
use crate::domain::entities::{CachePolicy, PixelFormat, RequestKind, RequestLevel};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "pixload",
    version,
    about = "Image loading engine with shared downloads and layered caches",
    long_about = None
)]
pub struct CliArgs {
    /// Configuration file path.
    #[arg(short, long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[arg(long, value_name = "PATH", global = true)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum, global = true)]
    pub log_level: Option<LogLevel>,

    /// Cache root directory.
    #[arg(long, value_name = "PATH", global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Application version; changing it discards the disk cache.
    #[arg(long, global = true)]
    pub app_version: Option<u32>,

    /// Concurrent downloads.
    #[arg(long, global = true)]
    pub download_workers: Option<usize>,

    /// Concurrent decodes.
    #[arg(long, global = true)]
    pub load_workers: Option<usize>,

    /// HTTP timeout in seconds.
    #[arg(long, global = true)]
    pub http_timeout: Option<u64>,

    /// Bypass the disk cache.
    #[arg(long, global = true)]
    pub no_disk_cache: bool,

    /// Never touch the network.
    #[arg(long, global = true)]
    pub pause_download: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run requests for one or more URIs and print their outcomes.
    Fetch(FetchArgs),
    /// Print disk cache usage.
    CacheInfo,
    /// Delete every disk cache entry.
    ClearCache,
}

/// Arguments of `fetch`.
#[derive(Debug, clap::Args)]
pub struct FetchArgs {
    /// URIs to request (http, https, file, data or absolute paths).
    #[arg(required = true)]
    pub uris: Vec<String>,

    /// Request kind.
    #[arg(long, value_enum, default_value_t = KindArg::Display)]
    pub kind: KindArg,

    /// Furthest tier the request may reach.
    #[arg(long, value_enum, default_value_t = LevelArg::Net)]
    pub level: LevelArg,

    /// Decode no larger than WIDTHxHEIGHT.
    #[arg(long, value_name = "WxH", value_parser = parse_dimensions)]
    pub max_size: Option<(u32, u32)>,

    /// Resize to WIDTHxHEIGHT after decoding.
    #[arg(long, value_name = "WxH", value_parser = parse_dimensions)]
    pub resize: Option<(u32, u32)>,

    /// Resize to exactly the requested size instead of keeping the aspect ratio.
    #[arg(long, requires = "resize")]
    pub exact: bool,

    /// Output pixel layout.
    #[arg(long, value_enum)]
    pub pixel_format: Option<FormatArg>,

    /// Prefer speed over quality when scaling.
    #[arg(long)]
    pub low_quality: bool,

    /// Disk cache permissions.
    #[arg(long, value_enum, default_value_t = PolicyArg::Enabled)]
    pub disk_cache: PolicyArg,

    /// Memory cache permissions.
    #[arg(long, value_enum, default_value_t = PolicyArg::Enabled)]
    pub memory_cache: PolicyArg,

    /// Run every phase inline instead of on the worker pools.
    #[arg(long)]
    pub sync: bool,

    /// Print outcomes as JSON lines.
    #[arg(long)]
    pub json: bool,
}

/// Request kind selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    /// Bytes only.
    Download,
    /// Decode without the memory cache.
    Load,
    /// Decode through the memory cache.
    Display,
}

impl From<KindArg> for RequestKind {
    fn from(value: KindArg) -> Self {
        match value {
            KindArg::Download => Self::Download,
            KindArg::Load => Self::Load,
            KindArg::Display => Self::Display,
        }
    }
}

/// Request level selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LevelArg {
    /// Memory cache only.
    Memory,
    /// No network.
    Local,
    /// Anything.
    Net,
}

impl From<LevelArg> for RequestLevel {
    fn from(value: LevelArg) -> Self {
        match value {
            LevelArg::Memory => Self::Memory,
            LevelArg::Local => Self::Local,
            LevelArg::Net => Self::Net,
        }
    }
}

/// Cache policy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    /// Read and write.
    Enabled,
    /// Lookups only.
    ReadOnly,
    /// Stores only.
    WriteOnly,
    /// Bypass.
    Disabled,
}

impl From<PolicyArg> for CachePolicy {
    fn from(value: PolicyArg) -> Self {
        match value {
            PolicyArg::Enabled => Self::Enabled,
            PolicyArg::ReadOnly => Self::ReadOnly,
            PolicyArg::WriteOnly => Self::WriteOnly,
            PolicyArg::Disabled => Self::Disabled,
        }
    }
}

/// Pixel layout selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    /// 8-bit RGBA.
    Rgba8888,
    /// 8-bit RGB.
    Rgb888,
    /// 8-bit luminance and alpha.
    La88,
    /// 8-bit luminance.
    L8,
}

impl From<FormatArg> for PixelFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Rgba8888 => Self::Rgba8888,
            FormatArg::Rgb888 => Self::Rgb888,
            FormatArg::La88 => Self::La88,
            FormatArg::L8 => Self::L8,
        }
    }
}

/// Parses `WIDTHxHEIGHT`.
fn parse_dimensions(value: &str) -> Result<(u32, u32), String> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {value:?}"))?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|e| format!("invalid width: {e}"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|e| format!("invalid height: {e}"))?;
    if width == 0 || height == 0 {
        return Err("dimensions must be positive".to_string());
    }
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("100x100", Some((100, 100)) ; "square")]
    #[test_case("640X480", Some((640, 480)) ; "upper case separator")]
    #[test_case("0x10", None ; "zero width")]
    #[test_case("100", None ; "missing separator")]
    #[test_case("ax10", None ; "not a number")]
    fn test_parse_dimensions(input: &str, expected: Option<(u32, u32)>) {
        assert_eq!(parse_dimensions(input).ok(), expected);
    }

    #[test]
    fn test_fetch_defaults() {
        let args = CliArgs::parse_from(["pixload", "fetch", "http://x/img.jpg"]);
        let Command::Fetch(fetch) = args.command else {
            panic!("expected fetch");
        };
        assert_eq!(fetch.uris, vec!["http://x/img.jpg".to_string()]);
        assert_eq!(fetch.kind, KindArg::Display);
        assert_eq!(fetch.level, LevelArg::Net);
        assert!(fetch.max_size.is_none());
        assert!(!fetch.sync);
    }

    #[test]
    fn test_fetch_options() {
        let args = CliArgs::parse_from([
            "pixload",
            "fetch",
            "--kind",
            "load",
            "--max-size",
            "100x100",
            "--resize",
            "50x20",
            "--exact",
            "--memory-cache",
            "read-only",
            "a.png",
            "b.png",
        ]);
        let Command::Fetch(fetch) = args.command else {
            panic!("expected fetch");
        };
        assert_eq!(fetch.kind, KindArg::Load);
        assert_eq!(fetch.max_size, Some((100, 100)));
        assert_eq!(fetch.resize, Some((50, 20)));
        assert!(fetch.exact);
        assert_eq!(CachePolicy::from(fetch.memory_cache), CachePolicy::ReadOnly);
        assert_eq!(fetch.uris.len(), 2);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = CliArgs::parse_from(["pixload", "clear-cache", "--cache-dir", "/tmp/x"]);
        assert!(matches!(args.command, Command::ClearCache));
        assert_eq!(args.cache_dir, Some(PathBuf::from("/tmp/x")));
    }
}
