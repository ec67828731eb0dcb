//! bili-proxy: HTTP reverse proxy for the bilibili web API
//!
//! Sits between a browser front-end and bilibili and provides:
//! - Video info and danmaku endpoints with the headers bilibili expects
//! - Permissive CORS so the front-end can call them from any origin
//! - Static hosting for the front-end itself

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use bili_proxy::{config::AppConfig, run_server, BiliClient};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Parser)]
#[command(name = "bili-proxy")]
#[command(version)]
#[command(about = "HTTP reverse proxy for the bilibili web API")]
#[command(long_about = "
bili-proxy forwards video info and danmaku requests to bilibili with
browser-like headers and serves them with permissive CORS.

Routes:
  GET /api/view?bvid=<bvid>   video info JSON
  GET /api/dm?cid=<cid>       danmaku XML (text/xml)
  GET /health                 liveness check
  GET /*                      static files from server.static_dir

Example usage:
  bili-proxy
  PORT=8080 bili-proxy run --config config.yaml
  bili-proxy test-upstream --bvid BV1xx411c7mD
")]
struct Cli {
    /// Path to config file (defaults: config.yaml, config.yml, ./config/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Set logging level (trace, debug, info, warn, error)
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<LogLevel>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    /// Used when no subcommand is given
    #[command(flatten)]
    run: RunArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the proxy server (default)
    Run(RunArgs),

    /// Validate configuration file
    CheckConfig,

    /// Test both bilibili endpoints with the configured headers
    TestUpstream {
        /// Video to look up
        #[arg(long, default_value = "BV1xx411c7mD")]
        bvid: String,
    },
}

#[derive(clap::Args, Debug, Default)]
struct RunArgs {
    /// Override listen port (an empty PORT counts as unset)
    #[arg(short, long, env = "PORT")]
    port: Option<String>,

    /// Override listen address
    #[arg(long)]
    host: Option<String>,

    /// Override static front-end directory
    #[arg(long)]
    static_dir: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.log_level, cli.log_format);

    match cli.command {
        Some(Commands::Run(args)) => run_proxy(cli.config, args).await?,
        None => run_proxy(cli.config, cli.run).await?,
        Some(Commands::CheckConfig) => check_config(cli.config),
        Some(Commands::TestUpstream { bvid }) => test_upstream(cli.config, &bvid).await?,
    }

    Ok(())
}

impl RunArgs {
    /// Port override, `None` when neither `--port` nor a non-empty `PORT` is given
    fn listen_port(&self) -> anyhow::Result<Option<u16>> {
        match self.port.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => raw
                .parse::<u16>()
                .map(Some)
                .map_err(|e| anyhow::anyhow!("invalid port {:?}: {}", raw, e)),
        }
    }
}

fn init_tracing(level: Option<LogLevel>, format: LogFormat) {
    let filter = match level {
        Some(level) => tracing_subscriber::EnvFilter::new(level.to_string()),
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Run the proxy server
async fn run_proxy(config_path: Option<PathBuf>, args: RunArgs) -> anyhow::Result<()> {
    let mut config = load_config_or_exit(config_path.as_deref());

    if let Some(port) = args.listen_port()? {
        config.server.port = port;
    }
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(dir) = args.static_dir {
        config.server.static_dir = dir;
    }
    config.validate()?;

    run_server(config)
        .await
        .map_err(|e| anyhow::anyhow!("server error: {}", e))
}

/// Validate configuration file
fn check_config(config_path: Option<PathBuf>) {
    match AppConfig::load_or_default(config_path.as_deref()) {
        Ok(config) => {
            println!("✓ Configuration is valid\n");
            println!("Server:");
            println!("  Listen: {}:{}", config.server.host, config.server.port);
            println!("  Static dir: {}", config.server.static_dir);
            println!("\nUpstream:");
            println!("  View URL: {}", config.upstream.view_url);
            println!("  Comment URL: {}", config.upstream.comment_base());
            println!("  Timeout: {}s (connect {}s)", config.upstream.timeout_seconds, config.upstream.connect_timeout_seconds);
            println!("\nHeaders:");
            println!("  User-Agent: {}", config.upstream.headers.user_agent);
            println!("  Referer: {}", config.upstream.headers.referer);
            println!("  Origin: {}", config.upstream.headers.origin);
        }
        Err(e) => {
            eprintln!("✗ Configuration error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Call both upstream endpoints and report what came back
async fn test_upstream(config_path: Option<PathBuf>, bvid: &str) -> anyhow::Result<()> {
    let config = load_config_or_exit(config_path.as_deref());
    let client = BiliClient::new(&config.upstream)?;

    println!("Testing video info for {}: {}", bvid, config.upstream.view_url);

    let info = match client.fetch_video_info(bvid).await {
        Ok(body) => body,
        Err(e) => {
            println!("✗ Video info failed: {}", e);
            std::process::exit(1);
        }
    };
    let json: serde_json::Value = serde_json::from_slice(&info)?;
    println!("✓ Video info reachable ({} bytes)", info.len());
    if let Some(code) = json.get("code").and_then(|c| c.as_i64()) {
        println!("  API code: {}", code);
    }
    if let Some(title) = json.pointer("/data/title").and_then(|t| t.as_str()) {
        println!("  Title: {}", title);
    }

    let cid = match json.pointer("/data/cid").and_then(|c| c.as_u64()) {
        Some(cid) => cid.to_string(),
        None => {
            println!("✗ No data.cid in response, cannot test danmaku");
            std::process::exit(1);
        }
    };

    println!("\nTesting danmaku for cid {}: {}", cid, client.danmaku_url(&cid));
    match client.fetch_danmaku(&cid).await {
        Ok(xml) => {
            println!("✓ Danmaku reachable ({} bytes)", xml.len());
            println!("  Entries: {}", xml.matches("<d ").count());
        }
        Err(e) => {
            println!("✗ Danmaku failed: {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Load configuration or exit with error
fn load_config_or_exit(config_path: Option<&std::path::Path>) -> AppConfig {
    match AppConfig::load_or_default(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            eprintln!("\nRun without --config to use built-in defaults,");
            eprintln!("or see config.yaml.default for every available setting.");
            std::process::exit(1);
        }
    }
}
