use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sigstream")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Identify binary content by its leading bytes", long_about = None)]
pub struct Cli {
    /// Files to classify; `-` reads standard input
    #[arg(required_unless_present = "list")]
    pub paths: Vec<PathBuf>,

    /// Additional JSON signature catalog (repeatable)
    #[arg(short, long = "catalog")]
    pub catalogs: Vec<PathBuf>,

    /// Do not load the built-in signatures
    #[arg(long)]
    pub no_builtin: bool,

    /// Skip malformed signatures instead of failing
    #[arg(long)]
    pub lenient: bool,

    /// Read size in bytes
    #[arg(long, default_value_t = 64 * 1024)]
    pub chunk_size: usize,

    /// Give up after this many bytes without a decision
    #[arg(long)]
    pub limit: Option<u64>,

    /// Caller-supplied metadata, kept over values found in the stream
    #[arg(short, long = "meta", value_parser = parse_meta)]
    pub metadata: Vec<(String, String)>,

    /// Print one JSON report per line
    #[arg(long)]
    pub json: bool,

    /// Include the visited decision nodes in reports
    #[arg(long)]
    pub trace: bool,

    /// List the loaded signatures and exit
    #[arg(long)]
    pub list: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(short, long)]
    pub debug: bool,
}

impl Cli {
    /// Default log filter when `RUST_LOG` is unset
    pub fn log_filter(&self) -> &'static str {
        match (self.debug, self.verbose) {
            (true, _) => "sigstream=trace",
            (false, true) => "sigstream=debug",
            _ => "warn",
        }
    }
}

fn parse_meta(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))
}
