use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "cideldill-server")]
#[command(about = "HTTP control plane for the breakpoint and call-interception service")]
pub struct Cli {
    /// Port to bind the HTTP control plane to. 0 lets the OS pick a free port.
    #[arg(long, default_value_t = 0)]
    pub port: u16,

    /// Host/interface to bind to.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Path to the sqlite object store. Ignored when `--memory` is set.
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Use an in-memory object store instead of a file on disk.
    #[arg(long)]
    pub memory: bool,

    /// Run the Model-Context-Protocol adapter over stdio instead of serving HTTP.
    #[arg(long)]
    pub mcp_stdio: bool,

    /// Increase log verbosity. May be repeated (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
