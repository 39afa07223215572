//! Sentinel session probe
//!
//! Command-line front end for the session provider: performs one full
//! anonymous session acquisition (identity rotation, negotiation,
//! proof-of-work) and prints the resulting credential summary as JSON.
//!
//! # Usage
//!
//! ```bash
//! sentinel-probe --verbose
//! sentinel-probe --base-url https://chat.example.test --proxy socks5://127.0.0.1:9050
//! sentinel-probe --config /path/to/config.toml
//! ```

use clap::Parser;

use sentinel_session_provider::cli::{AcquireArgs, run_acquire_mode};

#[derive(Parser)]
#[command(author, version = sentinel_session_provider::utils::VERSION, about, long_about = None)]
#[command(name = "sentinel-probe")]
struct Cli {
    /// Configuration file path
    #[arg(long, value_name = "CONFIG")]
    config: Option<String>,

    /// Backend base URL override
    #[arg(long, value_name = "BASE_URL")]
    base_url: Option<String>,

    /// Proxy server URL (http://host:port, socks5://host:port, etc.)
    #[arg(short, long, value_name = "PROXY")]
    proxy: Option<String>,

    /// Browser user-agent string to impersonate
    #[arg(short, long, value_name = "USER_AGENT")]
    user_agent: Option<String>,

    /// Locale advertised alongside the user agent
    #[arg(short, long, value_name = "LOCALE")]
    locale: Option<String>,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let args = AcquireArgs {
        config: cli.config,
        base_url: cli.base_url,
        proxy: cli.proxy,
        user_agent: cli.user_agent,
        locale: cli.locale,
        verbose: cli.verbose,
    };
    run_acquire_mode(args).await
}
