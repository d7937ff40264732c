//! Bottle Studio CLI
//!
//! Serves the bottle pipeline over HTTP or processes photos on disk.

#[cfg(feature = "cli")]
use bottle_studio::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(1);
}
