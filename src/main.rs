use clap::Parser;
use keyrotate::cli::{self, Cli};
use keyrotate::logging::{init_logging, DEFAULT_FILTER};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();
    init_logging(DEFAULT_FILTER);

    let cli = Cli::parse();
    let code = cli::commands::run(cli).await?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
