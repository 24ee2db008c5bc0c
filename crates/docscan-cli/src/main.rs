//! docscan - hot-folder document scanner.
//!
//! Watches an intake folder, extracts text and structured metadata from new
//! scans, writes a summarised report under a canonical name and archives
//! the original.

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    cli::run().await
}
