//! §6.1: parses args, loads `GemsieveConfig`, opens the `Store`, builds the
//! `Services` context, and dispatches — the actual work lives in
//! `gemsieve::cli`.

#[tokio::main]
async fn main() {
    if let Err(e) = gemsieve::cli::run().await {
        eprintln!("❌ {e}");
        std::process::exit(1);
    }
}
