#[tokio::main]
async fn main() {
    if let Err(e) = legacy_linter_lib::run().await {
        eprintln!("legacy-linter failed to start: {}", e);
        std::process::exit(1);
    }
}
