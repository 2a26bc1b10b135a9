#[tokio::main]
async fn main() {
    if let Err(e) = lib_aegis_logwatcher::init().await {
        eprintln!("fatal startup error: {e}");
        std::process::exit(1);
    }
}
