//! Binary entry point for the Meridian world server.

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    lib_meridian::init().await
}
