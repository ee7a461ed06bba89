use argh::FromArgs;
use qrform::{FrontendConfig, server};

#[derive(FromArgs)]
/// Serves the QR generator form and proxies /api/proxy/* to the backend.
struct FrontendArgs {
    /// the host to run the server on (overrides QRFORM_HOST)
    #[argh(option, short = 'h')]
    host: Option<String>,

    /// the port to run the server on (overrides QRFORM_PORT)
    #[argh(option, short = 'p')]
    port: Option<u16>,

    /// base URL submissions are posted to (overrides QRFORM_PUBLIC_API_URL)
    #[argh(option, short = 'b')]
    api_base: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: FrontendArgs = argh::from_env();

    let mut config = FrontendConfig::from_env()?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(base) = args.api_base {
        config.public_api_url = base;
    }

    log::info!("🚀 Starting the QR generator front-end");
    log::info!("🔧 Press Ctrl+C to stop the server");

    server::serve(&config).await?;

    Ok(())
}
