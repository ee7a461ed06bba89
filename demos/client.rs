use argh::FromArgs;
use qrform::{FrontendConfig, HttpQrApi, QrApi, QrFormController, TargetUrl, page::FAILURE_ALERT};

#[derive(FromArgs)]
/// QR generator client for submitting URLs and probing the backend
struct ClientArgs {
    /// backend base URL (defaults to QRFORM_PUBLIC_API_URL)
    #[argh(option, short = 'b')]
    base: Option<String>,

    /// command to execute: "generate" or "health"
    #[argh(subcommand)]
    command: ClientCommands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum ClientCommands {
    Generate(GenerateCommand),
    Health(HealthCommand),
}

#[derive(FromArgs)]
/// Generate a QR code for a URL
#[argh(subcommand, name = "generate")]
struct GenerateCommand {
    /// the URL to encode
    #[argh(option, short = 'u')]
    url: String,
}

#[derive(FromArgs)]
/// Check that the backend is up
#[argh(subcommand, name = "health")]
struct HealthCommand {}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: ClientArgs = argh::from_env();

    let base = match args.base {
        Some(base) => base,
        None => FrontendConfig::from_env()?.public_api_url,
    };
    let api = HttpQrApi::new(base);

    match args.command {
        ClientCommands::Generate(generate_command) => {
            let url = TargetUrl::parse(&generate_command.url)?;
            let controller = QrFormController::new(api);

            match controller.submit(url).await {
                Ok(Some(image)) => println!("QR code: {image}"),
                Ok(None) => println!("Backend answered without an image reference"),
                Err(e) => {
                    eprintln!("{e}: {FAILURE_ALERT}");
                    std::process::exit(1);
                }
            }
        }
        ClientCommands::Health(_) => {
            let health = api.health().await?;
            println!("Result: {}", serde_json::to_string_pretty(&health)?);
        }
    }

    Ok(())
}
