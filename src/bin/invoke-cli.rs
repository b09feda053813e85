use std::path::PathBuf;

use clap::Parser;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "invoke-cli")]
#[command(about = "Send a gateway request to a locally running function host", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:7000")]
    url: String,

    /// JSON file holding an API Gateway v2 request
    #[arg(default_value = "fixtures/get_webhook_api_gtw.json")]
    request: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let request: Value = serde_json::from_str(&std::fs::read_to_string(&cli.request)?)?;

    let client = reqwest::Client::new();
    let res = client
        .post(format!("{}/invoke", cli.url.trim_end_matches('/')))
        .json(&request)
        .send()
        .await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: function host returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
