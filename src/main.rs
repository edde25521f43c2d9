use std::{fs, path::PathBuf, process::ExitCode};

use arboard::Clipboard;
use clap::Parser;
use meal_lens::{ClientConfig, MealApp, MealClient, Phase, report};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the meal photo (JPG, PNG or WEBP, up to 10MB)
    image_path: PathBuf,

    /// Model to ask for the estimate
    #[arg(long)]
    model: Option<String>,

    /// Override the inference service base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Print the result as JSON instead of the text report
    #[arg(long)]
    json: bool,

    /// Output the report to a file with the same name as the input image
    #[arg(long)]
    text: bool,

    /// Copy the report to the clipboard
    #[arg(long)]
    clip: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    env_logger::init();

    let args = Args::parse();

    let mut config = ClientConfig::from_env();
    if let Some(model) = args.model {
        config = config.with_model(model);
    }
    if let Some(base_url) = &args.base_url {
        config = config.with_base_url(base_url)?;
    }

    let client = MealClient::new(config)?;
    log::debug!(
        "Using model {} at {}",
        client.config().model,
        client.config().base_url
    );
    let mut app = MealApp::new(&client);

    if let Err(e) = app.submit_path(&args.image_path).await {
        eprintln!("Error: {}", e);
        return Ok(ExitCode::FAILURE);
    }

    let state = app.state();
    let output = match (args.json, state.result()) {
        (true, Some(result)) => serde_json::to_string_pretty(result)?,
        _ => report::render(state),
    };

    if state.phase() == Phase::Error {
        eprint!("{}", output);
        return Ok(ExitCode::FAILURE);
    }

    if !args.text && !args.clip {
        println!("{}", output.trim_end());
    }

    if args.text {
        let mut path = args.image_path.clone();
        path.set_extension("txt");
        fs::write(&path, &output)?;
        log::info!("Report saved to {:?}", path);
    }

    if args.clip {
        match Clipboard::new() {
            Ok(mut clipboard) => {
                if let Err(e) = clipboard.set_text(output.as_str()) {
                    eprintln!("Failed to copy to clipboard: {}", e);
                }
            }
            Err(e) => eprintln!("Failed to initialize clipboard: {}", e),
        }
    }

    Ok(ExitCode::SUCCESS)
}
