mod output;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use url::Url;

use courtportal_lib::courtportal_api::PortalClient;
use courtportal_lib::diagnostics::{Diagnostics, FileDiagnostics, NullDiagnostics};
use courtportal_lib::ocr::CaptchaOcr;
use courtportal_lib::prompt::CaptchaPrompt;
use courtportal_lib::{CaseLookup, Credentials, PortalConfig};

use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "courtportal")]
#[command(about = "Look up one case record on the public court portal")]
struct Cli {
    /// Case number to look up, e.g. PRMC2400654
    case_number: String,

    /// Portal base URL
    #[arg(
        long,
        default_value = "https://epublic-access.riverside.courts.ca.gov/public-portal/"
    )]
    base_url: String,

    /// Output format: table or json
    #[arg(long, default_value = "table")]
    output: String,

    /// Directory to save failing pages into for offline diagnosis
    #[arg(long)]
    diagnostics_dir: Option<PathBuf>,

    /// Skip OCR and always prompt for image CAPTCHA text
    #[arg(long)]
    no_ocr: bool,
}

/// Prompts the operator on stdin. This blocks the whole lookup, which is
/// the intended behavior: nothing else can proceed without the CAPTCHA.
struct StdinPrompt;

impl CaptchaPrompt for StdinPrompt {
    fn request_manual_captcha(&self, image_url: &str) -> Option<String> {
        println!("Please open {} in your browser.", image_url);
        print!("Enter CAPTCHA text: ");
        io::stdout().flush().ok()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line).ok()?;
        let answer = line.trim().to_string();
        if answer.is_empty() {
            None
        } else {
            Some(answer)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("courtportal=info".parse()?),
        )
        .with_target(false)
        .init();

    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let format = match cli.output.as_str() {
        "json" => OutputFormat::Json,
        _ => OutputFormat::Table,
    };

    let username =
        std::env::var("PORTAL_USERNAME").context("PORTAL_USERNAME is not set (see .env)")?;
    let password =
        std::env::var("PORTAL_PASSWORD").context("PORTAL_PASSWORD is not set (see .env)")?;

    let base_url = Url::parse(&cli.base_url).context("invalid --base-url")?;
    let config = PortalConfig::new(base_url, Credentials { username, password });
    let client = PortalClient::new()?;
    let prompt = StdinPrompt;
    let diagnostics: Box<dyn Diagnostics> = match &cli.diagnostics_dir {
        Some(dir) => Box::new(FileDiagnostics::new(dir)),
        None => Box::new(NullDiagnostics),
    };

    #[cfg(feature = "ocr")]
    let engine = courtportal_lib::ocr::TesseractOcr::new();
    #[cfg(feature = "ocr")]
    let ocr: Option<&dyn CaptchaOcr> = if cli.no_ocr { None } else { Some(&engine) };
    #[cfg(not(feature = "ocr"))]
    let ocr: Option<&dyn CaptchaOcr> = None;

    let lookup = CaseLookup::new(&client, &config, ocr, &prompt, diagnostics.as_ref());
    let record = lookup.run(&cli.case_number).await?;

    output::print_record(&record, &format)?;
    Ok(())
}
