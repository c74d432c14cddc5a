use anyhow::{bail, Context};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use page_extractor::pipeline::normalize_url;
use page_extractor::{ArtifactStore, ExtractionRequest, Extractor, ExtractorConfig, Mode};

#[derive(Parser, Debug)]
#[command(author, version, about = "Extract the readable text of a web page", long_about = None)]
struct Args {
    /// Page to extract
    #[arg(short, long)]
    url: String,

    /// Artifact file name (".txt" is appended when missing)
    #[arg(short, long)]
    filename: Option<String>,

    /// How the page is loaded; defaults to EXTRACTION_MODE or `static`
    #[arg(short, long, value_enum)]
    mode: Option<Mode>,

    /// Where artifacts are written
    #[arg(short, long, env = "RESULTS_DIR", default_value = "results")]
    results_dir: PathBuf,

    /// Print the artifact instead of saving it
    #[arg(long)]
    stdout: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,page_extractor=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = ExtractorConfig::from_env().context("Failed to load configuration")?;
    let mode = args.mode.unwrap_or(config.default_mode);
    let extractor = Extractor::new(config);

    if args.stdout {
        let Some(url) = normalize_url(&args.url) else {
            bail!("URL is required");
        };
        let extraction = extractor
            .extract(&url, mode)
            .await
            .with_context(|| format!("Extraction of {url} failed"))?;
        println!("{}", extraction.artifact);
        return Ok(());
    }

    let store = ArtifactStore::open(&args.results_dir)
        .await
        .with_context(|| format!("Cannot use results directory {}", args.results_dir.display()))?;
    let request = ExtractionRequest {
        url: args.url,
        filename: args.filename,
        mode: Some(mode),
    };

    let result = extractor.process(&request, &store).await;
    if !result.success {
        bail!(
            "{}: {}",
            result.message,
            result.error.unwrap_or_else(|| "unknown error".to_string())
        );
    }

    let name = result.artifact_name.unwrap_or_default();
    println!(
        "{} ({} bytes)",
        store.root().join(name).display(),
        result.size_bytes.unwrap_or_default()
    );
    Ok(())
}
