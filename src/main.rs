mod dcr;
mod error;
mod fetch;
mod menu;
mod output;
mod parser;
mod selection;
mod settings;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use fetch::HttpFetcher;
use menu::{App, LineEditor};
use settings::Settings;

#[derive(Parser)]
#[command(
    name = "dcr_builder",
    about = "Build Azure Monitor DCR deployment templates for Logs Ingestion API tables"
)]
struct Cli {
    /// Directory the templates are written to
    #[arg(short, long)]
    out_dir: Option<PathBuf>,

    /// Read the reference DCR template from a local JSON file instead of the docs page
    #[arg(long)]
    template_file: Option<PathBuf>,

    /// HTTP timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

impl Cli {
    fn apply(self, settings: &mut Settings) {
        if let Some(dir) = self.out_dir {
            settings.output_dir = dir;
        }
        if let Some(path) = self.template_file {
            settings.template_file = Some(path);
        }
        if let Some(secs) = self.timeout {
            settings.timeout_secs = secs;
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .try_init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut settings = Settings::load().context("Invalid DCR_* configuration")?;
    cli.apply(&mut settings);
    info!(settings = ?settings, "Starting DCR template builder");

    let fetcher = HttpFetcher::new(Duration::from_secs(settings.timeout_secs))?;
    let mut app = App::bootstrap(fetcher, settings)
        .context("Could not load supported tables or the DCR template")?;
    println!("Found {} supported tables", app.discovered().len());

    let mut prompt = LineEditor::new().context("Could not open the terminal")?;
    let exit = app.run(&mut prompt, &mut std::io::stdout())?;

    std::process::exit(exit.code());
}
