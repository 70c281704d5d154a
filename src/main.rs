use clap::{Parser, Subcommand};
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;
use tracing_subscriber::EnvFilter;

use web_triage::config::{Config, ENV_GENERATOR_ENDPOINT, ENV_GENERATOR_MODEL};
use web_triage::generator::{GeminiClient, TextGenerator, Unavailable};
use web_triage::script::generate_test_script;
use web_triage::{PageSnapshot, Pipeline, RunRequest, RunResponse};

/// Web Triage - run generated browser tests and explain the results in plain language
#[derive(Parser, Debug)]
#[command(
    name = "web-triage",
    about = "Sandboxed execution and plain-language triage of generated browser test scripts",
    after_help = "ENVIRONMENT VARIABLES:\n\
        WEB_TRIAGE_GENERATOR_ENDPOINT   Generative model API base URL\n\
        WEB_TRIAGE_GENERATOR_MODEL      Model name (falls back to GEMINI_MODEL)\n\
        WEB_TRIAGE_GENERATOR_API_KEY    API key (falls back to GEMINI_API_KEY)\n\
        WEB_TRIAGE_GENERATOR_TIMEOUT    Request timeout in seconds\n\
        WEB_TRIAGE_RUNNER_COMMAND       Test runner command (default: npx playwright test)\n\
        WEB_TRIAGE_RUNNER_WORKDIR       Working directory for the test runner\n\
        WEB_TRIAGE_RUNNER_TIMEOUT       Test run time limit in seconds\n\
        WEB_TRIAGE_TEMP_DIR             Directory for run-scoped temporary files\n\
        RUST_LOG                        Diagnostic log filter (default: info)"
)]
struct Args {
    /// Generative model API base URL
    #[arg(long, global = true, env = ENV_GENERATOR_ENDPOINT)]
    endpoint: Option<String>,

    /// Generative model name
    #[arg(long, global = true, env = ENV_GENERATOR_MODEL)]
    model: Option<String>,

    /// Test run time limit in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Execute a test script and report bugs and recommendations
    Run {
        /// Path to the test script
        #[arg(short, long)]
        script: PathBuf,

        /// URL the script targets
        #[arg(short, long, default_value = "")]
        url: String,

        /// Page snapshot JSON produced by the crawler
        #[arg(short, long)]
        page: Option<PathBuf>,

        /// Output the full response as JSON
        #[arg(long)]
        json: bool,
    },

    /// Author a test script for a page
    Generate {
        /// URL to write tests for
        #[arg(short, long)]
        url: String,

        /// Page snapshot JSON produced by the crawler
        #[arg(short, long)]
        page: PathBuf,

        /// Extra requirements for the tests
        #[arg(short, long)]
        requirements: Option<String>,

        /// Output the script with metadata as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that the generative model endpoint is reachable
    Check,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = Config::from_env();
    if let Some(endpoint) = args.endpoint {
        config.generator.endpoint = endpoint;
    }
    if let Some(model) = args.model {
        config.generator.model = model;
    }
    if let Some(timeout) = args.timeout {
        config.runner.timeout_secs = timeout;
    }

    match args.command {
        Some(Commands::Run {
            script,
            url,
            page,
            json,
        }) => {
            let script = fs::read_to_string(&script)
                .map_err(|e| format!("Failed to read script {}: {}", script.display(), e))?;
            let mut request = RunRequest::new(script, url);
            if let Some(path) = page {
                request = request.page_snapshot(load_snapshot(&path)?);
            }

            let generator = build_generator(&config);
            let pipeline = Pipeline::new(&config, generator.as_ref());
            let response = pipeline.run(&request)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print_summary(&response);
            }
        }

        Some(Commands::Generate {
            url,
            page,
            requirements,
            json,
        }) => {
            let snapshot = load_snapshot(&page)?;
            let client = GeminiClient::new(&config.generator)?;
            let generated = generate_test_script(&client, &url, &snapshot, requirements.as_deref())?;

            if json {
                println!("{}", serde_json::to_string_pretty(&generated)?);
            } else {
                println!("{}", generated.script);
            }
        }

        Some(Commands::Check) => {
            println!("Runner command: {}", config.runner.command.join(" "));
            println!("Runner timeout: {}s", config.runner.timeout_secs);
            println!("Temp directory: {}", config.runner.temp_dir.display());

            let client = GeminiClient::new(&config.generator)?;
            if client.check_health()? {
                println!(
                    "Generator endpoint responding: {} (model {})",
                    config.generator.endpoint, config.generator.model
                );
            } else {
                return Err(format!(
                    "Generator endpoint at {} rejected model '{}' or the API key",
                    config.generator.endpoint, config.generator.model
                )
                .into());
            }
        }

        None => {
            println!("Web Triage - run generated browser tests and explain the results");
            println!();
            println!("Usage: web-triage <COMMAND>");
            println!();
            println!("Commands:");
            println!("  run       Execute a test script and report bugs and recommendations");
            println!("  generate  Author a test script for a page");
            println!("  check     Check that the generative model endpoint is reachable");
            println!();
            println!("Run with --help for more information.");
        }
    }

    Ok(())
}

/// Real client when credentials exist, otherwise template-only narratives
fn build_generator(config: &Config) -> Box<dyn TextGenerator> {
    match GeminiClient::new(&config.generator) {
        Ok(client) => Box::new(client),
        Err(e) => {
            warn!(error = %e, "generator unavailable, bugs and recommendations will use templates");
            Box::new(Unavailable::new(e.to_string()))
        }
    }
}

fn load_snapshot(path: &Path) -> Result<PageSnapshot, Box<dyn Error>> {
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read page snapshot {}: {}", path.display(), e))?;
    Ok(serde_json::from_str(&raw)?)
}

fn print_summary(response: &RunResponse) {
    println!("Status: {} ({})", response.status, response.duration);

    if !response.logs.is_empty() {
        println!();
        println!("Logs:");
        for line in &response.logs {
            println!("  {}", line);
        }
    }

    println!();
    println!("Bugs ({}):", response.bugs.len());
    for bug in &response.bugs {
        println!("  [{}] {}", bug.severity, bug.title);
        println!("    {}", bug.description);
    }

    println!();
    println!("Recommendations ({}):", response.recommendations.len());
    for rec in &response.recommendations {
        println!("  {}", rec.title);
        println!("    {}", rec.description);
    }

    if !response.screenshots.is_empty() {
        println!();
        println!("Screenshots: {}", response.screenshots.len());
        for shot in &response.screenshots {
            println!("  {}", shot.filename);
        }
    }
}
