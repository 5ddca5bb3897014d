//! Command-line interface definitions.
//!
//! This module defines the CLI arguments using the `clap` crate. The API
//! credential is read from the environment; everything else about a run
//! comes from the built-in defaults or an optional YAML config file.

use clap::Parser;

/// Command-line arguments for the weekly web report job.
///
/// # Examples
///
/// ```sh
/// # Run the built-in weekly job
/// OPENAI_API_KEY=sk-... weekly_web_report
///
/// # Custom URL list and output path
/// OPENAI_API_KEY=sk-... weekly_web_report -c urls.yaml -o /tmp/report.md
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file overriding the built-in defaults
    #[arg(short, long)]
    pub config: Option<String>,

    /// Output path for the Markdown report (overrides the config file)
    #[arg(short, long)]
    pub output: Option<String>,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,
}
