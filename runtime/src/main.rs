// Copyright 2026 PriceLens Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use pricelens_runtime::cli::{self, extract_cmd::HintArgs, output};

#[derive(Parser)]
#[command(
    name = "pricelens",
    about = "PriceLens — competitor price extraction and catalog matching",
    version,
    after_help = "Run 'pricelens <command> --help' for details on each command."
)]
struct Cli {
    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the REST API
    Serve {
        /// Port to listen on (default: $PORT or 8000)
        #[arg(long)]
        http_port: Option<u16>,
    },
    /// Extract price, title, description and stock from a product page
    Extract {
        /// Product page URL
        url: String,
        /// Price hint as JSON, e.g. '{"tag":"span","attributes":{"class":["price"]}}'
        #[arg(long)]
        price_hint: Option<String>,
        /// Description hint as JSON
        #[arg(long)]
        descr_hint: Option<String>,
        /// Stock hint as JSON
        #[arg(long)]
        stock_hint: Option<String>,
        /// Append the result to the price history
        #[arg(long, requires = "competitor")]
        record: bool,
        /// Competitor id used with --record
        #[arg(long)]
        competitor: Option<i64>,
    },
    /// List every price, description and stock candidate with reusable hints
    Patterns {
        /// Product page URL
        url: String,
    },
    /// Match a target group's catalog against its competitors' price history
    Match {
        /// Target group id
        target_id: i64,
    },
    /// Create the database schema
    InitDb,
    /// Check environment and diagnose issues
    Doctor,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global flags via environment variables so all modules can check them
    if cli.json {
        std::env::set_var(output::JSON_VAR, "1");
    }
    if cli.quiet {
        std::env::set_var(output::QUIET_VAR, "1");
    }
    if cli.verbose {
        std::env::set_var(output::VERBOSE_VAR, "1");
    }
    if cli.no_color {
        std::env::set_var(output::NO_COLOR_VAR, "1");
    }
    cli::init_tracing();

    let result = match cli.command {
        Commands::Serve { http_port } => cli::serve::run(http_port).await,
        Commands::Extract {
            url,
            price_hint,
            descr_hint,
            stock_hint,
            record,
            competitor,
        } => {
            let hints = HintArgs {
                price: price_hint.as_deref(),
                description: descr_hint.as_deref(),
                stock: stock_hint.as_deref(),
            };
            let record_for = if record { competitor } else { None };
            cli::extract_cmd::run(&url, hints, record_for).await
        }
        Commands::Patterns { url } => cli::extract_cmd::run_patterns(&url).await,
        Commands::Match { target_id } => cli::match_cmd::run(target_id).await,
        Commands::InitDb => cli::init_db::run().await,
        Commands::Doctor => cli::doctor::run().await,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "pricelens", &mut std::io::stdout());
            Ok(())
        }
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        if output::is_json() {
            output::print_json(&serde_json::json!({
                "error": true,
                "message": format!("{e:#}"),
            }));
        } else if !output::is_quiet() {
            eprintln!("  Error: {e:#}");
        }
        std::process::exit(1);
    }

    result
}
