use anyhow::Result;
use clap::Parser;
use issuectx::cli::{AppContext, Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Build a context once, pass everywhere
    let ctx = AppContext {
        quiet: cli.quiet,
        no_color: cli.no_color,
        dry_run: cli.dry_run,
    };

    match cli.command {
        Commands::Enrich(args) => issuectx::cli_ext::enrich_cmd::run(args, &ctx),
        Commands::Block(args) => issuectx::cli_ext::inspect_cmd::run_block(args, &ctx),
        Commands::Refs(args) => issuectx::cli_ext::inspect_cmd::run_refs(args, &ctx),
        Commands::Init(args) => issuectx::infra::config::init(args, &ctx),
        Commands::Completions(args) => issuectx::completion::run(args, &ctx),
    }
}

/// Logs go to stderr; `ICTX_LOG` takes precedence over `-v`.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("ICTX_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
