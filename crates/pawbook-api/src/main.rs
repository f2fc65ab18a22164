//! Pawbook command-line client.
//!
//! Binary name: `pawbook`
//!
//! Parses CLI arguments, initializes tracing, loads configuration and
//! connects the backend, then dispatches to the command handlers.

mod cli;
mod state;

use anyhow::anyhow;
use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands};
use pawbook_infra::config::load_config;
use pawbook_infra::filesystem::resolve_data_dir;
use pawbook_infra::http::HttpBackend;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,pawbook_core=debug,pawbook_infra=debug",
        _ => "trace",
    };
    pawbook_observe::tracing_setup::init_tracing(filter, cli.otel)
        .map_err(|e| anyhow!("failed to initialize tracing: {e}"))?;

    let result = run(cli).await;
    pawbook_observe::tracing_setup::shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Commands that never talk to the hosted backend
    match &cli.command {
        Commands::Completions { shell } => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            generate(*shell, &mut cmd, "pawbook", &mut std::io::stdout());
            return Ok(());
        }
        Commands::Config => {
            let data_dir = resolve_data_dir();
            let config = load_config(&data_dir).await;
            return cli::config::show_config(&config, &data_dir, cli.json);
        }
        Commands::Demo => {
            let config = load_config(&resolve_data_dir()).await;
            cli::demo::run_demo(config, cli.json).await?;
            return Ok(());
        }
        _ => {}
    }

    let state = AppState::<HttpBackend>::init().await?;

    match cli.command {
        Commands::Conversations { user } => {
            cli::conversation::list_conversations(&state, &user, cli.json).await?;
        }

        Commands::Open { user, with } => {
            cli::conversation::open_conversation(&state, &user, &with, cli.json).await?;
        }

        Commands::Send {
            user,
            name,
            with,
            text,
        } => {
            let text = text.join(" ");
            cli::message::send_message(&state, &user, name, &with, &text, cli.json).await?;
        }

        Commands::History { user, with } => {
            cli::message::show_history(&state, &user, &with, cli.json).await?;
        }

        Commands::Watch { user, with } => {
            cli::watch::watch(&state, &user, with.as_deref(), cli.json).await?;
        }

        Commands::Completions { .. } | Commands::Config | Commands::Demo => {
            unreachable!("handled above")
        }
    }

    Ok(())
}
