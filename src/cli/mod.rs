pub mod daemon_path;
pub mod process;
pub mod summary;

use std::{env, path::PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use daemon_path::to_daemon_path;
use process::{kill_previous_daemons, restart_daemon};
use summary::{SummaryCommand, process_summary_command};
use tracing::level_filters::LevelFilter;

use crate::{
    daemon::start_daemon,
    utils::{
        dir::create_application_default_path,
        logging::{CLI_PREFIX, enable_logging},
    },
};

#[derive(Parser, Debug)]
#[command(name = "Guildwatch", version, long_about = None)]
#[command(about = "Discord bot for tracking guild member activity", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable logging")]
    log: bool,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Start the bot daemon")]
    Init {},
    #[command(about = "Show a summary of a user's recorded activity")]
    Summary {
        #[command(flatten)]
        command: SummaryCommand,
    },
    #[command(
        about = "Run the bot directly in current console. Used for creating a daemon internally and for debugging"
    )]
    Serve {
        #[arg(
            long,
            help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
        )]
        dir: Option<PathBuf>,
    },
    #[command(about = "Stop currently running daemon.")]
    Stop {},
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(
        CLI_PREFIX,
        &create_application_default_path()?,
        logging_level,
        args.log,
    )?;

    match args.commands {
        Commands::Init {} => {
            restart_daemon()?;
            Ok(())
        }
        Commands::Stop {} => {
            let cli_path = env::current_exe().expect("Can't operate without an executable");
            kill_previous_daemons(&to_daemon_path(cli_path));
            Ok(())
        }
        Commands::Serve { dir } => {
            let dir = dir.map_or_else(create_application_default_path, Ok)?;
            start_daemon(dir).await?;
            Ok(())
        }
        Commands::Summary { command } => process_summary_command(command).await,
    }
}
