// Command routing and dispatch

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::{
    commands::*,
    error::CliResult,
};

/// cbt - text templates with inheritance
#[derive(Parser, Debug)]
#[command(name = "cbt")]
#[command(bin_name = "cbt")]
#[command(about = "Render text templates with inheritance, blocks and slots")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only report errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file (default: <config dir>/cbt/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory template names are resolved against
    #[arg(long, global = true, value_name = "DIR")]
    pub base_path: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Render a template file
    Render {
        /// Template name, relative to the base path
        #[arg(value_name = "FILE")]
        file: String,

        /// Template data as a JSON object
        #[arg(long, value_name = "JSON", conflicts_with = "data_file")]
        data: Option<String>,

        /// Read template data from a JSON file
        #[arg(long, value_name = "PATH")]
        data_file: Option<PathBuf>,

        /// Render only this block
        #[arg(long, value_name = "NAME")]
        block: Option<String>,

        /// Render only this sub-template, passing the data as its argument
        #[arg(long, value_name = "NAME")]
        sub: Option<String>,

        /// Bypass the compiled-template cache
        #[arg(long)]
        no_cache: bool,
    },

    /// Print the compiled program of a template file
    Compile {
        #[arg(value_name = "FILE")]
        file: String,

        /// Compile only this block
        #[arg(long, value_name = "NAME")]
        block: Option<String>,

        /// Print the resolved template text instead of the program
        #[arg(long)]
        resolved: bool,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigSubcommand>,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Print the effective configuration
    Show,
    /// Print the configuration file location
    Path,
}

pub struct CommandRouter;

impl CommandRouter {
    /// Parse CLI arguments and route to appropriate handler
    pub async fn route() -> CliResult<()> {
        let cli = Cli::parse();

        crate::logging::init_logging(cli.verbose, cli.quiet);

        Self::execute(&cli).await
    }

    /// Execute a command
    pub async fn execute(cli: &Cli) -> CliResult<()> {
        match &cli.command {
            Commands::Render {
                file,
                data,
                data_file,
                block,
                sub,
                no_cache,
            } => {
                let cmd = RenderCommand::new(file.clone())
                    .with_data(DataSource::from_args(data.clone(), data_file.clone()))
                    .with_block(block.clone())
                    .with_sub(sub.clone())
                    .with_no_cache(*no_cache)
                    .with_config(cli.config.clone())
                    .with_base_path(cli.base_path.clone());
                cmd.execute().await
            }
            Commands::Compile {
                file,
                block,
                resolved,
            } => {
                let cmd = CompileCommand::new(file.clone())
                    .with_block(block.clone())
                    .with_resolved(*resolved)
                    .with_config(cli.config.clone())
                    .with_base_path(cli.base_path.clone());
                cmd.execute().await
            }
            Commands::Config { action } => {
                let action = match action {
                    Some(ConfigSubcommand::Show) | None => ConfigAction::Show,
                    Some(ConfigSubcommand::Path) => ConfigAction::Path,
                };
                let cmd = ConfigCommand::new(action)
                    .with_config(cli.config.clone())
                    .with_base_path(cli.base_path.clone());
                cmd.execute().await
            }
        }
    }
}
