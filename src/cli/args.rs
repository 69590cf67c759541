//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// Templar component dev server CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path (default: search upward for templar.toml)
    #[arg(short = 'C', long, global = true, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Initialize a new project scaffold
    #[command(visible_alias = "i")]
    Init {
        /// Project directory (default: current directory)
        #[arg(value_hint = clap::ValueHint::DirPath)]
        name: Option<PathBuf>,
    },

    /// Start the dev server with live reload
    #[command(visible_alias = "s")]
    Serve {
        /// Bind interface (e.g., 127.0.0.1, 0.0.0.0)
        #[arg(long)]
        host: Option<String>,

        /// Port number to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List discovered components
    #[command(visible_alias = "l")]
    List,

    /// Render one component to stdout or a file
    #[command(visible_alias = "p")]
    Preview {
        /// Component name
        name: String,

        /// Write output to a file instead of stdout
        #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
        output: Option<PathBuf>,
    },

    /// Compile every component once
    #[command(visible_alias = "b")]
    Build,

    /// Watch and rebuild without the HTTP server
    #[command(visible_alias = "w")]
    Watch,
}

impl Cli {
    pub fn is_init(&self) -> bool {
        matches!(self.command, Commands::Init { .. })
    }
}
