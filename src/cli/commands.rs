use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// `microprobe` - runs network measurement programs.
#[derive(Parser, Debug)]
#[command(name = "microprobe")]
#[command(version)]
#[command(about = "Compile and run network measurement programs.", long_about = None)]
pub struct Cli {
    /// Probe configuration file (default: ~/.microprobe/config.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level regardless of the configured level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile and evaluate a program, then print a JSON report
    Run {
        /// JSON program to run
        #[arg(short, long)]
        program: PathBuf,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compile a program without running it
    Check {
        /// JSON program to check
        #[arg(short, long)]
        program: PathBuf,
    },

    /// List the operations this probe can compile
    Templates,

    /// Print a sample program measuring a domain over TCP, TLS and QUIC
    Example {
        /// Domain to measure
        #[arg(short, long, default_value = "www.example.com")]
        domain: String,
    },
}
