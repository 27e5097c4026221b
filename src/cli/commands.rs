use clap::{Parser, Subcommand};

/// `storygap` - cloze exercise generation with validated oracle output.
#[derive(Parser, Debug)]
#[command(name = "storygap")]
#[command(version)]
#[command(about = "Generate and validate story gap (cloze) exercises.", long_about = None)]
pub struct Cli {
    /// Log at debug level regardless of config
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP gateway (POST /api/story-gap)
    Serve {
        /// Port to listen on (use 0 for random available port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
    },

    /// Generate one exercise and print it as JSON
    Generate {
        /// Difficulty tier (green, yellow, red); unknown values fall back to green
        #[arg(short, long, default_value = "green")]
        difficulty: String,

        /// Target words or quoted phrases, in order (at most 8 are used)
        #[arg(required = true)]
        words: Vec<String>,
    },

    /// Print the effective configuration with the API key redacted
    Config,
}
