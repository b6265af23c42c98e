use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP recommendation service.
    Serve {
        /// Address to listen on (overrides listen_addr from config.yaml)
        #[clap(long)]
        addr: Option<String>,
    },
    /// Rebuild the location index from a catalog file.
    ///
    /// The existing collection is deleted and recreated.
    /// Stop any running server first.
    Build {
        /// Catalog JSON file (defaults to catalog_path from config.yaml)
        catalog: Option<PathBuf>,

        /// Don't ask before replacing an existing collection
        #[clap(short, long, default_value = "false")]
        yes: bool,
    },
    /// Recommend locations for a free-text query
    Recommend {
        query: String,

        /// Number of nearest locations to consider (1-20)
        #[clap(short, long, default_value = "5")]
        n: u32,

        /// Drop results scoring below this similarity (0.0-1.0)
        #[clap(short, long, default_value = "0.0")]
        min_score: f32,
    },
    /// Find locations for a tag or audience
    Tag {
        tag: String,

        /// Number of semantic candidates to check (1-50)
        #[clap(short, long, default_value = "10")]
        n: u32,
    },
    /// Print every indexed location
    List {},
    /// Show persisted collections and whether they match the configured model
    Collections {},
}
