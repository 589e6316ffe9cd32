//! Command-line interface.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Foodgram - recipe sharing backend
#[derive(Parser)]
#[command(name = "foodgram")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API (default)
    #[command(alias = "web")]
    Serve,

    /// Load ingredients from a JSON file of {name, measurement_unit} objects
    LoadIngredients {
        /// Path to the JSON fixture
        path: PathBuf,
    },

    /// Create an administrator account
    CreateAdmin {
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "Admin")]
        first_name: String,
        #[arg(long, default_value = "Admin")]
        last_name: String,
    },

    /// Create default config file
    Init,
}

pub use commands::*;
