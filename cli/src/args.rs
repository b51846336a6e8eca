use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "gql-migrate")]
#[command(about = "Migrate embedded GraphQL operations across schema deprecations")]
#[command(version)]
pub struct Args {
    // Root directory to scan for host files
    #[arg(default_value = ".")]
    pub path: PathBuf,

    // Which files contain GraphQL template literals
    #[arg(long, default_value = "**/*.{ts,tsx}")]
    pub pattern: String,

    // Skip build artifacts and dependencies
    #[arg(long, default_value = "**/node_modules/**")]
    pub ignore: String,

    // Target schema in SDL form
    #[arg(long)]
    pub schema: Option<PathBuf>,

    // Extraction strategy: pluck, ast, or hybrid
    #[arg(long, default_value = "hybrid")]
    pub strategy: String,

    // JSON file mapping dotted keys to canonical operation names
    #[arg(long)]
    pub name_dict: Option<PathBuf>,

    // Worker pool size
    #[arg(long, default_value_t = 4)]
    pub concurrency: usize,

    // Keep byte ranges and interpolation sites in the serialized catalog
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub preserve_source_positions: bool,

    // Enable progress output for troubleshooting
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    // Extract operations and print the catalog
    Extract {
        #[arg(long)]
        json: bool,
    },
    // Summarize the schema's deprecations
    Analyze {
        #[arg(long)]
        json: bool,
    },
    // Run the full migration pipeline
    Migrate {
        // Report what would change without writing files
        #[arg(long)]
        dry_run: bool,
        // Reject transformations scoring below this
        #[arg(long, default_value_t = 0)]
        min_confidence: u8,
        #[arg(long, default_value_t = 90)]
        automatic_threshold: u8,
        #[arg(long, default_value_t = 70)]
        semi_automatic_threshold: u8,
        // Stitch fragment references before transforming
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        resolve_fragments: bool,
        // Re-validate transformed operations against the schema
        #[arg(long)]
        validate: bool,
        #[arg(long)]
        json: bool,
    },
}
