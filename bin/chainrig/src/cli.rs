use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Parser)]
#[command(name = "chainrig")]
#[command(
    author,
    version,
    about = "Deploy dependent contract suites in order and wire them together"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "CHAINRIG_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to Chainrig.toml, or to a directory containing it.
    #[arg(short, long, alias = "conf", env = "CHAINRIG_CONFIG", default_value = ".")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Deploy the suite against a named network.
    Deploy {
        /// Target network, as named under [networks] in the config.
        #[arg(short, long, env = "CHAINRIG_NETWORK")]
        network: String,

        /// Seed pre-existing addresses from the deployments journal, so a
        /// halted run continues instead of redeploying.
        #[arg(long, env = "CHAINRIG_RESUME")]
        resume: bool,

        /// Directory holding compiled contract bytecode artifacts.
        #[arg(long, env = "CHAINRIG_ARTIFACTS", default_value = "artifacts")]
        artifacts: PathBuf,
    },
    /// Print the deployment order without touching the network.
    Plan {
        /// Output format.
        #[arg(long, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
}
