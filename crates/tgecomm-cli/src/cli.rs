//! Command-line interface definitions and parsing

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "tgecomm",
    author,
    version,
    about = "TGecomm - interactive messaging client",
    long_about = None
)]
pub struct Cli {
    /// Path to .env file
    #[arg(long, default_value = ".env")]
    pub env: PathBuf,

    /// Configuration file path (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["tgecomm"]).unwrap();
        assert_eq!(cli.env, PathBuf::from(".env"));
        assert!(cli.config.is_none());
        assert!(!cli.debug);
    }

    #[test]
    fn test_all_flags() {
        let cli = Cli::try_parse_from([
            "tgecomm",
            "--env",
            "prod.env",
            "--config",
            "tgecomm.toml",
            "--debug",
        ])
        .unwrap();
        assert_eq!(cli.env, PathBuf::from("prod.env"));
        assert_eq!(cli.config, Some(PathBuf::from("tgecomm.toml")));
        assert!(cli.debug);
    }
}
