//! CLI argument parsing with clap

use crate::config::Config;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Media Archiver - timezone-normalized photo and video archiving
///
/// Renames media files to `{timestamp}_{device}_{name}` and files them
/// under `archive/YYYYMM/{p,v}/`, quarantining true duplicates.
#[derive(Parser, Debug)]
#[command(name = "media-archiver")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file (TOML format)
    ///
    /// When specified, settings from the config file are used as defaults.
    /// CLI arguments will override config file settings.
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Archive root directory
    #[arg(short, long, global = true, env = "MEDIA_ARCHIVE_ROOT")]
    pub root: Option<PathBuf>,

    /// Canonical timezone (IANA name, e.g. Asia/Shanghai)
    #[arg(long, global = true)]
    pub timezone: Option<String>,

    /// Number of threads for fingerprinting (0 = auto)
    #[arg(short = 't', long, global = true)]
    pub threads: Option<usize>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output log format as JSON
    #[arg(long, global = true)]
    pub json_log: bool,

    /// Print reports as JSON on stdout
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show per-month photo and video counts of the archive
    Stats,

    /// Show where files would go, without moving anything
    Preview {
        /// Directory to scan (default: the staging folder)
        work_dir: Option<PathBuf>,
    },

    /// Move files into the archive
    Fit {
        /// Directory to scan (default: the staging folder)
        work_dir: Option<PathBuf>,

        /// Leave true duplicates in place instead of moving them to duplicates/
        #[arg(long)]
        keep_duplicates: bool,
    },

    /// Move files from duplicates/ back to free archive slots
    Recover,

    /// Show (or apply with --commit) the canonical name of one file
    Rename {
        file: PathBuf,

        /// Rename the file in place
        #[arg(long)]
        commit: bool,
    },

    /// Print a sample configuration file
    SampleConfig,
}

impl Command {
    /// Short operation name, used for log file naming
    pub fn name(&self) -> &'static str {
        match self {
            Command::Stats => "stats",
            Command::Preview { .. } => "preview",
            Command::Fit { .. } => "fit",
            Command::Recover => "recover",
            Command::Rename { .. } => "rename",
            Command::SampleConfig => "sample-config",
        }
    }
}

impl Cli {
    /// Get config file name (without extension) for log naming
    pub fn config_name(&self) -> Option<String> {
        self.config.as_ref().and_then(|p| {
            p.file_stem()
                .and_then(|s| s.to_str())
                .map(|s| s.to_string())
        })
    }

    /// Merge CLI arguments with config from file
    /// CLI arguments take precedence over config file settings
    pub fn merge_with_config(&self, mut config: Config) -> Config {
        if let Some(ref root) = self.root {
            config.root = root.clone();
        }
        if let Some(ref timezone) = self.timezone {
            config.timezone = timezone.clone();
        }
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        if let Command::Fit {
            keep_duplicates: true,
            ..
        } = self.command
        {
            config.handle_duplicate = false;
        }

        config
    }

    /// Convert CLI arguments to Config (when no config file is used)
    pub fn to_config(&self) -> Config {
        self.merge_with_config(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fit() {
        let cli = Cli::parse_from([
            "media-archiver",
            "--root",
            "/data/media",
            "fit",
            "/data/inbox",
            "--keep-duplicates",
        ]);
        let config = cli.to_config();
        assert_eq!(config.root, PathBuf::from("/data/media"));
        assert!(!config.handle_duplicate);
        assert_eq!(cli.command.name(), "fit");
        assert!(matches!(cli.command, Command::Fit { work_dir: Some(_), .. }));
    }

    #[test]
    fn test_cli_overrides_file() {
        let cli = Cli::parse_from(["media-archiver", "stats", "--timezone", "UTC", "-t", "4"]);
        let mut file = Config::with_root("/from/file");
        file.timezone = "Asia/Tokyo".into();

        let config = cli.merge_with_config(file);
        assert_eq!(config.timezone, "UTC");
        assert_eq!(config.threads, 4);
        assert!(config.handle_duplicate);
    }

    #[test]
    fn test_rename_flags() {
        let cli = Cli::parse_from(["media-archiver", "rename", "a.jpg", "--commit"]);
        match cli.command {
            Command::Rename { file, commit } => {
                assert_eq!(file, PathBuf::from("a.jpg"));
                assert!(commit);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
