//! Media Archiver - timezone-normalized photo and video archiving
//!
//! Command line front end: loads configuration, installs logging and the
//! Ctrl-C handler, then runs one archive operation.

use anyhow::Result;
use clap::Parser;
use media_archiver::cli::Command;
use media_archiver::stats::{MonthChange, StatsDelta};
use media_archiver::{Archiver, BatchReport, Cli, Config, Outcome, StatsSnapshot, compare};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use tracing::{Level, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

// CLI Output Module
mod cli_output {
    //! Colored terminal output for reports

    use crossterm::{
        ExecutableCommand,
        style::{Color, Print, Stylize, style},
    };
    use std::io::stdout;

    /// CLI theme colors
    pub struct CliTheme;

    impl CliTheme {
        pub const SUCCESS: Color = Color::Green;
        pub const WARNING: Color = Color::Yellow;
        pub const ERROR: Color = Color::Red;
        pub const HINT: Color = Color::DarkGrey;
        pub const ACCENT: Color = Color::Cyan;
    }

    /// Print a separator line
    pub fn print_separator() {
        let _ = stdout().execute(Print(&format!("{}\n", "─".repeat(60))));
    }

    /// Print a centered title
    pub fn print_title(title: &str) {
        let width: usize = 60;
        let padding = width.saturating_sub(title.chars().count()) / 2;
        let left_pad = " ".repeat(padding.saturating_sub(1));

        let _ = stdout().execute(Print(&format!(
            "{}{} {}{}\n",
            left_pad,
            "╔".bold().stylize(),
            title.bold().stylize(),
            "╗".bold().stylize(),
        )));
        let _ = stdout().execute(Print("\n"));
    }

    /// Print a warning message
    pub fn print_warning(msg: &str) {
        let _ = stdout().execute(Print(style("⚠ ").with(CliTheme::WARNING).bold()));
        let _ = stdout().execute(Print(format!("{}\n", msg)));
    }

    /// Print an error message
    pub fn print_error(msg: &str) {
        let _ = stdout().execute(Print(style("✗ ").with(CliTheme::ERROR).bold()));
        let _ = stdout().execute(Print(format!("{}\n", msg)));
    }

    /// Print a hint message
    pub fn print_hint(msg: &str) {
        let _ = stdout().execute(Print(style("→ ").with(CliTheme::HINT)));
        let _ = stdout().execute(Print(format!("{}\n", msg)));
    }

    /// Print one statistic
    pub fn print_stat(key: &str, value: &str, color: Color) {
        let key_styled = style(key).with(CliTheme::HINT);
        let value_styled = style(value).with(color).bold();
        let _ = stdout().execute(Print("  "));
        let _ = stdout().execute(Print(key_styled));
        let _ = stdout().execute(Print(": "));
        let _ = stdout().execute(Print(value_styled));
        let _ = stdout().execute(Print("\n"));
    }

    /// Print one row of a fixed-width table
    pub fn print_row(cells: &[String], color: Option<Color>) {
        let line = cells
            .iter()
            .enumerate()
            .map(|(i, c)| if i == 0 { format!("{:<10}", c) } else { format!("{:>10}", c) })
            .collect::<String>();
        let text = format!("  {}\n", line);
        if let Some(color) = color {
            let _ = stdout().execute(Print(style(text).with(color)));
        } else {
            let _ = stdout().execute(Print(text));
        }
    }

    /// Print a processing result line
    pub fn print_result(status_icon: &str, status_color: Color, source: &str, dest_or_msg: &str) {
        let icon_styled = style(status_icon).with(status_color).bold();
        let source_styled = style(source).italic();
        let msg_styled = style(dest_or_msg).with(CliTheme::HINT);

        let _ = stdout().execute(Print("  "));
        let _ = stdout().execute(Print(icon_styled));
        let _ = stdout().execute(Print(" "));
        let _ = stdout().execute(Print(source_styled));
        let _ = stdout().execute(Print(" "));
        let _ = stdout().execute(Print(msg_styled));
        let _ = stdout().execute(Print("\n"));
    }

    /// Print the log directory path
    pub fn print_log_path(path: &str) {
        let _ = stdout().execute(Print("\n"));
        let _ = stdout().execute(Print(style("  📁 ").with(CliTheme::ACCENT)));
        let _ = stdout().execute(Print(style("Log directory: ").with(CliTheme::HINT)));
        let _ = stdout().execute(Print(format!("{}\n", path)));
    }

    /// Print an empty line
    pub fn print_blank() {
        let _ = stdout().execute(Print("\n"));
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Command::SampleConfig = cli.command {
        print!("{}", Config::sample_config());
        return Ok(());
    }

    let config = load_config(&cli)?;
    let log_dir = resolve_log_dir(&config);
    let _guard = setup_logging(&cli, &config, &log_dir)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        command = cli.command.name(),
        root = %config.root.display(),
        "Media Archiver starting"
    );
    if cli.verbose {
        info!(?config, "Configuration loaded");
    }

    let handle_duplicate = config.handle_duplicate;
    let archiver = Archiver::new(config)?;

    let interrupted = archiver.interrupt_handle();
    ctrlc::set_handler(move || {
        if !interrupted.swap(true, Ordering::SeqCst) {
            warn!("Interrupt received, finishing current file");
        }
    })?;

    let result = match &cli.command {
        Command::Stats => run_stats(&cli, &archiver),
        Command::Preview { work_dir } => run_preview(&cli, &archiver, work_dir.as_deref()),
        Command::Fit { work_dir, .. } => run_fit(&cli, &archiver, work_dir.as_deref(), handle_duplicate),
        Command::Recover => run_recover(&cli, &archiver),
        Command::Rename { file, commit } => run_rename(&cli, &archiver, file, *commit),
        Command::SampleConfig => Ok(()),
    };

    if let Err(ref e) = result {
        error!(error = %e, "Operation failed");
    } else if !cli.json {
        cli_output::print_log_path(&log_dir.display().to_string());
    }
    result
}

/// Load configuration from file or CLI arguments
fn load_config(cli: &Cli) -> Result<Config> {
    let config = if let Some(ref config_path) = cli.config {
        let with_extension = if config_path.exists() || config_path.extension().is_some() {
            config_path.clone()
        } else {
            config_path.with_extension("toml")
        };
        let file_config = Config::load_from_file(&with_extension)?;
        cli.merge_with_config(file_config)
    } else {
        cli.to_config()
    };

    if config.root.as_os_str().is_empty() {
        anyhow::bail!("No archive root given: use --root, MEDIA_ARCHIVE_ROOT or `root` in the config file");
    }
    config.canonical_tz()?;

    Ok(config)
}

/// Relative log directories live under the archive root
fn resolve_log_dir(config: &Config) -> PathBuf {
    if config.log_dir.is_absolute() {
        config.log_dir.clone()
    } else {
        config.root.join(&config.log_dir)
    }
}

/// Setup logging: rotated file + console
fn setup_logging(cli: &Cli, config: &Config, log_dir: &Path) -> Result<WorkerGuard> {
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    std::fs::create_dir_all(log_dir)?;
    let prefix = cli
        .config_name()
        .map(|name| format!("{}-{}", name, cli.command.name()))
        .unwrap_or_else(|| cli.command.name().to_string());

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .max_log_files(config.max_log_files.max(1))
        .build(log_dir)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(appender);

    let subscriber = tracing_subscriber::registry().with(env_filter);

    if cli.json_log {
        subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(non_blocking),
            )
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    Ok(guard)
}

fn run_stats(cli: &Cli, archiver: &Archiver) -> Result<()> {
    let stats = archiver.stats()?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    use cli_output::*;
    print_separator();
    print_title("Archive Statistics");
    print_separator();
    print_stats_table(&stats);
    Ok(())
}

fn print_stats_table(stats: &StatsSnapshot) {
    use cli_output::*;

    print_row(&["month".into(), "photos".into(), "videos".into(), "total".into()], Some(CliTheme::HINT));
    for (month, counts) in &stats.months {
        print_row(
            &[
                month.clone(),
                counts.photos.to_string(),
                counts.videos.to_string(),
                counts.total().to_string(),
            ],
            None,
        );
    }
    print_blank();
    print_stat("Photos", &stats.total_photos().to_string(), CliTheme::SUCCESS);
    print_stat("Videos", &stats.total_videos().to_string(), CliTheme::SUCCESS);
    print_stat("Duplicates", &stats.duplicates.to_string(), CliTheme::ACCENT);
    print_stat("Snapshot", &stats.snapshots.to_string(), CliTheme::WARNING);
}

fn run_preview(cli: &Cli, archiver: &Archiver, work_dir: Option<&Path>) -> Result<()> {
    let work_dir = work_dir.unwrap_or(archiver.layout().staging());
    let plan = archiver.preview(work_dir)?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    use cli_output::*;
    print_separator();
    print_title("Placement Preview");
    print_separator();
    for (source, candidate) in &plan {
        let icon = if source == candidate { "⊘" } else { "~" };
        print_result(
            icon,
            CliTheme::ACCENT,
            &source.display().to_string(),
            &format!("→ {}", candidate.display()),
        );
    }
    print_blank();
    print_hint(&format!("{} files, nothing was moved", plan.len()));
    Ok(())
}

fn run_fit(cli: &Cli, archiver: &Archiver, work_dir: Option<&Path>, handle_duplicate: bool) -> Result<()> {
    let before = archiver.stats()?;
    let batch = archiver.fit(work_dir, handle_duplicate)?;
    let after = archiver.stats()?;
    let delta = compare(&before, &after);

    if cli.json {
        let output = serde_json::json!({ "report": batch, "delta": delta });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    print_batch("Fit Complete", cli, &batch);
    print_delta(&delta);
    Ok(())
}

fn run_recover(cli: &Cli, archiver: &Archiver) -> Result<()> {
    let batch = archiver.recover()?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&batch)?);
        return Ok(());
    }

    print_batch("Recovery Complete", cli, &batch);
    Ok(())
}

fn run_rename(cli: &Cli, archiver: &Archiver, file: &Path, commit: bool) -> Result<()> {
    let candidate = archiver.rename(file, commit)?;
    if cli.json {
        let output = serde_json::json!({ "source": file, "candidate": candidate, "committed": commit });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    use cli_output::*;
    let icon = if commit { "✓" } else { "~" };
    print_result(
        icon,
        CliTheme::SUCCESS,
        &file.display().to_string(),
        &format!("→ {}", candidate.display()),
    );
    Ok(())
}

fn print_batch(title: &str, cli: &Cli, batch: &BatchReport) {
    use cli_output::*;

    print_separator();
    print_title(title);
    print_separator();
    print_blank();
    print_stat("Archived", &batch.count(Outcome::Archived).to_string(), CliTheme::SUCCESS);
    print_stat("Snapshot", &batch.count(Outcome::Snapshot).to_string(), CliTheme::SUCCESS);
    print_stat("Recovered", &batch.count(Outcome::Recovered).to_string(), CliTheme::SUCCESS);
    print_stat("Duplicates", &batch.count(Outcome::Duplicate).to_string(), CliTheme::ACCENT);
    print_stat("Skipped", &batch.count(Outcome::Skipped).to_string(), CliTheme::WARNING);
    print_stat("Failed", &batch.count(Outcome::Failed).to_string(), CliTheme::ERROR);
    print_blank();

    if cli.verbose {
        print_separator();
        print_hint("Detailed results");
        print_blank();
        for file in &batch.files {
            let (icon, color) = match file.outcome {
                Outcome::Archived | Outcome::Snapshot | Outcome::Recovered => ("✓", CliTheme::SUCCESS),
                Outcome::Duplicate => ("≡", CliTheme::ACCENT),
                Outcome::Skipped => ("⊘", CliTheme::WARNING),
                Outcome::Failed => ("✗", CliTheme::ERROR),
            };
            let message = match (&file.destination, &file.detail) {
                (_, Some(detail)) if file.outcome != Outcome::Duplicate => detail.clone(),
                (Some(dest), _) => format!("→ {}", dest.display()),
                _ => String::new(),
            };
            print_result(icon, color, &file.source.display().to_string(), &message);
        }
    }

    let failed: Vec<_> = batch.failures().collect();
    if !failed.is_empty() {
        print_separator();
        print_error(&format!("{} files failed and were left in place", failed.len()));
        print_blank();
        for file in failed {
            print_result(
                "✗",
                CliTheme::ERROR,
                &file.source.display().to_string(),
                file.detail.as_deref().unwrap_or_default(),
            );
        }
    }

    if batch.interrupted {
        print_separator();
        print_warning(&format!("Interrupted, {} files not processed", batch.pending));
    }
}

/// Changed months only, with ↑/↓ markers
fn print_delta(delta: &StatsDelta) {
    use cli_output::*;

    print_separator();
    if delta.is_empty() {
        print_hint("Archive unchanged");
        return;
    }

    print_row(&["month".into(), "photos".into(), "videos".into(), "total".into()], Some(CliTheme::HINT));
    for month in delta.changes() {
        let label = match month.change {
            MonthChange::Added => format!("{} +", month.month),
            MonthChange::Removed => format!("{} -", month.month),
            _ => month.month.clone(),
        };
        let color = if month.total() >= 0 {
            CliTheme::SUCCESS
        } else {
            CliTheme::ERROR
        };
        print_row(
            &[
                label,
                signed(month.photos),
                signed(month.videos),
                signed(month.total()),
            ],
            Some(color),
        );
    }
    print_blank();
    print_stat("Duplicates", &signed(delta.duplicates.delta()), CliTheme::ACCENT);
    print_stat("Snapshot", &signed(delta.snapshots.delta()), CliTheme::WARNING);
}

fn signed(value: i64) -> String {
    match value {
        v if v > 0 => format!("↑{}", v),
        v if v < 0 => format!("↓{}", -v),
        _ => "0".to_string(),
    }
}
