//! sheet-orient CLI - set the print orientation of worksheets across a directory of workbooks

use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::Parser;
use sheet_orient_core::{run, RunOptions};
use sheet_orient_excel_com::{ExcelBridgeConfig, ExcelLauncher};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sheet-orient")]
#[command(
    author,
    version,
    about = "Set the page print orientation of worksheets in every .xlsx under a directory"
)]
struct Cli {
    /// Directory to scan recursively for .xlsx workbooks
    #[arg(short, long)]
    directory: PathBuf,

    /// Only change worksheets whose name contains this text (case-sensitive).
    /// Empty means every worksheet.
    #[arg(short, long, default_value = "")]
    pattern: String,

    /// Orientation to apply: portrait or landscape
    #[arg(short, long, default_value = "portrait")]
    orientation: String,

    /// Path to orient-com-bridge.exe (default: next to this binary)
    #[arg(long, value_name = "PATH")]
    bridge_exe: Option<PathBuf>,

    /// Program used to run the bridge (default: wine, except on Windows)
    #[arg(long, value_name = "PROGRAM", conflicts_with = "no_wine")]
    wine: Option<PathBuf>,

    /// Run the bridge executable directly
    #[arg(long)]
    no_wine: bool,

    /// WINEPREFIX for the bridge process
    #[arg(long, value_name = "DIR")]
    wine_prefix: Option<PathBuf>,

    /// Seconds to wait for each Excel response (0 = wait forever)
    #[arg(long, value_name = "SECONDS", default_value_t = 300)]
    timeout: u64,

    /// Keep the Excel window hidden
    #[arg(long)]
    hidden: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn bridge_config(&self) -> ExcelBridgeConfig {
        let defaults = ExcelBridgeConfig::default();
        let launcher = if self.no_wine {
            None
        } else {
            self.wine.clone().or(defaults.launcher)
        };

        ExcelBridgeConfig {
            bridge_exe_path: self.bridge_exe.clone(),
            launcher,
            wine_prefix: self.wine_prefix.clone(),
            timeout: (self.timeout > 0).then(|| Duration::from_secs(self.timeout)),
            visible: !self.hidden,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    // Failures are reported, not turned into an exit status
    let options = match RunOptions::from_args(&cli.directory, &cli.pattern, &cli.orientation) {
        Ok(options) => options,
        Err(e) => {
            tracing::error!("{e}");
            return Ok(());
        }
    };

    let launcher = ExcelLauncher::new(cli.bridge_config());
    match run(&launcher, &options) {
        Ok(summary) => {
            for skipped in &summary.skipped {
                tracing::warn!("Not processed: {} ({})", skipped.path.display(), skipped.error);
            }
        }
        Err(e) => tracing::error!("{e}"),
    }

    Ok(())
}

/// Default directives: the binary's own target is `sheet_orient`, after the
/// `sheet-orient` bin name, not the package name.
fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "sheet_orient=debug,sheet_orient_core=debug,sheet_orient_excel_com=debug"
    } else {
        "sheet_orient=info,sheet_orient_core=info,sheet_orient_excel_com=info"
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose))),
        )
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("failed to initialize logging: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["sheet-orient", "-d", "reports"]).unwrap();
        assert_eq!(cli.pattern, "");
        assert_eq!(cli.orientation, "portrait");

        let config = cli.bridge_config();
        assert!(config.visible);
        assert_eq!(config.timeout, Some(Duration::from_secs(300)));
        assert_eq!(config.launcher, ExcelBridgeConfig::default().launcher);
    }

    #[test]
    fn test_bridge_overrides() {
        let cli = Cli::try_parse_from([
            "sheet-orient",
            "--directory",
            "reports",
            "--pattern",
            "Detail",
            "--orientation",
            "landscape",
            "--no-wine",
            "--bridge-exe",
            "C:\\tools\\orient-com-bridge.exe",
            "--timeout",
            "0",
            "--hidden",
        ])
        .unwrap();

        let config = cli.bridge_config();
        assert_eq!(config.launcher, None);
        assert_eq!(config.timeout, None);
        assert!(!config.visible);
        assert_eq!(
            config.bridge_exe_path,
            Some(PathBuf::from("C:\\tools\\orient-com-bridge.exe"))
        );
    }

    #[test]
    fn test_custom_wine() {
        let cli = Cli::try_parse_from([
            "sheet-orient",
            "-d",
            "reports",
            "--wine",
            "/opt/wine/bin/wine64",
            "--wine-prefix",
            "/home/me/.wine-excel",
        ])
        .unwrap();

        let config = cli.bridge_config();
        assert_eq!(config.launcher, Some(PathBuf::from("/opt/wine/bin/wine64")));
        assert_eq!(config.wine_prefix, Some(PathBuf::from("/home/me/.wine-excel")));
    }

    #[test]
    fn test_wine_conflicts_with_no_wine() {
        assert!(Cli::try_parse_from(["sheet-orient", "-d", "x", "--wine", "w", "--no-wine"]).is_err());
    }

    #[test]
    fn test_default_filter_covers_this_binary() {
        // Events logged from main() carry this crate's name as their target
        let target = env!("CARGO_CRATE_NAME");
        for verbose in [false, true] {
            let filter = default_filter(verbose);
            assert!(
                filter.split(',').any(|d| d.split('=').next() == Some(target)),
                "{filter} does not name {target}"
            );
        }
    }

    #[test]
    fn test_directory_required() {
        assert!(Cli::try_parse_from(["sheet-orient"]).is_err());
    }
}
