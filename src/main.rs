mod app;
mod batch;
mod catalog;
mod config;
mod draw;
mod error;
mod geometry;
mod render;
mod report;
mod session;
mod store;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use batch::{BatchConfig, BatchDriver, BatchMode};
use catalog::ImageSet;
use config::{Config, DEFAULT_CONFIG_FILE};
use report::LogReporter;
use store::BoxStore;

/// Draw bounding boxes over a directory of images, one record per image.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Directory of images to annotate
    #[arg(long)]
    raw_dir: Option<PathBuf>,

    /// Where annotation records are written
    #[arg(long)]
    record_dir: Option<PathBuf>,

    /// Where rendered previews are written
    #[arg(long)]
    preview_dir: Option<PathBuf>,

    /// Reopen already annotated images for editing
    #[arg(long, conflicts_with = "skip")]
    edit: bool,

    /// Leave already annotated images alone
    #[arg(long)]
    skip: bool,
}

impl Cli {
    fn apply(self, mut cfg: Config) -> Config {
        if let Some(dir) = self.raw_dir {
            cfg.dataset.raw_img_dir = Some(dir);
        }
        if let Some(dir) = self.record_dir {
            cfg.output.record_dir = dir;
        }
        if let Some(dir) = self.preview_dir {
            cfg.output.preview_dir = dir;
        }
        if self.edit {
            cfg.batch.mode = BatchMode::Edit;
        } else if self.skip {
            cfg.batch.mode = BatchMode::Skip;
        }
        cfg
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(e) = run() {
        log::error!("{e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let cfg = cli.apply(cfg);

    let raw_dir = match cfg.dataset.raw_img_dir.clone() {
        Some(dir) => dir,
        None => match rfd::FileDialog::new()
            .set_title("Choose a directory of images to annotate")
            .pick_folder()
        {
            Some(dir) => dir,
            None => bail!("no image directory given"),
        },
    };
    if !raw_dir.is_dir() {
        bail!("image directory not found: {}", raw_dir.display());
    }

    let store = BoxStore::open(&cfg.output.record_dir, &cfg.output.preview_dir)
        .context("preparing output directories")?;
    let images = ImageSet::scan(&raw_dir, &store).context("listing images")?;
    log::info!(
        "{} images, {} already annotated, mode {:?}",
        images.raw.len(),
        images.annotated.len(),
        cfg.batch.mode
    );
    if images.raw.is_empty() {
        return Ok(());
    }

    let keys = app::Keymap::resolve(&cfg.keys)?;
    let batch_config = BatchConfig {
        raw_dir,
        mode: cfg.batch.mode,
    };
    let outcome = app::run_window(keys, move |events, surface| {
        let reporter = LogReporter;
        let driver = BatchDriver::new(batch_config, &store, &reporter);
        driver.run(&images, events, surface)
    })?;

    match outcome {
        Some(result) => {
            let summary = result.context("annotation batch failed")?;
            log::info!(
                "done: {} opened, {} saved, {} skipped{}",
                summary.opened,
                summary.saved,
                summary.skipped,
                if summary.aborted { ", stopped by operator" } else { "" }
            );
        }
        None => log::warn!("window closed before the batch finished"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_config() {
        let cli = Cli::parse_from(["bbox-annotate", "--raw-dir", "imgs", "--edit"]);
        let cfg = cli.apply(Config::default());
        assert_eq!(cfg.dataset.raw_img_dir, Some(PathBuf::from("imgs")));
        assert_eq!(cfg.batch.mode, BatchMode::Edit);
        assert_eq!(cfg.output.record_dir, PathBuf::from("annotations"));
    }

    #[test]
    fn edit_and_skip_conflict() {
        assert!(Cli::try_parse_from(["bbox-annotate", "--edit", "--skip"]).is_err());
    }
}
