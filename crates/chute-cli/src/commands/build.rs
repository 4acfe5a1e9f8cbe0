//! Build command implementation.

use std::time::Duration;

use chute_bundler::{Bundler, CompiledPipeline};
use chute_config::{Mode, Overrides};
use tracing::debug;

use crate::cli::BuildArgs;
use crate::commands::utils;
use crate::error::Result;
use crate::ui;
use crate::watcher::{self, FileWatcher, WatchFilter};

/// Execute the build command.
///
/// 1. Load the descriptor (preset, config file, environment, flags)
/// 2. Compile it: unknown stages or plugins and bad options fail here
/// 3. Run the build and print the summary
/// 4. With `--watch` (or `watch = true`), rebuild on every batch of changes
///    until interrupted
pub async fn execute(args: BuildArgs) -> Result<()> {
    let overrides = Overrides {
        mode: args.mode.map(Into::into),
        watch: args.watch.then_some(true),
        minimize: args.no_minify.then_some(false),
        ..Default::default()
    };
    let descriptor = utils::load_descriptor(&args.project, overrides)?;

    if descriptor.mode == Mode::Production && !descriptor.optimization.minimize {
        ui::warning("Production build with minification disabled");
    }

    let watch = descriptor.watch;
    let aggregate = Duration::from_millis(descriptor.watch_options.aggregate_timeout);
    let ignored = descriptor.watch_options.ignored.clone();

    let pipeline = Bundler::new(descriptor).compile()?;
    ui::info(&format!("Building {}", pipeline.env().context.display()));

    if !watch {
        return build_once(&pipeline).await;
    }

    // In watch mode a failed build is reported and the loop keeps going.
    if let Err(e) = build_once(&pipeline).await {
        ui::error(&e.to_string());
    }
    watch_loop(&pipeline, aggregate, ignored).await
}

async fn build_once(pipeline: &CompiledPipeline) -> Result<()> {
    let report = pipeline.run().await?;
    ui::print_build_summary(&report);
    ui::success(&format!(
        "Built {} assets in {}",
        report.assets.len(),
        ui::format_duration(report.duration)
    ));
    Ok(())
}

async fn watch_loop(
    pipeline: &CompiledPipeline,
    aggregate: Duration,
    ignored: Vec<String>,
) -> Result<()> {
    let env = pipeline.env();
    let filter = WatchFilter::new(env.context.clone(), env.output_dir.clone(), ignored);
    let (watcher, mut changes) = FileWatcher::new(filter)?;
    ui::info(&format!(
        "Watching {} (Ctrl+C to stop)",
        watcher.root().display()
    ));

    loop {
        tokio::select! {
            batch = watcher::next_batch(&mut changes, aggregate) => {
                let Some(batch) = batch else {
                    return Ok(());
                };
                debug!(changed = batch.len(), first = %batch[0].display(), "rebuilding");
                ui::info(&format!("{} file(s) changed, rebuilding", batch.len()));
                if let Err(e) = build_once(pipeline).await {
                    ui::error(&e.to_string());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                ui::info("Stopped watching");
                return Ok(());
            }
        }
    }
}
