//! CLI command for container extraction

use std::path::Path;
use std::time::Instant;

use crate::acb::{AcbExtractor, AcbPhase, output_dir_for};
use crate::cli::progress::{LOOKING_GLASS, PACKAGE, print_done, print_step, simple_bar};
use crate::config::Settings;

pub fn execute(source: &Path, settings: Settings, quiet: bool) -> anyhow::Result<()> {
    let started = Instant::now();
    let destination = output_dir_for(source);
    let extractor = AcbExtractor::new(settings.extractor_config());

    if quiet {
        extractor.extract(source, destination.as_path(), &|_| {})?;
    } else {
        print_step(1, 2, LOOKING_GLASS, "Reading cue sheet...");
        print_step(2, 2, PACKAGE, "Extracting files...");

        // Total is unknown until resolution finishes; size the bar from the
        // first copy-phase report.
        let pb = simple_bar(0, "Extracting");
        extractor.extract(source, destination.as_path(), &|progress| {
            if progress.phase == AcbPhase::ExtractingFiles && progress.total > 0 {
                if pb.length() != Some(progress.total as u64) {
                    pb.set_length(progress.total as u64);
                }
                pb.set_position(progress.current as u64);
                if let Some(name) = &progress.current_file {
                    pb.set_message(name.clone());
                }
            }
        })?;
        pb.finish_with_message("done");
        print_done(started.elapsed());
    }

    println!("Extracted to {}", destination.display());
    Ok(())
}
