//! CLI command for container repacking

use std::path::Path;
use std::time::Instant;

use crate::acb::AcbPacker;
use crate::cli::progress::{DISK, PACKAGE, print_done, print_step, simple_bar};
use crate::config::Settings;

pub fn execute(source: &Path, settings: Settings, quiet: bool) -> anyhow::Result<()> {
    let started = Instant::now();
    let packer = AcbPacker::new(settings.extractor_config());

    let acb_path = if quiet {
        packer.pack(source, &|_, _, _| {})?
    } else {
        print_step(1, 2, PACKAGE, "Collecting audio files...");
        print_step(2, 2, DISK, "Rebuilding archives...");

        let pb = simple_bar(0, "Packing");
        let acb_path = packer.pack(source, &|current, total, label| {
            if pb.length() != Some(total as u64) {
                pb.set_length(total as u64);
            }
            pb.set_position(current as u64);
            pb.set_message(label.to_string());
        })?;
        pb.finish_with_message("done");
        print_done(started.elapsed());
        acb_path
    };

    println!("Rebuilt {}", acb_path.display());
    Ok(())
}
