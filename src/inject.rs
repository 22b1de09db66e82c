use anyhow::{Context, Result};
use tracing::info;

use crate::models::InjectOptions;
use crate::spherical;

/// Run a single injection and report the outcome on stdout.
pub fn process_file(options: &InjectOptions) -> Result<()> {
    let tracks = spherical::inject_metadata(options).with_context(|| {
        format!(
            "Error occurred during metadata injection into {}",
            options.source.display()
        )
    })?;

    info!(
        tracks,
        source = %options.source.display(),
        destination = %options.destination.display(),
        "metadata injection complete"
    );
    println!(
        "Metadata injection complete: {} -> {} ({} video track{})",
        options.source.display(),
        options.destination.display(),
        tracks,
        if tracks == 1 { "" } else { "s" }
    );

    Ok(())
}
