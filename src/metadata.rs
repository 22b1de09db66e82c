use std::path::Path;

use anyhow::{Context, Result};

use crate::models::SphericalMetadata;
use crate::{spherical, xml};

/// Raw document plus its parsed form for one media file.
pub struct ReadOutcome {
    pub xml: Option<String>,
    pub parsed: Option<SphericalMetadata>,
}

pub fn read_file(path: &Path) -> Result<ReadOutcome> {
    let raw = spherical::read_metadata(path)
        .with_context(|| format!("Failed to read metadata from {}", path.display()))?;
    let parsed = match &raw {
        Some(document) => Some(
            xml::parse_document(document)
                .with_context(|| format!("Malformed spherical document in {}", path.display()))?,
        ),
        None => None,
    };
    Ok(ReadOutcome { xml: raw, parsed })
}

/// Print the metadata of one file: raw XML (or JSON with `as_json`) plus a summary.
pub fn print_info(path: &Path, as_json: bool) -> Result<()> {
    let outcome = read_file(path)?;

    let Some(document) = outcome.xml else {
        println!("No spherical metadata found in {}", path.display());
        return Ok(());
    };

    if as_json {
        let parsed = outcome.parsed.unwrap_or_default();
        println!(
            "{}",
            serde_json::to_string_pretty(&parsed).context("Failed to serialize metadata to JSON")?
        );
    } else {
        println!("{document}");
        if let Some(parsed) = &outcome.parsed {
            print_summary(path, parsed);
        }
    }
    println!("Successfully read metadata from {}", path.display());

    Ok(())
}

fn print_summary(path: &Path, meta: &SphericalMetadata) {
    println!("{}", "=".repeat(80));
    println!("Spherical metadata: {}", path.display());
    println!("{}", "=".repeat(80));
    println!("  Spherical:  {}", meta.spherical);
    println!("  Stitched:   {}", meta.stitched);
    println!(
        "  Software:   {}",
        meta.stitching_software.as_deref().unwrap_or("N/A")
    );
    println!(
        "  Projection: {}",
        meta.projection.as_deref().unwrap_or("N/A")
    );
    println!(
        "  Stereo:     {}",
        meta.stereo_mode.map(|m| m.as_str()).unwrap_or("N/A")
    );
    match meta.source_count {
        Some(count) => println!("  Sources:    {count}"),
        None => println!("  Sources:    N/A"),
    }
    if let Some(crop) = &meta.crop {
        println!(
            "  Crop:       {}x{} of {}x{} at ({},{})",
            crop.cropped_width,
            crop.cropped_height,
            crop.full_width,
            crop.full_height,
            crop.left,
            crop.top
        );
    }
}
