//
// spherical.rs
// spherical-tools
//
// Reads and injects the Spherical Video V1 uuid box: moov is parsed and rewritten,
// media payloads are stream-copied, and chunk offsets are rebased when moov grows.
//

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::models::InjectOptions;
use crate::mp4::{self, BoxPayload, Mp4Box, Mp4Error};
use crate::xml::{self, XmlError};

/// UUID identifying a Spherical Video V1 metadata box.
pub const SPHERICAL_UUID: [u8; 16] = [
    0xff, 0xcc, 0x82, 0x63, 0xf8, 0x55, 0x4a, 0x93, 0x88, 0x14, 0x58, 0x7a, 0x02, 0x52, 0x1f, 0xdd,
];

#[derive(Debug, Error)]
pub enum SphericalError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Mp4(#[from] Mp4Error),
    #[error(transparent)]
    Xml(#[from] XmlError),
    #[error("no `moov` box found; not an ISO-BMFF media file")]
    MissingMoov,
    #[error("no video track to carry spherical metadata")]
    NoVideoTrack,
    #[error("spherical metadata box holds invalid UTF-8")]
    InvalidUtf8,
}

/// Read the raw spherical XML document from a media file, if present.
pub fn read_metadata(path: &Path) -> Result<Option<String>, SphericalError> {
    let mut reader = BufReader::new(File::open(path)?);
    let moov = load_moov(&mut reader)?.1;

    for trak in moov.children().iter().filter(|b| &b.name == b"trak") {
        for child in trak.children() {
            if let Some(document) = spherical_payload(child)? {
                debug!(path = %path.display(), bytes = document.len(), "spherical box found");
                return Ok(Some(document));
            }
        }
    }
    Ok(None)
}

/// Inject spherical metadata into `options.source`, writing the patched file to
/// `options.destination`. Returns the number of video tracks updated.
pub fn inject_metadata(options: &InjectOptions) -> Result<usize, SphericalError> {
    let document = xml::build_document(options)?;

    let mut reader = BufReader::new(File::open(&options.source)?);
    let boxes = mp4::scan_top_level(&mut reader)?;
    let (moov_loc, mut moov) = load_moov_from(&mut reader, &boxes)?;
    let old_size = moov_loc.header.size;

    let uuid_box = spherical_uuid_box(&document);
    let mut tracks = 0usize;
    if let Some(children) = moov.children_mut() {
        for trak in children.iter_mut().filter(|b| &b.name == b"trak") {
            if !is_video_track(trak) {
                continue;
            }
            let Some(trak_children) = trak.children_mut() else {
                continue;
            };
            // Replace any previous spherical box instead of stacking a second one.
            trak_children.retain(|child| !is_spherical_box(child));
            trak_children.push(uuid_box.clone());
            tracks += 1;
        }
    }
    if tracks == 0 {
        return Err(SphericalError::NoVideoTrack);
    }

    let delta = moov.encoded_size() as i64 - old_size as i64;
    // Media that sat past the original end of moov shifts with it.
    let threshold = moov_loc.offset + old_size;
    rebase_chunk_offsets(&mut moov, threshold, delta)?;

    let mut writer = BufWriter::new(File::create(&options.destination)?);
    for location in &boxes {
        if location.offset == moov_loc.offset {
            moov.write_to(&mut writer)?;
        } else {
            reader.seek(SeekFrom::Start(location.offset))?;
            io::copy(
                &mut (&mut reader).take(location.header.size),
                &mut writer,
            )?;
        }
    }
    writer.flush()?;

    debug!(
        tracks,
        delta,
        destination = %options.destination.display(),
        "spherical metadata injected"
    );
    Ok(tracks)
}

fn load_moov<R: Read + Seek>(
    reader: &mut R,
) -> Result<(mp4::BoxLocation, Mp4Box), SphericalError> {
    let boxes = mp4::scan_top_level(reader)?;
    load_moov_from(reader, &boxes)
}

/// Parse only the moov payload; everything else stays on disk.
fn load_moov_from<R: Read + Seek>(
    reader: &mut R,
    boxes: &[mp4::BoxLocation],
) -> Result<(mp4::BoxLocation, Mp4Box), SphericalError> {
    let location = boxes
        .iter()
        .find(|b| &b.header.name == b"moov")
        .copied()
        .ok_or(SphericalError::MissingMoov)?;

    reader.seek(SeekFrom::Start(location.offset + location.header.header_size))?;
    let mut payload = vec![0u8; location.header.payload_size() as usize];
    reader.read_exact(&mut payload)?;

    Ok((location, Mp4Box::parse(location.header.name, &payload)?))
}

/// The trak's handler type lives at bytes 8..12 of the hdlr payload.
fn is_video_track(trak: &Mp4Box) -> bool {
    let handler = trak
        .find_child(b"mdia")
        .and_then(|mdia| mdia.find_child(b"hdlr"))
        .and_then(|hdlr| hdlr.raw_payload())
        .and_then(|data| data.get(8..12));
    handler == Some(&b"vide"[..])
}

fn is_spherical_box(child: &Mp4Box) -> bool {
    &child.name == b"uuid"
        && child
            .raw_payload()
            .map_or(false, |data| data.len() >= 16 && data[..16] == SPHERICAL_UUID)
}

/// Extract the XML document from a spherical uuid box, if this is one.
fn spherical_payload(child: &Mp4Box) -> Result<Option<String>, SphericalError> {
    if &child.name != b"uuid" {
        return Ok(None);
    }
    let Some(data) = child.raw_payload() else {
        return Ok(None);
    };
    if data.len() < 16 || data[..16] != SPHERICAL_UUID {
        return Ok(None);
    }
    let text = std::str::from_utf8(&data[16..]).map_err(|_| SphericalError::InvalidUtf8)?;
    Ok(Some(text.to_string()))
}

fn spherical_uuid_box(document: &str) -> Mp4Box {
    let mut payload = Vec::with_capacity(16 + document.len());
    payload.extend_from_slice(&SPHERICAL_UUID);
    payload.extend_from_slice(document.as_bytes());
    Mp4Box::raw(b"uuid", payload)
}

/// Shift every stco/co64 entry pointing at or past `threshold` by `delta`.
fn rebase_chunk_offsets(
    bx: &mut Mp4Box,
    threshold: u64,
    delta: i64,
) -> Result<(), SphericalError> {
    if delta == 0 {
        return Ok(());
    }
    match &mut bx.payload {
        BoxPayload::Container(children) => {
            for child in children {
                rebase_chunk_offsets(child, threshold, delta)?;
            }
        }
        BoxPayload::Raw(data) => {
            if &bx.name == b"stco" {
                rebase_entries::<4>(data, threshold, delta)
                    .map_err(|_| Mp4Error::Truncated("stco".to_string()))?;
            } else if &bx.name == b"co64" {
                rebase_entries::<8>(data, threshold, delta)
                    .map_err(|_| Mp4Error::Truncated("co64".to_string()))?;
            }
        }
    }
    Ok(())
}

/// Entries follow a 4-byte version/flags word and a 4-byte count.
fn rebase_entries<const WIDTH: usize>(
    data: &mut [u8],
    threshold: u64,
    delta: i64,
) -> Result<(), ()> {
    let count_bytes: [u8; 4] = data.get(4..8).ok_or(())?.try_into().map_err(|_| ())?;
    let entry_count = u32::from_be_bytes(count_bytes) as usize;

    for index in 0..entry_count {
        let start = 8 + index * WIDTH;
        let slice = data.get_mut(start..start + WIDTH).ok_or(())?;
        let offset = match WIDTH {
            4 => u32::from_be_bytes((&*slice).try_into().map_err(|_| ())?) as u64,
            _ => u64::from_be_bytes((&*slice).try_into().map_err(|_| ())?),
        };
        if offset >= threshold {
            let shifted = (offset as i64 + delta) as u64;
            match WIDTH {
                4 => slice.copy_from_slice(&(shifted as u32).to_be_bytes()),
                _ => slice.copy_from_slice(&shifted.to_be_bytes()),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stco_payload(offsets: &[u32]) -> Vec<u8> {
        let mut data = vec![0u8; 4];
        data.extend_from_slice(&(offsets.len() as u32).to_be_bytes());
        for offset in offsets {
            data.extend_from_slice(&offset.to_be_bytes());
        }
        data
    }

    #[test]
    fn rebase_shifts_only_offsets_past_the_threshold() {
        let mut stbl = Mp4Box::container(
            b"stbl",
            vec![Mp4Box::raw(b"stco", stco_payload(&[100, 5000, 9000]))],
        );
        rebase_chunk_offsets(&mut stbl, 4000, 250).expect("rebase");

        let data = stbl.children()[0].raw_payload().expect("stco payload");
        let read = |idx: usize| {
            u32::from_be_bytes(data[8 + idx * 4..12 + idx * 4].try_into().unwrap())
        };
        assert_eq!(read(0), 100);
        assert_eq!(read(1), 5250);
        assert_eq!(read(2), 9250);
    }

    #[test]
    fn rebase_handles_co64_entries() {
        let mut data = vec![0u8; 4];
        data.extend_from_slice(&1u32.to_be_bytes());
        data.extend_from_slice(&10_000_000_000u64.to_be_bytes());
        let mut bx = Mp4Box::raw(b"co64", data);

        rebase_chunk_offsets(&mut bx, 1, -500).expect("rebase");
        let payload = bx.raw_payload().expect("payload");
        let offset = u64::from_be_bytes(payload[8..16].try_into().unwrap());
        assert_eq!(offset, 9_999_999_500);
    }

    #[test]
    fn rebase_rejects_truncated_tables() {
        // Declares two entries but carries only one.
        let mut bx = Mp4Box::raw(b"stco", {
            let mut data = vec![0u8; 4];
            data.extend_from_slice(&2u32.to_be_bytes());
            data.extend_from_slice(&100u32.to_be_bytes());
            data
        });
        assert!(rebase_chunk_offsets(&mut bx, 0, 8).is_err());
    }

    #[test]
    fn video_track_detection_reads_the_handler_type() {
        let hdlr = |kind: &[u8; 4]| {
            let mut payload = vec![0u8; 8];
            payload.extend_from_slice(kind);
            payload.extend_from_slice(&[0u8; 12]);
            Mp4Box::raw(b"hdlr", payload)
        };
        let trak = |kind: &[u8; 4]| {
            Mp4Box::container(b"trak", vec![Mp4Box::container(b"mdia", vec![hdlr(kind)])])
        };
        assert!(is_video_track(&trak(b"vide")));
        assert!(!is_video_track(&trak(b"soun")));
    }
}
