//
// xml.rs
// spherical-tools
//
// Builds and parses the Spherical Video V1 RDF document carried inside the spherical uuid box.
//

use std::io::Cursor;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use thiserror::Error;

use crate::models::{CropRegion, InjectOptions, SphericalMetadata, StereoMode};

pub const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const GSPHERICAL_NS: &str = "http://ns.google.com/videos/1.0/spherical/";

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
}

/// Render the Spherical Video V1 document for the given injection options.
pub fn build_document(options: &InjectOptions) -> Result<String, XmlError> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let mut root = BytesStart::new("rdf:SphericalVideo");
    root.push_attribute(("xmlns:rdf", RDF_NS));
    root.push_attribute(("xmlns:GSpherical", GSPHERICAL_NS));
    writer.write_event(Event::Start(root))?;

    write_text(&mut writer, "GSpherical:Spherical", "true")?;
    write_text(&mut writer, "GSpherical:Stitched", "true")?;
    write_text(&mut writer, "GSpherical:StitchingSoftware", &options.software)?;
    write_text(
        &mut writer,
        "GSpherical:ProjectionType",
        options.projection.as_str(),
    )?;
    write_text(&mut writer, "GSpherical:StereoMode", options.stereo.as_str())?;
    write_text(
        &mut writer,
        "GSpherical:SourceCount",
        &options.source_count.to_string(),
    )?;

    if let Some(crop) = &options.crop {
        write_crop(&mut writer, crop)?;
    }

    writer.write_event(Event::End(BytesEnd::new("rdf:SphericalVideo")))?;

    let bytes = writer.into_inner().into_inner();
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn write_crop<W: std::io::Write>(writer: &mut Writer<W>, crop: &CropRegion) -> Result<(), XmlError> {
    let fields = [
        ("GSpherical:CroppedAreaImageWidthPixels", crop.cropped_width),
        ("GSpherical:CroppedAreaImageHeightPixels", crop.cropped_height),
        ("GSpherical:FullPanoWidthPixels", crop.full_width),
        ("GSpherical:FullPanoHeightPixels", crop.full_height),
        ("GSpherical:CroppedAreaLeftPixels", crop.left),
        ("GSpherical:CroppedAreaTopPixels", crop.top),
    ];
    for (tag, value) in fields {
        write_text(writer, tag, &value.to_string())?;
    }
    Ok(())
}

fn write_text<W: std::io::Write>(
    writer: &mut Writer<W>,
    tag: &str,
    value: &str,
) -> Result<(), XmlError> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(value)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

/// Parse a Spherical Video V1 document into its structured form. Unknown
/// elements are ignored; the crop record is only surfaced when all six
/// fields are present.
pub fn parse_document(xml: &str) -> Result<SphericalMetadata, XmlError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut meta = SphericalMetadata::default();
    let mut curr = String::new();

    let mut cropped_width = None;
    let mut cropped_height = None;
    let mut full_width = None;
    let mut full_height = None;
    let mut left = None;
    let mut top = None;

    loop {
        match reader.read_event()? {
            Event::Start(ref e) => {
                curr = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
            }
            Event::End(_) => curr.clear(),
            Event::Text(e) => {
                let txt = e.unescape()?;
                match curr.as_str() {
                    "Spherical" => meta.spherical = txt.eq_ignore_ascii_case("true"),
                    "Stitched" => meta.stitched = txt.eq_ignore_ascii_case("true"),
                    "StitchingSoftware" => meta.stitching_software = Some(txt.to_string()),
                    "ProjectionType" => meta.projection = Some(txt.to_string()),
                    "StereoMode" => meta.stereo_mode = StereoMode::parse(&txt),
                    "SourceCount" => meta.source_count = txt.parse().ok(),
                    "CroppedAreaImageWidthPixels" => cropped_width = txt.parse().ok(),
                    "CroppedAreaImageHeightPixels" => cropped_height = txt.parse().ok(),
                    "FullPanoWidthPixels" => full_width = txt.parse().ok(),
                    "FullPanoHeightPixels" => full_height = txt.parse().ok(),
                    "CroppedAreaLeftPixels" => left = txt.parse().ok(),
                    "CroppedAreaTopPixels" => top = txt.parse().ok(),
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let (Some(cw), Some(ch), Some(fw), Some(fh), Some(l), Some(t)) = (
        cropped_width,
        cropped_height,
        full_width,
        full_height,
        left,
        top,
    ) {
        meta.crop = Some(CropRegion {
            cropped_width: cw,
            cropped_height: ch,
            full_width: fw,
            full_height: fh,
            left: l,
            top: t,
        });
    }

    Ok(meta)
}
