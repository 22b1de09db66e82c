//
// mp4.rs
// spherical-tools
//
// ISO-BMFF box primitives: header reading, a top-level scan, and a parsed box tree
// that descends only into the containers the tool needs to rewrite.
//

use std::io::{self, Read, Seek, SeekFrom, Write};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Mp4Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("box `{0}` is truncated")]
    Truncated(String),
    #[error("box `{name}` declares size {size}, smaller than its own header")]
    BadSize { name: String, size: u64 },
}

/// Container types the tool descends into; everything else stays an opaque payload.
const CONTAINERS: [&[u8; 4]; 5] = [b"moov", b"trak", b"mdia", b"minf", b"stbl"];

/// Size and four-character type read from a box header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxHeader {
    pub name: [u8; 4],
    pub size: u64,
    pub header_size: u64,
}

impl BoxHeader {
    pub fn payload_size(&self) -> u64 {
        self.size.saturating_sub(self.header_size)
    }

    pub fn name_string(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }
}

fn read_u32_be<R: Read>(r: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

fn read_u64_be<R: Read>(r: &mut R) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_be_bytes(buf))
}

/// Read one box header, handling the 64-bit `size == 1` large-size form.
/// A declared size of zero ("box extends to end of file") is passed through for
/// the caller to resolve against the remaining length.
pub fn read_box_header<R: Read>(r: &mut R) -> Result<BoxHeader, Mp4Error> {
    let size32 = read_u32_be(r)?;
    let mut name = [0u8; 4];
    r.read_exact(&mut name)?;

    let (size, header_size) = if size32 == 1 {
        (read_u64_be(r)?, 16u64)
    } else {
        (size32 as u64, 8u64)
    };

    if size != 0 && size < header_size {
        return Err(Mp4Error::BadSize {
            name: String::from_utf8_lossy(&name).into_owned(),
            size,
        });
    }

    Ok(BoxHeader {
        name,
        size,
        header_size,
    })
}

/// Location of a top-level box within a file. `header.size` is always resolved,
/// never zero.
#[derive(Debug, Clone, Copy)]
pub struct BoxLocation {
    pub header: BoxHeader,
    pub offset: u64,
}

/// Scan the top-level boxes of a seekable stream without reading their payloads.
pub fn scan_top_level<R: Read + Seek>(r: &mut R) -> Result<Vec<BoxLocation>, Mp4Error> {
    let end = r.seek(SeekFrom::End(0))?;
    let mut boxes = Vec::new();
    let mut pos = 0u64;

    while pos < end {
        r.seek(SeekFrom::Start(pos))?;
        let mut header = read_box_header(r)?;
        if header.size == 0 {
            header.size = end - pos;
        }
        if pos + header.size > end {
            return Err(Mp4Error::Truncated(header.name_string()));
        }
        boxes.push(BoxLocation {
            header,
            offset: pos,
        });
        pos += header.size;
    }

    Ok(boxes)
}

/// A parsed box: known containers keep children, everything else raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mp4Box {
    pub name: [u8; 4],
    pub payload: BoxPayload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoxPayload {
    Raw(Vec<u8>),
    Container(Vec<Mp4Box>),
}

impl Mp4Box {
    pub fn raw(name: &[u8; 4], payload: Vec<u8>) -> Self {
        Mp4Box {
            name: *name,
            payload: BoxPayload::Raw(payload),
        }
    }

    pub fn container(name: &[u8; 4], children: Vec<Mp4Box>) -> Self {
        Mp4Box {
            name: *name,
            payload: BoxPayload::Container(children),
        }
    }

    /// Parse a box payload, recursing into known container types.
    pub fn parse(name: [u8; 4], data: &[u8]) -> Result<Self, Mp4Error> {
        if CONTAINERS.contains(&&name) {
            Ok(Mp4Box {
                name,
                payload: BoxPayload::Container(parse_children(data)?),
            })
        } else {
            Ok(Mp4Box {
                name,
                payload: BoxPayload::Raw(data.to_vec()),
            })
        }
    }

    pub fn children(&self) -> &[Mp4Box] {
        match &self.payload {
            BoxPayload::Container(children) => children,
            BoxPayload::Raw(_) => &[],
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Mp4Box>> {
        match &mut self.payload {
            BoxPayload::Container(children) => Some(children),
            BoxPayload::Raw(_) => None,
        }
    }

    pub fn raw_payload(&self) -> Option<&[u8]> {
        match &self.payload {
            BoxPayload::Raw(data) => Some(data),
            BoxPayload::Container(_) => None,
        }
    }

    pub fn raw_payload_mut(&mut self) -> Option<&mut Vec<u8>> {
        match &mut self.payload {
            BoxPayload::Raw(data) => Some(data),
            BoxPayload::Container(_) => None,
        }
    }

    pub fn find_child(&self, name: &[u8; 4]) -> Option<&Mp4Box> {
        self.children().iter().find(|child| &child.name == name)
    }

    /// Total encoded size, header included. Boxes over `u32::MAX` switch to the
    /// 16-byte large-size header.
    pub fn encoded_size(&self) -> u64 {
        let payload = match &self.payload {
            BoxPayload::Raw(data) => data.len() as u64,
            BoxPayload::Container(children) => {
                children.iter().map(Mp4Box::encoded_size).sum()
            }
        };
        if payload + 8 > u32::MAX as u64 {
            payload + 16
        } else {
            payload + 8
        }
    }

    /// Serialize the box with recomputed sizes.
    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let size = self.encoded_size();
        if size > u32::MAX as u64 {
            out.write_all(&1u32.to_be_bytes())?;
            out.write_all(&self.name)?;
            out.write_all(&size.to_be_bytes())?;
        } else {
            out.write_all(&(size as u32).to_be_bytes())?;
            out.write_all(&self.name)?;
        }
        match &self.payload {
            BoxPayload::Raw(data) => out.write_all(data)?,
            BoxPayload::Container(children) => {
                for child in children {
                    child.write_to(out)?;
                }
            }
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_size() as usize);
        // Writing into a Vec cannot fail.
        let _ = self.write_to(&mut out);
        out
    }
}

/// Split a container payload into child boxes. A trailing zero-size child
/// extends to the end of the payload.
pub fn parse_children(data: &[u8]) -> Result<Vec<Mp4Box>, Mp4Error> {
    let mut children = Vec::new();
    let mut pos = 0usize;

    while pos < data.len() {
        let mut cursor = &data[pos..];
        let header = read_box_header(&mut cursor)?;
        let size = if header.size == 0 {
            (data.len() - pos) as u64
        } else {
            header.size
        };
        let start = pos as u64 + header.header_size;
        let end = pos as u64 + size;
        if end > data.len() as u64 || start > end {
            return Err(Mp4Error::Truncated(header.name_string()));
        }
        children.push(Mp4Box::parse(
            header.name,
            &data[start as usize..end as usize],
        )?);
        pos = end as usize;
    }

    Ok(children)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_a_compact_header() {
        let bytes = [0u8, 0, 0, 16, b'f', b'r', b'e', b'e'];
        let header = read_box_header(&mut &bytes[..]).expect("header");
        assert_eq!(&header.name, b"free");
        assert_eq!(header.size, 16);
        assert_eq!(header.header_size, 8);
        assert_eq!(header.payload_size(), 8);
    }

    #[test]
    fn reads_a_large_size_header() {
        let mut bytes = vec![0u8, 0, 0, 1, b'm', b'd', b'a', b't'];
        bytes.extend_from_slice(&1_000_000u64.to_be_bytes());
        let header = read_box_header(&mut &bytes[..]).expect("header");
        assert_eq!(&header.name, b"mdat");
        assert_eq!(header.size, 1_000_000);
        assert_eq!(header.header_size, 16);
    }

    #[test]
    fn rejects_size_smaller_than_header() {
        let bytes = [0u8, 0, 0, 4, b'f', b'r', b'e', b'e'];
        assert!(matches!(
            read_box_header(&mut &bytes[..]),
            Err(Mp4Error::BadSize { .. })
        ));
    }

    #[test]
    fn box_tree_round_trips_through_bytes() {
        let tree = Mp4Box::container(
            b"moov",
            vec![
                Mp4Box::raw(b"mvhd", vec![0u8; 100]),
                Mp4Box::container(
                    b"trak",
                    vec![
                        Mp4Box::raw(b"tkhd", vec![1u8; 84]),
                        Mp4Box::raw(b"uuid", b"payload".to_vec()),
                    ],
                ),
            ],
        );

        let bytes = tree.to_bytes();
        assert_eq!(bytes.len() as u64, tree.encoded_size());

        let mut cursor = &bytes[..];
        let header = read_box_header(&mut cursor).expect("moov header");
        assert_eq!(&header.name, b"moov");
        let reparsed = Mp4Box::parse(header.name, &bytes[8..]).expect("reparse");
        assert_eq!(reparsed, tree);
    }

    #[test]
    fn truncated_child_is_an_error() {
        // Child declares 32 bytes but only 12 are present.
        let mut data = Vec::new();
        data.extend_from_slice(&32u32.to_be_bytes());
        data.extend_from_slice(b"mvhd");
        data.extend_from_slice(&[0u8; 4]);
        assert!(matches!(
            parse_children(&data),
            Err(Mp4Error::Truncated(_))
        ));
    }

    #[test]
    fn scan_resolves_zero_size_to_end_of_file() {
        let mut data = Vec::new();
        data.extend_from_slice(&16u32.to_be_bytes());
        data.extend_from_slice(b"ftyp");
        data.extend_from_slice(&[0u8; 8]);
        // Zero-size mdat runs to EOF.
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(b"mdat");
        data.extend_from_slice(&[7u8; 24]);

        let mut cursor = std::io::Cursor::new(data);
        let boxes = scan_top_level(&mut cursor).expect("scan");
        assert_eq!(boxes.len(), 2);
        assert_eq!(&boxes[1].header.name, b"mdat");
        assert_eq!(boxes[1].header.size, 32);
        assert_eq!(boxes[1].offset, 16);
    }

    #[test]
    fn scan_rejects_box_overrunning_the_file() {
        let mut data = Vec::new();
        data.extend_from_slice(&64u32.to_be_bytes());
        data.extend_from_slice(b"moov");
        data.extend_from_slice(&[0u8; 8]);
        let mut cursor = std::io::Cursor::new(data);
        assert!(matches!(
            scan_top_level(&mut cursor),
            Err(Mp4Error::Truncated(_))
        ));
    }
}
