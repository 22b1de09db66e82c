use thiserror::Error;

use crate::models::CropRegion;

/// Help text shown whenever a crop argument is rejected.
pub const CROP_HELP: &str = "Must specify 6 integers in the form of \"w:h:f_w:f_h:x:y\" \
f_w=FullPanoWidthPixels f_h=FullPanoHeightPixels \
x=CroppedAreaLeftPixels y=CroppedAreaTopPixels";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CropError {
    #[error("crop spec must be 6 colon-separated non-negative integers, got {0:?}")]
    Malformed(String),
    #[error("full pano dimensions must be non-zero")]
    EmptyPano,
    #[error("cropped area {width}x{height} exceeds the full pano {full_width}x{full_height}")]
    AreaTooLarge {
        width: u32,
        height: u32,
        full_width: u32,
        full_height: u32,
    },
    #[error("crop offset ({left},{top}) pushes the cropped area outside the full pano")]
    OffsetOutOfBounds { left: u32, top: u32 },
}

/// Parse a "w:h:f_w:f_h:x:y" crop spec into a validated region.
pub fn parse_crop_spec(spec: &str) -> Result<CropRegion, CropError> {
    let parts: Vec<&str> = spec.split(':').collect();
    if parts.len() != 6 {
        return Err(CropError::Malformed(spec.to_string()));
    }

    let mut vals = [0u32; 6];
    for (slot, part) in vals.iter_mut().zip(&parts) {
        *slot = part
            .parse::<u32>()
            .map_err(|_| CropError::Malformed(spec.to_string()))?;
    }

    validate(CropRegion {
        cropped_width: vals[0],
        cropped_height: vals[1],
        full_width: vals[2],
        full_height: vals[3],
        left: vals[4],
        top: vals[5],
    })
}

/// Check the geometric invariants of an already-assembled region.
pub fn validate(region: CropRegion) -> Result<CropRegion, CropError> {
    if region.full_width == 0 || region.full_height == 0 {
        return Err(CropError::EmptyPano);
    }
    if region.cropped_width > region.full_width || region.cropped_height > region.full_height {
        return Err(CropError::AreaTooLarge {
            width: region.cropped_width,
            height: region.cropped_height,
            full_width: region.full_width,
            full_height: region.full_height,
        });
    }

    // The offset rectangle must still fit inside the pano.
    let right = region.left.checked_add(region.cropped_width);
    let bottom = region.top.checked_add(region.cropped_height);
    if right.map_or(true, |r| r > region.full_width)
        || bottom.map_or(true, |b| b > region.full_height)
    {
        return Err(CropError::OffsetOutOfBounds {
            left: region.left,
            top: region.top,
        });
    }

    Ok(region)
}
