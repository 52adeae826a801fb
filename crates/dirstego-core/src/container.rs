//! Container framer (C4): per-image header layout.
//!
//! ```text
//! [ id_len_minus_1  : 4 bits ]
//! [ image_index     : id_len bits ]
//! (only if image_index == 0):
//! [ total_len_len_minus_1 : 6 bits ]
//! [ total_payload_bits    : tot_len bits ]
//! [ body bits ... ]
//! ```

use crate::bits::{decode_uint, encode_uint, reserve_bits};
use crate::error::Result;
use crate::pixels::PixelCursor;

const INDEX_LEN_WIDTH: u32 = 4;
const TOTAL_LEN_WIDTH: u32 = 6;

/// Header metadata for a single carrier image, as read back from its pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    pub image_index: u64,
    /// Present only when `image_index == 0`.
    pub total_payload_bits: Option<u64>,
}

/// Number of header bits this image will occupy once written.
pub fn header_overhead(image_index: u64, is_first: bool, total_payload_bits: u64) -> u32 {
    let id_reserve = reserve_bits(image_index);
    if is_first {
        INDEX_LEN_WIDTH + id_reserve + TOTAL_LEN_WIDTH + reserve_bits(total_payload_bits)
    } else {
        INDEX_LEN_WIDTH + id_reserve
    }
}

/// Writes the header for `image_index` (and, if it is the first image, `L`)
/// to the front of the image via `cursor`.
pub fn write_header(
    cursor: &mut PixelCursor,
    image_index: u64,
    total_payload_bits: Option<u64>,
) -> Result<()> {
    let id_reserve = reserve_bits(image_index);
    cursor.write_bits(&encode_uint(id_reserve as u64 - 1, INDEX_LEN_WIDTH)?)?;
    cursor.write_bits(&encode_uint(image_index, id_reserve)?)?;

    if let Some(total) = total_payload_bits {
        let tot_reserve = reserve_bits(total);
        cursor.write_bits(&encode_uint(tot_reserve as u64 - 1, TOTAL_LEN_WIDTH)?)?;
        cursor.write_bits(&encode_uint(total, tot_reserve)?)?;
    }
    Ok(())
}

/// Reads a header from the front of an image, stopping after the image
/// index for non-first images (index != 0), or after `L` for the first.
pub fn read_header(cursor: &mut PixelCursor) -> Result<ImageHeader> {
    let id_reserve = decode_uint(&cursor.read_bits(INDEX_LEN_WIDTH as u64)?) + 1;
    let image_index = decode_uint(&cursor.read_bits(id_reserve)?);

    if image_index != 0 {
        return Ok(ImageHeader { image_index, total_payload_bits: None });
    }

    let tot_reserve = decode_uint(&cursor.read_bits(TOTAL_LEN_WIDTH as u64)?) + 1;
    let total_payload_bits = decode_uint(&cursor.read_bits(tot_reserve)?);
    Ok(ImageHeader {
        image_index,
        total_payload_bits: Some(total_payload_bits),
    })
}
