//! Encoder / Decoder (C5): drives the pixel cursor (C3) and container framer
//! (C4) across a set of cover/carrier images, handling capacity planning,
//! image ordering, and termination.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, trace, warn};

use crate::bits::{bits_to_bytes, bytes_to_bits, reserve_bits};
use crate::container::{header_overhead, read_header, write_header};
use crate::error::{Result, StegoError};
use crate::pixels::{sample_capacity, PixelCursor};
use crate::tree::{write_to_disk, Node};

/// Report returned by [`encode`] describing what was written.
#[derive(Debug, Clone)]
pub struct EncodeReport {
    pub payload_bits: u64,
    pub images_used: Vec<String>,
    pub images_unused: Vec<String>,
}

/// A capacity-checked encode ready to commit: the payload, the ordered
/// cover list, and each cover's planned capacity.
///
/// Splitting planning from committing lets a caller (the interactive CLI)
/// report the payload size and ask for confirmation before any image is
/// touched, the same sequencing the reference implementation uses.
pub struct EncodePlan {
    payload_bits: Vec<bool>,
    covers: Vec<PathBuf>,
    capacities: Vec<u64>,
}

impl EncodePlan {
    pub fn payload_bits_len(&self) -> u64 {
        self.payload_bits.len() as u64
    }
}

/// Builds the tree payload and checks it against the covers in
/// `input_photos`, without writing anything.
pub fn plan_encode(
    data_path: &Path,
    trailing_separator: bool,
    input_photos: &Path,
) -> Result<EncodePlan> {
    let (name, node) = Node::from_fs(data_path, trailing_separator)?;
    let mut root = std::collections::BTreeMap::new();
    root.insert(name, node);
    let outer = Node::Dir(root);
    let payload_bytes = outer.serialize();
    let payload_bits = bytes_to_bits(&payload_bytes);
    let total_bits = payload_bits.len() as u64;

    let covers = list_cover_pngs(input_photos)?;
    let capacities = plan_capacity(&covers, total_bits)?;

    debug!(payload_bits = total_bits, images = covers.len(), "planned encode");

    Ok(EncodePlan {
        payload_bits,
        covers,
        capacities,
    })
}

/// Writes the carrier images for a previously checked [`EncodePlan`].
pub fn commit_encode(plan: &EncodePlan, processed_photos: &Path) -> Result<EncodeReport> {
    let EncodePlan {
        payload_bits,
        covers,
        capacities,
        ..
    } = plan;
    let total_bits = payload_bits.len() as u64;

    std::fs::create_dir_all(processed_photos)?;
    clear_dir(processed_photos)?;

    let mut bit_index = 0u64;
    let mut images_used = Vec::new();
    let mut images_unused = Vec::new();

    for (image_index, (cover_path, capacity)) in covers.iter().zip(capacities.iter()).enumerate() {
        let image_index = image_index as u64;
        let basename = cover_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if bit_index >= total_bits {
            images_unused.push(basename);
            continue;
        }

        let is_first = image_index == 0;
        let dynamic = image::open(cover_path)?;
        let mut rgb = dynamic.into_rgb8();

        {
            let mut cursor = PixelCursor::new(&mut rgb);
            write_header(&mut cursor, image_index, is_first.then_some(total_bits))?;

            let remaining = total_bits - bit_index;
            let take = remaining.min(*capacity);
            let chunk = &payload_bits[bit_index as usize..(bit_index + take) as usize];
            cursor.write_bits(chunk)?;
            bit_index += take;
        }

        let dest = processed_photos.join(&basename);
        rgb.save(&dest)?;
        trace!(image = %basename, bit_index, total_bits, "wrote carrier image");
        info!(
            "hiding data in photo {basename} ({:.1}% complete)",
            100.0 * bit_index as f64 / total_bits.max(1) as f64
        );
        images_used.push(basename);
    }

    if bit_index != total_bits {
        return Err(StegoError::ImageTooSmall(
            "not all data was able to be hidden in the given photos".into(),
        ));
    }

    if !images_unused.is_empty() {
        warn!(count = images_unused.len(), "some cover photos were not needed");
    }

    Ok(EncodeReport {
        payload_bits: total_bits,
        images_used,
        images_unused,
    })
}

/// Plans and commits an encode in one call, for callers that don't need a
/// confirmation step between the two (tests, library consumers).
pub fn encode(
    data_path: &Path,
    trailing_separator: bool,
    input_photos: &Path,
    processed_photos: &Path,
) -> Result<EncodeReport> {
    let plan = plan_encode(data_path, trailing_separator, input_photos)?;
    commit_encode(&plan, processed_photos)
}

/// Reconstructs the directory tree hidden across the carrier PNGs in
/// `processed_photos`, writing it into `extracted_data`.
///
/// `extracted_data` must already exist and be a directory; this is not
/// created on the caller's behalf, matching the reference's
/// `createDirectoryFromByteData` precondition check.
pub fn decode(processed_photos: &Path, extracted_data: &Path) -> Result<()> {
    let covers = list_cover_pngs(processed_photos)?;
    if covers.is_empty() {
        return Err(StegoError::InvalidImageSet("no carrier photos found".into()));
    }

    let mut by_index: HashMap<u64, PathBuf> = HashMap::new();
    let mut total_bits: Option<u64> = None;

    for path in &covers {
        let dynamic = image::open(path)?;
        let mut rgb = dynamic.into_rgb8();
        let mut cursor = PixelCursor::new(&mut rgb);
        let header = read_header(&mut cursor)?;

        if by_index.insert(header.image_index, path.clone()).is_some() {
            return Err(StegoError::InvalidImageSet(format!(
                "duplicate image index {}",
                header.image_index
            )));
        }
        if let Some(total) = header.total_payload_bits {
            total_bits = Some(total);
        }
    }

    let n = by_index.len() as u64;
    for idx in 0..n {
        if !by_index.contains_key(&idx) {
            return Err(StegoError::InvalidImageSet(format!(
                "missing image index {idx} in a set of {n}"
            )));
        }
    }
    if by_index.keys().any(|&idx| idx >= n) {
        return Err(StegoError::InvalidImageSet(
            "image index out of range 0..N-1".into(),
        ));
    }

    let total_bits = total_bits.ok_or_else(|| {
        StegoError::InvalidImageSet("no image carried index 0 (total length header)".into())
    })?;

    let meta = std::fs::metadata(extracted_data).map_err(|_| StegoError::InvalidInputPath {
        path: extracted_data.to_path_buf(),
        reason: "target directory does not exist".into(),
    })?;
    if !meta.is_dir() {
        return Err(StegoError::InvalidInputPath {
            path: extracted_data.to_path_buf(),
            reason: "target is not a directory".into(),
        });
    }
    clear_dir(extracted_data)?;

    let mut bits = Vec::with_capacity(total_bits as usize);
    for idx in 0..n {
        if bits.len() as u64 >= total_bits {
            break;
        }
        let path = &by_index[&idx];
        let dynamic = image::open(path)?;
        let mut rgb = dynamic.into_rgb8();
        let mut cursor = PixelCursor::new(&mut rgb);

        let overhead = header_overhead(idx, idx == 0, total_bits);
        cursor.skip(overhead as u64)?;

        let remaining = total_bits - bits.len() as u64;
        let image_capacity = sample_capacity(rgb.width(), rgb.height()).saturating_sub(overhead as u64);
        let take = remaining.min(image_capacity);
        bits.extend(cursor.read_bits(take)?);
        info!(
            "extracting data from photo {} ({:.1}% complete)",
            path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
            100.0 * bits.len() as f64 / total_bits.max(1) as f64
        );
    }

    if bits.len() as u64 != total_bits {
        return Err(StegoError::CorruptPayload(
            "accumulated bit count does not match the recorded payload length".into(),
        ));
    }

    let payload_bytes = bits_to_bytes(&bits)?;
    let outer = Node::deserialize(&payload_bytes)?;
    let Node::Dir(children) = &outer else {
        return Err(StegoError::CorruptPayload("decoded payload is not a tree".into()));
    };
    if children.len() != 1 {
        return Err(StegoError::CorruptPayload(format!(
            "expected exactly one root entry, found {}",
            children.len()
        )));
    }
    let (name, node) = children.iter().next().unwrap();
    write_to_disk(extracted_data, name, node)
}

/// Lists the PNG cover/carrier files in `dir`, purging any hidden
/// (leading-dot) entries that are not themselves `.png` first, and sorting
/// the remainder lexicographically by raw byte name.
fn list_cover_pngs(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(StegoError::InvalidInputPath {
            path: dir.to_path_buf(),
            reason: "not a directory".into(),
        });
    }

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name_str = name.to_string_lossy();
        if name_str.starts_with('.') && !name_str.to_lowercase().ends_with(".png") {
            trace!(file = %name_str, "purging hidden file");
            std::fs::remove_file(entry.path())?;
        }
    }

    let mut names: Vec<std::ffi::OsString> = std::fs::read_dir(dir)?
        .map(|e| e.map(|e| e.file_name()))
        .collect::<std::io::Result<_>>()?;
    use std::os::unix::ffi::OsStrExt;
    names.sort_by(|a, b| a.as_bytes().cmp(b.as_bytes()));

    let mut out = Vec::with_capacity(names.len());
    for name in names {
        let name_str = name.to_string_lossy();
        if !name_str.to_lowercase().ends_with(".png") {
            return Err(StegoError::UnsupportedImage(dir.join(&name)));
        }
        out.push(dir.join(&name));
    }
    Ok(out)
}

/// Conservative per-image capacity for a fixed image count/payload length:
/// every image is assumed to reserve `reserve_bits(N)` bits for its index,
/// matching the spec's capacity-planning rule (actual writes may use fewer
/// bits for images whose real index is smaller).
fn plan_capacity(covers: &[PathBuf], total_bits: u64) -> Result<Vec<u64>> {
    let n_avail = covers.len();
    if n_avail == 0 {
        return Err(StegoError::CapacityExceeded("no cover photos available".into()));
    }
    if n_avail >= (1usize << 16) {
        return Err(StegoError::CapacityExceeded(format!(
            "too many photos: max is {}",
            (1u32 << 16) - 1
        )));
    }

    let id_reserve = reserve_bits(n_avail as u64);
    let tot_reserve = reserve_bits(total_bits);

    let mut capacities = Vec::with_capacity(n_avail);
    let mut sum = 0u64;
    for (idx, path) in covers.iter().enumerate() {
        let dims = image::image_dimensions(path)?;
        let overhead = if idx == 0 {
            4 + id_reserve + 6 + tot_reserve
        } else {
            4 + id_reserve
        };
        let total_samples = sample_capacity(dims.0, dims.1);
        let capacity = total_samples.checked_sub(overhead as u64).unwrap_or(0);
        if capacity < 1 {
            return Err(StegoError::ImageTooSmall(format!(
                "{} is too small to hide any data",
                path.display()
            )));
        }
        capacities.push(capacity);
        sum += capacity;
    }

    if sum < total_bits {
        return Err(StegoError::ImageTooSmall(format!(
            "requested {total_bits} bits, but the given photos can only hold {sum} bits"
        )));
    }

    Ok(capacities)
}

fn clear_dir(dir: &Path) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            std::fs::remove_dir_all(&path)?;
        } else {
            std::fs::remove_file(&path)?;
        }
    }
    Ok(())
}

/// Formats a bit count as a human-readable byte size, for the encode
/// confirmation prompt (`spec.md` §6).
pub fn human_readable_size(num_bits: u64) -> String {
    let num_bytes = num_bits as f64 / 8.0;
    let (value, unit) = if num_bytes < 1000.0 {
        (num_bytes, "bytes")
    } else if num_bytes < 1e6 {
        (((num_bytes / 100.0).floor()) / 10.0, "kilobytes")
    } else if num_bytes < 1e9 {
        (((num_bytes / 1e5).floor()) / 10.0, "megabytes")
    } else if num_bytes < 1e12 {
        (((num_bytes / 1e8).floor()) / 10.0, "gigabytes")
    } else {
        (((num_bytes / 1e11).floor()) / 10.0, "terabytes")
    };
    format!("{value} {unit}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn write_png(path: &Path, w: u32, h: u32) {
        RgbImage::from_pixel(w, h, Rgb([128, 128, 128])).save(path).unwrap();
    }

    #[test]
    fn round_trip_single_small_file_single_image() {
        let tmp = tempfile::tempdir().unwrap();
        let data = tmp.path().join("Data_To_Hide");
        std::fs::create_dir(&data).unwrap();
        std::fs::write(data.join("hello.txt"), b"hi\n").unwrap();

        let input = tmp.path().join("Input_Photos");
        std::fs::create_dir(&input).unwrap();
        write_png(&input.join("cover.png"), 64, 64);

        let processed = tmp.path().join("Processed_Photos");
        let extracted = tmp.path().join("Extracted_Data");
        std::fs::create_dir(&extracted).unwrap();

        let report = encode(&data, false, &input, &processed).unwrap();
        assert_eq!(report.images_used.len(), 1);
        assert!(report.images_unused.is_empty());

        decode(&processed, &extracted).unwrap();
        let restored = std::fs::read(extracted.join("Data_To_Hide/hello.txt")).unwrap();
        assert_eq!(restored, b"hi\n");
    }

    #[test]
    fn round_trip_empty_file() {
        let tmp = tempfile::tempdir().unwrap();
        let data = tmp.path().join("Data_To_Hide");
        std::fs::create_dir(&data).unwrap();
        std::fs::write(data.join("empty"), b"").unwrap();

        let input = tmp.path().join("Input_Photos");
        std::fs::create_dir(&input).unwrap();
        write_png(&input.join("cover.png"), 64, 64);

        let processed = tmp.path().join("Processed_Photos");
        let extracted = tmp.path().join("Extracted_Data");
        std::fs::create_dir(&extracted).unwrap();

        encode(&data, false, &input, &processed).unwrap();
        decode(&processed, &extracted).unwrap();
        let restored = std::fs::read(extracted.join("Data_To_Hide/empty")).unwrap();
        assert_eq!(restored, b"");
    }

    #[test]
    fn round_trip_two_level_directory_two_images() {
        let tmp = tempfile::tempdir().unwrap();
        let data = tmp.path().join("root");
        std::fs::create_dir(&data).unwrap();
        std::fs::write(data.join("a.bin"), (0u8..=255).collect::<Vec<u8>>()).unwrap();
        std::fs::create_dir(data.join("sub")).unwrap();
        std::fs::write(data.join("sub/b.bin"), vec![0xAAu8; 100]).unwrap();

        let input = tmp.path().join("Input_Photos");
        std::fs::create_dir(&input).unwrap();
        write_png(&input.join("a.png"), 128, 128);
        write_png(&input.join("b.png"), 128, 128);

        let processed = tmp.path().join("Processed_Photos");
        let extracted = tmp.path().join("Extracted_Data");
        std::fs::create_dir(&extracted).unwrap();

        encode(&data, false, &input, &processed).unwrap();
        decode(&processed, &extracted).unwrap();

        assert_eq!(
            std::fs::read(extracted.join("root/a.bin")).unwrap(),
            (0u8..=255).collect::<Vec<u8>>()
        );
        assert_eq!(
            std::fs::read(extracted.join("root/sub/b.bin")).unwrap(),
            vec![0xAAu8; 100]
        );
    }

    #[test]
    fn carrier_only_modifies_lsbs() {
        let tmp = tempfile::tempdir().unwrap();
        let data = tmp.path().join("Data_To_Hide");
        std::fs::create_dir(&data).unwrap();
        std::fs::write(data.join("f"), vec![0xFFu8; 64]).unwrap();

        let input = tmp.path().join("Input_Photos");
        std::fs::create_dir(&input).unwrap();
        let cover_path = input.join("cover.png");
        write_png(&cover_path, 32, 32);
        let cover = image::open(&cover_path).unwrap().into_rgb8();

        let processed = tmp.path().join("Processed_Photos");
        encode(&data, false, &input, &processed).unwrap();

        let carrier = image::open(processed.join("cover.png")).unwrap().into_rgb8();
        for (c, p) in cover.pixels().zip(carrier.pixels()) {
            for ch in 0..3 {
                let diff = (c.0[ch] as i16 - p.0[ch] as i16).abs();
                assert!(diff <= 1, "channel differs by more than 1");
            }
        }
    }

    #[test]
    fn capacity_exactly_equal_succeeds_at_the_exact_boundary() {
        // A single 100x100 cover has 30000 samples. With one image (n_avail
        // = 1, id_reserve = 1) and a requested length that lands in
        // [2^14, 2^15) (tot_reserve = 15), overhead = 4 + 1 + 6 + 15 = 26,
        // so capacity = 30000 - 26 = 29974 bits -- and 29974 itself lands in
        // that same bracket, so the self-reference is consistent. Request
        // exactly that many bits: `plan_capacity` must accept L == sum(capacities).
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("Input_Photos");
        std::fs::create_dir(&input).unwrap();
        let cover = input.join("cover.png");
        write_png(&cover, 100, 100);
        let covers = vec![cover];

        let capacities = plan_capacity(&covers, 29974).unwrap();
        assert_eq!(capacities, vec![29974]);
    }

    #[test]
    fn capacity_off_by_one_fails_before_writing() {
        // One bit past the boundary established above: same overhead
        // bracket (tot_reserve is still 15 at 29975), so capacity is still
        // 29974 but the request is 29975 -- exactly sum(capacities) + 1.
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("Input_Photos");
        std::fs::create_dir(&input).unwrap();
        let cover = input.join("cover.png");
        write_png(&cover, 100, 100);
        let covers = vec![cover];

        let err = plan_capacity(&covers, 29975).unwrap_err();
        assert!(matches!(err, StegoError::ImageTooSmall(_)));
    }

    #[test]
    fn capacity_off_by_one_end_to_end_fails_before_writing() {
        let tmp = tempfile::tempdir().unwrap();
        let data = tmp.path().join("Data_To_Hide");
        std::fs::create_dir(&data).unwrap();
        // A 1x1 image has only 3 samples total, far less than any real
        // payload's header + body requirement.
        std::fs::write(data.join("f"), vec![0x00u8; 4096]).unwrap();

        let input = tmp.path().join("Input_Photos");
        std::fs::create_dir(&input).unwrap();
        write_png(&input.join("cover.png"), 2, 2);

        let processed = tmp.path().join("Processed_Photos");
        let err = encode(&data, false, &input, &processed).unwrap_err();
        assert!(matches!(err, StegoError::ImageTooSmall(_)));
        assert!(!processed.exists() || std::fs::read_dir(&processed).unwrap().next().is_none());
    }

    #[test]
    fn decode_rejects_missing_index() {
        let tmp = tempfile::tempdir().unwrap();
        let data = tmp.path().join("root");
        std::fs::create_dir(&data).unwrap();
        std::fs::write(data.join("a.bin"), vec![0x11u8; 500]).unwrap();

        let input = tmp.path().join("Input_Photos");
        std::fs::create_dir(&input).unwrap();
        write_png(&input.join("a.png"), 64, 64);
        write_png(&input.join("b.png"), 64, 64);

        let processed = tmp.path().join("Processed_Photos");
        let extracted = tmp.path().join("Extracted_Data");
        std::fs::create_dir(&extracted).unwrap();

        encode(&data, false, &input, &processed).unwrap();
        std::fs::remove_file(processed.join("b.png")).unwrap();

        let err = decode(&processed, &extracted).unwrap_err();
        assert!(matches!(err, StegoError::InvalidImageSet(_)));
    }

    #[test]
    fn decode_rejects_duplicate_index() {
        let tmp = tempfile::tempdir().unwrap();
        let data = tmp.path().join("Data_To_Hide");
        std::fs::create_dir(&data).unwrap();
        std::fs::write(data.join("f"), vec![0x01u8; 10]).unwrap();

        let input = tmp.path().join("Input_Photos");
        std::fs::create_dir(&input).unwrap();
        write_png(&input.join("cover.png"), 64, 64);

        let processed = tmp.path().join("Processed_Photos");
        let extracted = tmp.path().join("Extracted_Data");
        std::fs::create_dir(&extracted).unwrap();

        encode(&data, false, &input, &processed).unwrap();
        std::fs::copy(processed.join("cover.png"), processed.join("cover_dup.png")).unwrap();

        let err = decode(&processed, &extracted).unwrap_err();
        assert!(matches!(err, StegoError::InvalidImageSet(_)));
    }

    #[test]
    fn human_readable_size_formats_bytes_and_kilobytes() {
        assert_eq!(human_readable_size(8 * 500), "500 bytes");
        assert_eq!(human_readable_size(8 * 2048), "2 kilobytes");
    }
}
