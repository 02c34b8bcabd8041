//! Placeholder MP4 artifact.
//!
//! When generation fails the job still completes with a structurally valid,
//! zero-duration ISO-BMFF file: `ftyp` + `moov`(`mvhd`) + empty `mdat`.

const MVHD_SIZE: u32 = 108;
const TIMESCALE: u32 = 1000;

fn push_box_header(buf: &mut Vec<u8>, size: u32, kind: &[u8; 4]) {
    buf.extend_from_slice(&size.to_be_bytes());
    buf.extend_from_slice(kind);
}

fn ftyp() -> Vec<u8> {
    let brands: [&[u8; 4]; 3] = [b"isom", b"iso2", b"mp41"];
    let size = 8 + 4 + 4 + 4 * brands.len() as u32;

    let mut buf = Vec::with_capacity(size as usize);
    push_box_header(&mut buf, size, b"ftyp");
    buf.extend_from_slice(b"isom");
    buf.extend_from_slice(&0x200u32.to_be_bytes());
    for brand in brands {
        buf.extend_from_slice(brand);
    }
    buf
}

fn mvhd() -> Vec<u8> {
    let mut buf = Vec::with_capacity(MVHD_SIZE as usize);
    push_box_header(&mut buf, MVHD_SIZE, b"mvhd");
    buf.extend_from_slice(&[0, 0, 0, 0]); // version 0, flags
    buf.extend_from_slice(&0u32.to_be_bytes()); // creation_time
    buf.extend_from_slice(&0u32.to_be_bytes()); // modification_time
    buf.extend_from_slice(&TIMESCALE.to_be_bytes());
    buf.extend_from_slice(&0u32.to_be_bytes()); // duration
    buf.extend_from_slice(&0x0001_0000u32.to_be_bytes()); // rate 1.0
    buf.extend_from_slice(&0x0100u16.to_be_bytes()); // volume 1.0
    buf.extend_from_slice(&[0; 2 + 8]); // reserved

    // Unity matrix
    #[rustfmt::skip]
    let matrix: [u32; 9] = [
        0x0001_0000, 0, 0,
        0, 0x0001_0000, 0,
        0, 0, 0x4000_0000,
    ];
    for value in matrix {
        buf.extend_from_slice(&value.to_be_bytes());
    }

    buf.extend_from_slice(&[0; 24]); // pre_defined
    buf.extend_from_slice(&1u32.to_be_bytes()); // next_track_ID
    buf
}

/// Bytes of the placeholder MP4.
pub fn placeholder_mp4() -> Vec<u8> {
    let mvhd = mvhd();
    let mut out = ftyp();

    push_box_header(&mut out, 8 + mvhd.len() as u32, b"moov");
    out.extend_from_slice(&mvhd);

    push_box_header(&mut out, 8, b"mdat");
    out
}

/// Shallow ISO-BMFF check: top-level boxes tile the buffer exactly, the
/// first is `ftyp` and a `moov` is present.
pub fn is_valid_mp4(bytes: &[u8]) -> bool {
    let mut offset = 0usize;
    let mut first = true;
    let mut has_moov = false;

    while offset < bytes.len() {
        let Some(header) = bytes.get(offset..offset + 8) else {
            return false;
        };
        let size = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let kind = &header[4..8];

        let size = match size {
            0 => bytes.len() - offset,
            1 => {
                let Some(large) = bytes.get(offset + 8..offset + 16) else {
                    return false;
                };
                let mut raw = [0u8; 8];
                raw.copy_from_slice(large);
                match usize::try_from(u64::from_be_bytes(raw)) {
                    Ok(size) if size >= 16 => size,
                    _ => return false,
                }
            }
            s if s < 8 => return false,
            s => s,
        };

        if first && kind != b"ftyp" {
            return false;
        }
        if kind == b"moov" {
            has_moov = true;
        }

        first = false;
        offset = match offset.checked_add(size) {
            Some(next) if next <= bytes.len() => next,
            _ => return false,
        };
    }

    !first && has_moov
}
