use crate::error::DecodeError;

/// Expands packed values (one per set bitmap bit) to the full grid.
/// Positions whose bitmap bit is clear are filled with quiet NaN.
///
/// GRIB2 bitmaps are MSB-first: bit 7 of byte 0 is grid point 0.
pub(crate) fn expand_bitmap(
    values: Vec<f64>,
    bitmap: &[u8],
    num_points: usize,
) -> Result<Vec<f64>, DecodeError> {
    let set_bits = (0..num_points).filter(|k| bit_is_set(bitmap, *k)).count();
    if set_bits != values.len() {
        return Err(DecodeError::BitmapLengthMismatch {
            set_bits,
            values: values.len(),
        });
    }

    let mut out = Vec::with_capacity(num_points);
    let mut packed = values.into_iter();
    for k in 0..num_points {
        if bit_is_set(bitmap, k) {
            out.push(packed.next().unwrap_or(f64::NAN));
        } else {
            out.push(f64::NAN);
        }
    }
    Ok(out)
}

/// Whether grid point `k` has data in the MSB-first bitmap. Points past
/// the end of the bitmap bytes count as missing.
fn bit_is_set(bitmap: &[u8], k: usize) -> bool {
    match bitmap.get(k / 8) {
        Some(byte) => (byte >> (7 - (k % 8))) & 1 == 1,
        None => false,
    }
}
