mod bitmap;
mod complex;
mod param;
mod simple;
mod stream;

use crate::decoder::bitmap::expand_bitmap;
use crate::decoder::complex::unpack_complex_spdiff;
use crate::decoder::param::DrsParam;
use crate::decoder::simple::unpack_simple;
use crate::error::{DecodeError, GribError, ParseError};
use crate::field::Field;
use crate::grid::LambertGrid;
use crate::sections::{parse_sect6, Indicator, SectionIter, SECT0_SIZE};

/// Decodes a raw GRIB2 message (all sections) into a [`Field`].
///
/// The walker accepts sections in the order they appear; sections 1, 2
/// and 4 are skipped since the query path does not need them. Sections 3,
/// 5 and 7 must all be present once the "7777" end marker is reached.
pub fn decode_message(buf: &[u8]) -> Result<Field, GribError> {
    Indicator::from_buf(buf)?;

    let mut grid: Option<LambertGrid> = None;
    let mut drs: Option<DrsParam> = None;
    let mut bitmap: Option<&[u8]> = None;
    let mut sect7_payload: Option<&[u8]> = None;

    // The walker reports a buffer that runs out before the "7777" end
    // marker as an error, so a completed loop means a terminated message.
    for sect in SectionIter::new(buf, SECT0_SIZE) {
        let sect = sect?;
        match sect.number {
            1 | 2 | 4 => {}
            3 => grid = Some(LambertGrid::from_sect3(sect.body)?),
            5 => drs = Some(DrsParam::from_sect5(sect.body)?),
            6 => bitmap = parse_sect6(sect.body)?,
            // The walker guarantees at least the 5-byte header, so the
            // payload slice below cannot underflow.
            7 => sect7_payload = Some(&sect.body[5..]),
            _ => {}
        }
    }

    let grid = grid.ok_or(ParseError::MissingSection(3))?;
    let drs = drs.ok_or(ParseError::MissingSection(5))?;
    let payload = sect7_payload.ok_or(ParseError::MissingSection(7))?;

    let values = match &drs {
        DrsParam::Simple(param) => unpack_simple(payload, param)?,
        DrsParam::ComplexSpatialDiff(param) => unpack_complex_spdiff(payload, param)?,
    };

    // A bitmap means the unpacker produced one value per set bit; expand
    // to the full grid with NaN at the masked positions.
    let values = match bitmap {
        Some(bits) => expand_bitmap(values, bits, grid.num_points() as usize)?,
        None => values,
    };

    let expected = grid.num_points();
    if values.len() as u64 != expected {
        return Err(DecodeError::GridLengthMismatch {
            expected,
            actual: values.len(),
        }
        .into());
    }

    Ok(Field::new(grid, values))
}
