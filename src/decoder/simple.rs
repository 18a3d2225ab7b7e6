use num::ToPrimitive;

use crate::decoder::param::SimplePackingParam;
use crate::decoder::stream::BitReader;
use crate::error::DecodeError;

/// Unpacks a DRS Template 5.0 (simple packing) payload.
///
/// `payload` is the section 7 body past the 5-byte header: `num_points`
/// consecutive unsigned integers of `nbit` width, packed MSB-first.
pub(crate) fn unpack_simple(
    payload: &[u8],
    param: &SimplePackingParam,
) -> Result<Vec<f64>, DecodeError> {
    // Based on the behaviour of wgrib2: a zero bit width means a constant
    // field where every grid point carries the reference value.
    if param.nbit == 0 {
        return Ok(vec![param.zero_bit_value(); param.num_points]);
    }

    let mut reader = BitReader::new(payload);
    let mut raw = Vec::with_capacity(param.num_points);
    for _ in 0..param.num_points {
        raw.push(reader.read(usize::from(param.nbit))?);
    }
    Ok(SimplePackingDecodeIterator::new(raw.into_iter(), param).collect())
}

/// Applies the GRIB2 de-scaling formula Y = (R + 2^E * X) / 10^D to a
/// stream of packed integers. Shared by the simple and complex unpackers.
///
/// The powers are precomputed with integer-exponent routines so small
/// scale factors stay exact.
pub(crate) struct SimplePackingDecodeIterator<I> {
    iter: I,
    ref_val: f64,
    exp2: f64,
    dec10: f64,
}

impl<I> SimplePackingDecodeIterator<I> {
    pub(crate) fn new(iter: I, param: &SimplePackingParam) -> Self {
        Self {
            iter,
            ref_val: f64::from(param.ref_val),
            exp2: 2f64.powi(i32::from(param.exp)),
            dec10: 10f64.powi(i32::from(param.dec)),
        }
    }
}

impl<I: Iterator<Item = N>, N: ToPrimitive> Iterator for SimplePackingDecodeIterator<I> {
    type Item = f64;

    fn next(&mut self) -> Option<Self::Item> {
        let encoded = self.iter.next()?.to_f64()?;
        Some((self.ref_val + self.exp2 * encoded) / self.dec10)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}
