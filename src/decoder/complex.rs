use crate::decoder::param::{ComplexPackingParam, MAX_TOTAL};
use crate::decoder::simple::SimplePackingDecodeIterator;
use crate::decoder::stream::BitReader;
use crate::error::DecodeError;
use crate::helpers::grib_int_from_bytes;

/// Unpacks a DRS Template 5.3 (complex packing with spatial differencing)
/// payload.
///
/// `payload` is the section 7 body past the 5-byte header. The stream is
/// consumed in the template's fixed order: extra descriptors, group
/// reference values, group widths, group lengths, grouped data values.
/// Each of the three group vectors ends on a byte boundary (WMO Template
/// 7.3 note 6); skipping those alignments mis-decodes every real HRRR
/// field whose reference bits do not land on a whole byte.
pub(crate) fn unpack_complex_spdiff(
    payload: &[u8],
    param: &ComplexPackingParam,
) -> Result<Vec<f64>, DecodeError> {
    let order = param.spdiff_order;
    let m = usize::from(param.spdiff_extra_octets);

    // Section 5 parsing already rejects these; guard again since the
    // params can be constructed directly.
    if order < 1 || order > 2 {
        return Err(DecodeError::InvalidDifferencingOrder(order));
    }
    if m < 1 || m > 4 {
        return Err(DecodeError::InvalidDescriptorOctets(param.spdiff_extra_octets));
    }
    if param.ngroup < 1 {
        return Err(DecodeError::InvalidGroupCount(param.ngroup));
    }
    let ng = param.ngroup as usize;

    // Extra descriptors: `order` initial values, then the minimum bias
    // added back to every packed value.
    let extra = (usize::from(order) + 1) * m;
    if payload.len() < extra {
        return Err(DecodeError::PayloadTooShort {
            needed: extra,
            actual: payload.len(),
        });
    }
    let mut init_vals = [0i64; 2];
    for (i, slot) in init_vals.iter_mut().take(usize::from(order)).enumerate() {
        *slot = grib_int_from_bytes(&payload[i * m..(i + 1) * m]);
    }
    let y_min = grib_int_from_bytes(&payload[usize::from(order) * m..extra]);

    let mut reader = BitReader::new(&payload[extra..]);

    // Group reference values, ending on a byte boundary.
    let nbit = usize::from(param.simple.nbit);
    let mut grefs = Vec::with_capacity(ng);
    for _ in 0..ng {
        grefs.push(reader.read(nbit)? as i64);
    }
    reader.align();

    // Group widths: per-group delta on top of the reference width. The
    // sum saturates so a 64-bit delta cannot wrap; an oversized width is
    // rejected when the group data is sized and read.
    let mut widths = Vec::with_capacity(ng);
    for _ in 0..ng {
        let delta = reader.read(usize::from(param.group_width_nbit))?;
        widths.push(delta.saturating_add(u64::from(param.group_width_ref)));
    }
    reader.align();

    // Group lengths: the delta for the final group is consumed to keep
    // the cursor in step, but its value is discarded; the DRS header
    // fixes the last group's length.
    let mut lengths: Vec<u64> = Vec::with_capacity(ng);
    for _ in 0..ng - 1 {
        let delta = reader.read(usize::from(param.group_len_nbit))?;
        let len = delta
            .checked_mul(u64::from(param.group_len_inc))
            .and_then(|v| v.checked_add(u64::from(param.group_len_ref)))
            .ok_or(DecodeError::TotalLengthExceedsLimit {
                total: u64::MAX,
                max: MAX_TOTAL,
            })?;
        lengths.push(len);
    }
    reader.read(usize::from(param.group_len_nbit))?;
    lengths.push(u64::from(param.group_len_last));
    reader.align();

    // Validate the total before any allocation sized by it.
    let mut total: u64 = 0;
    for len in &lengths {
        total = total
            .checked_add(*len)
            .ok_or(DecodeError::TotalLengthExceedsLimit {
                total: u64::MAX,
                max: MAX_TOTAL,
            })?;
        if total > MAX_TOTAL {
            return Err(DecodeError::TotalLengthExceedsLimit {
                total,
                max: MAX_TOTAL,
            });
        }
    }
    if total < u64::from(order) {
        return Err(DecodeError::TooFewPointsForDifferencing { order, total });
    }

    // The grouped values must fit in the remaining payload; checking up
    // front avoids allocating `total` slots for a truncated stream.
    let data_start = reader.byte_position();
    let avail_bits = ((payload.len() - extra) - data_start) as u64 * 8;
    let mut needed_bits: u64 = 0;
    for (w, l) in widths.iter().zip(&lengths) {
        needed_bits = needed_bits.saturating_add(w.saturating_mul(*l));
    }
    if needed_bits > avail_bits {
        let needed_bytes = (needed_bits.saturating_add(7) / 8) as usize;
        return Err(DecodeError::PayloadTooShort {
            needed: extra.saturating_add(data_start).saturating_add(needed_bytes),
            actual: payload.len(),
        });
    }

    // Grouped data values. A zero-width group carries no bits: every
    // element is the group reference itself.
    let mut packed: Vec<i64> = Vec::with_capacity(total as usize);
    for g in 0..ng {
        let width = widths[g] as usize;
        let length = lengths[g] as usize;
        if width == 0 {
            packed.extend(std::iter::repeat(grefs[g]).take(length));
        } else {
            for _ in 0..length {
                let v = reader.read(width)?;
                packed.push(grefs[g].wrapping_add(v as i64));
            }
        }
    }

    // Restore the differenced sequence: add the minimum bias, then undo
    // the first or second finite difference. Crafted inputs can reach the
    // i64 range, so the arithmetic wraps instead of aborting.
    for v in packed.iter_mut() {
        *v = v.wrapping_add(y_min);
    }
    let mut undiff = packed;
    match order {
        1 => {
            undiff[0] = init_vals[0];
            for i in 1..undiff.len() {
                undiff[i] = undiff[i].wrapping_add(undiff[i - 1]);
            }
        }
        _ => {
            undiff[0] = init_vals[0];
            undiff[1] = init_vals[1];
            for i in 2..undiff.len() {
                undiff[i] = undiff[i]
                    .wrapping_add(undiff[i - 1].wrapping_mul(2))
                    .wrapping_sub(undiff[i - 2]);
            }
        }
    }

    Ok(SimplePackingDecodeIterator::new(undiff.into_iter(), &param.simple).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::param::SimplePackingParam;

    fn base_param(order: u8) -> ComplexPackingParam {
        ComplexPackingParam {
            simple: SimplePackingParam {
                ref_val: 0.0,
                exp: 0,
                dec: 0,
                nbit: 4,
                num_points: 0,
            },
            ngroup: 1,
            group_width_ref: 4,
            group_width_nbit: 4,
            group_len_ref: 0,
            group_len_inc: 1,
            group_len_last: 3,
            group_len_nbit: 4,
            spdiff_order: order,
            spdiff_extra_octets: 1,
        }
    }

    #[test]
    fn order_1_single_group_roundtrip() {
        // initVals[0]=10, yMin=0; one group, ref 0, width 4, length 3;
        // raw values 0,1,2 reconstruct to 10, 0+1+10=11, 2+11=13.
        let payload = [
            0x0a, 0x00, // initVals[0]=10, yMin=0
            0x00, // gref=0 in 4 bits, aligned
            0x00, // width delta=0 (width 4), aligned
            0x00, // length delta consumed, overridden by the header
            0x01, 0x20, // 0000 0001 0010 xxxx
        ];
        let vals = unpack_complex_spdiff(&payload, &base_param(1)).unwrap();
        assert_eq!(vals, vec![10.0, 11.0, 13.0]);
    }

    #[test]
    fn order_2_single_group_roundtrip() {
        // initVals=[10,12], yMin=-1; raw 0,0,3,1 -> z=[-1,-1,2,0];
        // u2 = 2 + 2*12 - 10 = 16, u3 = 0 + 2*16 - 12 = 20.
        let mut p = base_param(2);
        p.group_len_last = 4;
        let payload = [
            0x0a, 0x0c, 0x81, // initVals[0]=10, initVals[1]=12, yMin=-1
            0x00, // gref
            0x00, // width delta
            0x00, // length delta
            0x00, 0x31, // 0000 0000 0011 0001
        ];
        let vals = unpack_complex_spdiff(&payload, &p).unwrap();
        assert_eq!(vals, vec![10.0, 12.0, 16.0, 20.0]);
    }

    #[test]
    fn group_vectors_align_to_byte_boundaries() {
        // Two groups with 3-bit fields: each of the reference, width and
        // length vectors occupies 6 bits and must be padded to 8 before
        // the next vector starts.
        let p = ComplexPackingParam {
            simple: SimplePackingParam {
                ref_val: 0.0,
                exp: 0,
                dec: 0,
                nbit: 3,
                num_points: 0,
            },
            ngroup: 2,
            group_width_ref: 2,
            group_width_nbit: 3,
            group_len_ref: 2,
            group_len_inc: 1,
            group_len_last: 1,
            group_len_nbit: 3,
            spdiff_order: 1,
            spdiff_extra_octets: 1,
        };
        let payload = [
            0x07, 0x00, // initVals[0]=7, yMin=0
            0x28, // grefs 1, 2 in 3 bits each: 001 010 xx
            0x00, // width deltas 0, 0: widths 2, 2
            0x00, // length delta 0 -> length 2; last delta discarded
            0x6c, // raw 01 10 | 11 -> group0 [1,2], group1 [3]
        ];
        // packed = [1+1, 2+1, 3+2] = [2,3,5]; u = [7, 3+7, 5+10]
        let vals = unpack_complex_spdiff(&payload, &p).unwrap();
        assert_eq!(vals, vec![7.0, 10.0, 15.0]);
    }

    #[test]
    fn scale_factors_apply_after_reconstruction() {
        let mut p = base_param(1);
        p.simple.ref_val = 100.0;
        p.simple.exp = 1;
        p.simple.dec = 1;
        let payload = [0x0a, 0x00, 0x00, 0x00, 0x00, 0x01, 0x20];
        // undiff = [10, 11, 13]; Y = (100 + 2*u) / 10
        let vals = unpack_complex_spdiff(&payload, &p).unwrap();
        assert_eq!(vals, vec![12.0, 12.2, 12.6]);
    }

    #[test]
    fn total_over_limit_is_rejected() {
        let mut p = base_param(2);
        p.simple.nbit = 0;
        p.group_width_nbit = 0;
        p.group_width_ref = 0;
        p.group_len_nbit = 0;
        p.group_len_last = 20_000_000;
        let payload = [0x00, 0x00, 0x00];
        assert!(matches!(
            unpack_complex_spdiff(&payload, &p),
            Err(DecodeError::TotalLengthExceedsLimit { .. })
        ));
    }

    #[test]
    fn order_2_with_too_few_points_is_rejected() {
        for last in [0u32, 1] {
            let mut p = base_param(2);
            p.simple.nbit = 0;
            p.group_width_nbit = 0;
            p.group_width_ref = 0;
            p.group_len_nbit = 0;
            p.group_len_last = last;
            let payload = [0x00, 0x00, 0x00];
            assert!(
                matches!(
                    unpack_complex_spdiff(&payload, &p),
                    Err(DecodeError::TooFewPointsForDifferencing { .. })
                ),
                "last group length {last}"
            );
        }
    }

    #[test]
    fn order_1_with_zero_points_is_rejected() {
        let mut p = base_param(1);
        p.simple.nbit = 0;
        p.group_width_nbit = 0;
        p.group_width_ref = 0;
        p.group_len_nbit = 0;
        p.group_len_last = 0;
        let payload = [0x00, 0x00];
        assert!(unpack_complex_spdiff(&payload, &p).is_err());
    }

    #[test]
    fn truncated_extra_descriptors_are_rejected() {
        // order=2, m=4 needs 12 descriptor bytes.
        let mut p = base_param(2);
        p.spdiff_extra_octets = 4;
        let payload = [0x00, 0x00];
        assert!(matches!(
            unpack_complex_spdiff(&payload, &p),
            Err(DecodeError::PayloadTooShort { .. })
        ));
    }

    #[test]
    fn truncated_group_data_is_rejected() {
        // Valid descriptors and group vectors, but no bytes left for the
        // 3 x 4-bit grouped values.
        let payload = [0x0a, 0x00, 0x00, 0x00, 0x00];
        assert!(matches!(
            unpack_complex_spdiff(&payload, &base_param(1)),
            Err(DecodeError::PayloadTooShort { .. })
        ));
    }

    #[test]
    fn invalid_order_is_rejected() {
        let mut p = base_param(1);
        p.spdiff_order = 3;
        assert_eq!(
            unpack_complex_spdiff(&[0u8; 16], &p),
            Err(DecodeError::InvalidDifferencingOrder(3))
        );
    }

    #[test]
    fn invalid_descriptor_octets_are_rejected() {
        let mut p = base_param(1);
        p.spdiff_extra_octets = 0;
        assert_eq!(
            unpack_complex_spdiff(&[0u8; 16], &p),
            Err(DecodeError::InvalidDescriptorOctets(0))
        );
    }

    #[test]
    fn zero_groups_are_rejected() {
        let mut p = base_param(1);
        p.ngroup = 0;
        assert_eq!(
            unpack_complex_spdiff(&[0u8; 16], &p),
            Err(DecodeError::InvalidGroupCount(0))
        );
    }

    #[test]
    fn maximal_width_delta_is_rejected_without_overflow() {
        // A 64-bit width delta of all ones on top of a 255 reference
        // width must saturate and fail cleanly, not wrap the addition.
        let p = ComplexPackingParam {
            simple: SimplePackingParam {
                ref_val: 0.0,
                exp: 0,
                dec: 0,
                nbit: 4,
                num_points: 0,
            },
            ngroup: 1,
            group_width_ref: 255,
            group_width_nbit: 64,
            group_len_ref: 0,
            group_len_inc: 1,
            group_len_last: 1,
            group_len_nbit: 4,
            spdiff_order: 1,
            spdiff_extra_octets: 1,
        };
        let payload = [
            0x00, 0x00, // initVals[0]=0, yMin=0
            0x00, // gref=0 in 4 bits, aligned
            0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, // width delta = u64::MAX
            0x00, // length delta consumed, overridden by the header
        ];
        assert!(matches!(
            unpack_complex_spdiff(&payload, &p),
            Err(DecodeError::PayloadTooShort { .. })
        ));
    }

    #[test]
    fn zero_width_group_repeats_reference() {
        // One group, width 0, length 3, gref 5: every packed value is 5.
        // With order 1 and initVals[0]=5, z=[5,5,5] reconstructs to
        // [5, 10, 15].
        let p = ComplexPackingParam {
            simple: SimplePackingParam {
                ref_val: 0.0,
                exp: 0,
                dec: 0,
                nbit: 4,
                num_points: 0,
            },
            ngroup: 1,
            group_width_ref: 0,
            group_width_nbit: 4,
            group_len_ref: 0,
            group_len_inc: 1,
            group_len_last: 3,
            group_len_nbit: 4,
            spdiff_order: 1,
            spdiff_extra_octets: 1,
        };
        let payload = [
            0x05, 0x00, // initVals[0]=5, yMin=0
            0x50, // gref=5 in 4 bits
            0x00, // width delta 0 -> width 0
            0x00, // length delta
        ];
        let vals = unpack_complex_spdiff(&payload, &p).unwrap();
        assert_eq!(vals, vec![5.0, 10.0, 15.0]);
    }
}
