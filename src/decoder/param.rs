use crate::error::ParseError;
use crate::helpers::{read_as, GribInt};

/// Maximum number of groups in a DRS 5.3 message. Real HRRR fields carry
/// a few thousand groups; anything near this bound is a crafted input.
pub(crate) const MAX_NG: u64 = 1 << 22;

/// Maximum number of decoded values from a single message. HRRR CONUS is
/// 1799 x 1059 (about 1.9M points).
pub(crate) const MAX_TOTAL: u64 = 10_000_000;

/// Maximum bit width of any per-value or per-group field. Wider values
/// cannot fit the u64 accumulator and never occur in real data.
pub(crate) const MAX_BIT_WIDTH: u8 = 64;

/// Parameters of DRS Template 5.0 (grid point data, simple packing).
///
/// Also embedded in [`ComplexPackingParam`], which shares the reference
/// value and scale factors.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SimplePackingParam {
    pub(crate) ref_val: f32,
    pub(crate) exp: i16,
    pub(crate) dec: i16,
    pub(crate) nbit: u8,
    pub(crate) num_points: usize,
}

impl SimplePackingParam {
    pub(crate) fn from_sect5(sec: &[u8]) -> Result<Self, ParseError> {
        if sec.len() < 21 {
            return Err(ParseError::SectionTooShort {
                section: 5,
                length: sec.len(),
            });
        }

        let num_points = read_as!(u32, sec, 5);
        if u64::from(num_points) > MAX_TOTAL {
            return Err(ParseError::LimitExceeded {
                field: "number of encoded points",
                value: u64::from(num_points),
                max: MAX_TOTAL,
            });
        }

        let ref_val = read_as!(f32, sec, 11);
        let exp = read_as!(u16, sec, 15).as_grib_int();
        let dec = read_as!(u16, sec, 17).as_grib_int();
        let nbit = sec[19];
        if nbit > MAX_BIT_WIDTH {
            return Err(ParseError::LimitExceeded {
                field: "bits per value",
                value: u64::from(nbit),
                max: u64::from(MAX_BIT_WIDTH),
            });
        }

        Ok(Self {
            ref_val,
            exp,
            dec,
            nbit,
            num_points: num_points as usize,
        })
    }

    /// Data value used for every grid point when the bit width is zero.
    pub(crate) fn zero_bit_value(&self) -> f64 {
        f64::from(self.ref_val) / 10f64.powi(i32::from(self.dec))
    }
}

/// Parameters of DRS Template 5.3 (complex packing with spatial
/// differencing).
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ComplexPackingParam {
    pub(crate) simple: SimplePackingParam,
    pub(crate) ngroup: u32,
    pub(crate) group_width_ref: u8,
    pub(crate) group_width_nbit: u8,
    pub(crate) group_len_ref: u32,
    pub(crate) group_len_inc: u8,
    pub(crate) group_len_last: u32,
    pub(crate) group_len_nbit: u8,
    pub(crate) spdiff_order: u8,
    pub(crate) spdiff_extra_octets: u8,
}

impl ComplexPackingParam {
    pub(crate) fn from_sect5(sec: &[u8]) -> Result<Self, ParseError> {
        if sec.len() < 49 {
            return Err(ParseError::SectionTooShort {
                section: 5,
                length: sec.len(),
            });
        }
        let simple = SimplePackingParam::from_sect5(sec)?;

        let ngroup = read_as!(u32, sec, 31);
        if u64::from(ngroup) < 1 || u64::from(ngroup) > MAX_NG {
            return Err(ParseError::LimitExceeded {
                field: "number of groups",
                value: u64::from(ngroup),
                max: MAX_NG,
            });
        }

        let group_width_ref = sec[35];
        let group_width_nbit = sec[36];
        let group_len_ref = read_as!(u32, sec, 37);
        let group_len_inc = sec[41];
        let group_len_last = read_as!(u32, sec, 42);
        let group_len_nbit = sec[46];
        let spdiff_order = sec[47];
        let spdiff_extra_octets = sec[48];

        if group_width_nbit > MAX_BIT_WIDTH {
            return Err(ParseError::LimitExceeded {
                field: "bits per group width",
                value: u64::from(group_width_nbit),
                max: u64::from(MAX_BIT_WIDTH),
            });
        }
        if group_len_nbit > MAX_BIT_WIDTH {
            return Err(ParseError::LimitExceeded {
                field: "bits per group length",
                value: u64::from(group_len_nbit),
                max: u64::from(MAX_BIT_WIDTH),
            });
        }
        if u64::from(group_len_last) > MAX_TOTAL {
            return Err(ParseError::LimitExceeded {
                field: "length of last group",
                value: u64::from(group_len_last),
                max: MAX_TOTAL,
            });
        }
        if spdiff_order < 1 || spdiff_order > 2 {
            return Err(ParseError::UnsupportedSpatialDifferencingOrder(spdiff_order));
        }
        if spdiff_extra_octets < 1 || spdiff_extra_octets > 4 {
            return Err(ParseError::UnsupportedExtraDescriptorOctets(
                spdiff_extra_octets,
            ));
        }

        Ok(Self {
            simple,
            ngroup,
            group_width_ref,
            group_width_nbit,
            group_len_ref,
            group_len_inc,
            group_len_last,
            group_len_nbit,
            spdiff_order,
            spdiff_extra_octets,
        })
    }
}

/// Parsed section 5, dispatched on the data representation template.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DrsParam {
    Simple(SimplePackingParam),
    ComplexSpatialDiff(ComplexPackingParam),
}

impl DrsParam {
    pub(crate) fn from_sect5(sec: &[u8]) -> Result<Self, ParseError> {
        if sec.len() < 11 {
            return Err(ParseError::SectionTooShort {
                section: 5,
                length: sec.len(),
            });
        }
        let template = read_as!(u16, sec, 9);
        match template {
            0 => Ok(Self::Simple(SimplePackingParam::from_sect5(sec)?)),
            3 => Ok(Self::ComplexSpatialDiff(ComplexPackingParam::from_sect5(
                sec,
            )?)),
            t => Err(ParseError::UnsupportedDrsTemplate(t)),
        }
    }
}
