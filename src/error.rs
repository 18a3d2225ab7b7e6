use std::error::Error;
use std::fmt::{self, Display, Formatter};

/// Top-level error type returned by the decoder and the fetch client.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GribError {
    ParseError(ParseError),
    DecodeError(DecodeError),
    FetchError(FetchError),
}

impl Error for GribError {}

impl From<ParseError> for GribError {
    fn from(e: ParseError) -> Self {
        Self::ParseError(e)
    }
}

impl From<DecodeError> for GribError {
    fn from(e: DecodeError) -> Self {
        Self::DecodeError(e)
    }
}

impl From<FetchError> for GribError {
    fn from(e: FetchError) -> Self {
        Self::FetchError(e)
    }
}

impl Display for GribError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::ParseError(e) => write!(f, "{e}"),
            Self::DecodeError(e) => write!(f, "{e}"),
            Self::FetchError(e) => write!(f, "{e}"),
        }
    }
}

/// Errors raised while locating and parsing the sections of a message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParseError {
    NotGrib,
    GribVersionMismatch(u8),
    MessageTooShort(usize),
    TotalLengthMismatch { total_length: u64, buffer: usize },
    UnexpectedEndOfData(usize),
    SectionOverrun { section: u8, offset: usize, length: u32 },
    SectionTooShort { section: u8, length: usize },
    UnsupportedGridTemplate(u16),
    UnsupportedDrsTemplate(u16),
    UnsupportedScanMode(u8),
    UnsupportedBitmapIndicator(u8),
    UnsupportedSpatialDifferencingOrder(u8),
    UnsupportedExtraDescriptorOctets(u8),
    MissingSection(u8),
    LimitExceeded { field: &'static str, value: u64, max: u64 },
}

impl Error for ParseError {}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::NotGrib => write!(f, "missing GRIB magic"),
            Self::GribVersionMismatch(v) => write!(f, "not GRIB edition 2: {v}"),
            Self::MessageTooShort(n) => write!(f, "message too short: {n} bytes"),
            Self::TotalLengthMismatch {
                total_length,
                buffer,
            } => write!(
                f,
                "section 0: total length {total_length} exceeds buffer of {buffer} bytes"
            ),
            Self::UnexpectedEndOfData(pos) => write!(f, "unexpected end of data at {pos}"),
            Self::SectionOverrun {
                section,
                offset,
                length,
            } => write!(
                f,
                "section {section} at {offset}: length {length} overruns the buffer"
            ),
            Self::SectionTooShort { section, length } => {
                write!(f, "section {section}: too short ({length} bytes)")
            }
            Self::UnsupportedGridTemplate(t) => {
                write!(f, "unsupported grid definition template 3.{t}")
            }
            Self::UnsupportedDrsTemplate(t) => {
                write!(f, "unsupported data representation template 5.{t}")
            }
            Self::UnsupportedScanMode(m) => write!(
                f,
                "section 3: unsupported scan mode 0x{m:02X} (only 0x40 supported)"
            ),
            Self::UnsupportedBitmapIndicator(i) => {
                write!(f, "section 6: unsupported bitmap indicator {i}")
            }
            Self::UnsupportedSpatialDifferencingOrder(o) => {
                write!(f, "section 5: unsupported spatial differencing order {o}")
            }
            Self::UnsupportedExtraDescriptorOctets(m) => {
                write!(f, "section 5: unsupported extra descriptor octet count {m}")
            }
            Self::MissingSection(n) => write!(f, "no section {n} found in message"),
            Self::LimitExceeded { field, value, max } => {
                write!(f, "{field} = {value} exceeds maximum {max}")
            }
        }
    }
}

/// Errors raised while unpacking section 7 data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DecodeError {
    BitReadOverflow { pos: usize, nbits: usize, buf_len: usize },
    BitWidthTooLarge(usize),
    PayloadTooShort { needed: usize, actual: usize },
    InvalidGroupCount(u32),
    InvalidDifferencingOrder(u8),
    InvalidDescriptorOctets(u8),
    TotalLengthExceedsLimit { total: u64, max: u64 },
    TooFewPointsForDifferencing { order: u8, total: u64 },
    BitmapLengthMismatch { set_bits: usize, values: usize },
    GridLengthMismatch { expected: u64, actual: usize },
}

impl Error for DecodeError {}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::BitReadOverflow {
                pos,
                nbits,
                buf_len,
            } => write!(
                f,
                "bit read of {nbits} bits at bit {pos} overflows buffer of {buf_len} bytes"
            ),
            Self::BitWidthTooLarge(n) => write!(f, "bit width {n} exceeds 64"),
            Self::PayloadTooShort { needed, actual } => {
                write!(f, "data payload too short: need {needed} bytes, have {actual}")
            }
            Self::InvalidGroupCount(n) => {
                write!(f, "group count {n} is invalid (must be at least 1)")
            }
            Self::InvalidDifferencingOrder(o) => {
                write!(f, "spatial differencing order {o} is invalid (must be 1 or 2)")
            }
            Self::InvalidDescriptorOctets(m) => {
                write!(f, "extra descriptor octet count {m} is invalid (must be 1 to 4)")
            }
            Self::TotalLengthExceedsLimit { total, max } => {
                write!(f, "total point count {total} exceeds maximum {max}")
            }
            Self::TooFewPointsForDifferencing { order, total } => write!(
                f,
                "order-{order} spatial differencing requires at least {order} points, got {total}"
            ),
            Self::BitmapLengthMismatch { set_bits, values } => {
                write!(f, "bitmap has {set_bits} set bits but {values} packed values")
            }
            Self::GridLengthMismatch { expected, actual } => {
                write!(f, "decoded {actual} values, expected {expected}")
            }
        }
    }
}

/// Errors raised by the HTTP fetch client and the index selector.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FetchError {
    Request(String),
    HttpStatus { status: u16, url: String },
    BodyTooLarge { limit: usize, url: String },
    VariableNotFound(String),
}

impl Error for FetchError {}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Request(s) => write!(f, "request failed: {s}"),
            Self::HttpStatus { status, url } => write!(f, "HTTP {status} fetching {url}"),
            Self::BodyTooLarge { limit, url } => {
                write!(f, "response body for {url} exceeds {limit} bytes")
            }
            Self::VariableNotFound(v) => write!(f, "variable {v:?} not found in index"),
        }
    }
}
