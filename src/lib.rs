//! Decoding of NOAA HRRR GRIB2 messages.
//!
//! The core is [`decode_message`], a pure function over a borrowed byte
//! buffer: it walks the length-prefixed sections of a single GRIB2
//! message, unpacks the data (DRS templates 5.0 and 5.3), applies the
//! bitmap when present and binds the values to a Lambert conformal conic
//! grid. The resulting [`Field`] answers nearest-neighbour lookups at
//! (latitude, longitude) points.
//!
//! [`HrrrClient`] adds the surrounding plumbing: it resolves a variable
//! against the `.idx` index of an HRRR model run in the NOAA S3 bucket
//! and range-fetches just the bytes of the selected message.

mod client;
mod decoder;
mod error;
mod field;
mod grid;
mod helpers;
mod sections;

pub use crate::{
    client::{find_byte_range, ByteRange, HrrrClient},
    decoder::decode_message,
    error::{DecodeError, FetchError, GribError, ParseError},
    field::Field,
    grid::{normalize_lon, LambertGrid},
    sections::Indicator,
};

#[doc = include_str!("../README.md")]
#[cfg(doctest)]
pub struct ReadmeDoctests;
