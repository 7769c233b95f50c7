//! Range encoding of bounded values.
//!
//! A value known to lie in `[min, max]` is written as its unsigned offset from `min`, using
//! exactly [bits_required]`(max - min)` bits. Readers must be given the same bounds the writer used.
//!
//! Floats have two paths: [write_float] passes the IEEE-754 bit pattern through untouched,
//! while [write_compressed_float] quantizes the value to a caller-chosen resolution.

use crate::{
    bits::{Reader, Writer, WORD_BITS},
    Error,
};
use bytes::Buf;

/// Returns the number of bits needed to represent the unsigned magnitude `n`.
///
/// `0` needs no bits at all.
#[inline]
pub const fn bits_required(n: u32) -> u32 {
    u32::BITS - n.leading_zeros()
}

// Bit widths handed to the stream are derived from validated bounds, so a rejected width is a
// bug in this module rather than bad input.
fn put(writer: &mut Writer, value: u32, bits: u32) -> Result<(), Error> {
    match writer.write(value, bits) {
        Err(Error::InvalidBitRange(bits)) => panic!("range codec computed bit width {bits}"),
        result => result,
    }
}

fn take<B: Buf>(reader: &mut Reader<B>, bits: u32) -> Result<u32, Error> {
    match reader.read(bits) {
        Err(Error::InvalidBitRange(bits)) => panic!("range codec computed bit width {bits}"),
        result => result,
    }
}

fn check_bounds(min: i32, max: i32) -> Result<u32, Error> {
    if min >= max {
        return Err(Error::InvalidArgument(format!("min={min}, max={max}")));
    }
    Ok(max.abs_diff(min))
}

/// Writes `value` as an offset within `[min, max]`, where `min < max`.
pub fn write_integer(writer: &mut Writer, value: i32, min: i32, max: i32) -> Result<(), Error> {
    if min >= max || value < min || value > max {
        return Err(Error::InvalidArgument(format!(
            "value={value}, min={min}, max={max}"
        )));
    }
    let span = max.abs_diff(min);
    put(writer, value.abs_diff(min), bits_required(span))
}

/// Reads a value written by [write_integer] with the same bounds.
pub fn read_integer<B: Buf>(reader: &mut Reader<B>, min: i32, max: i32) -> Result<i32, Error> {
    let span = check_bounds(min, max)?;
    let offset = take(reader, bits_required(span))?;
    if offset > span {
        return Err(Error::InvalidData(format!(
            "offset {offset} exceeds span of [{min}, {max}]"
        )));
    }
    Ok(min.wrapping_add_unsigned(offset))
}

/// Writes the raw IEEE-754 bit pattern of `value`.
pub fn write_float(writer: &mut Writer, value: f32) -> Result<(), Error> {
    put(writer, value.to_bits(), WORD_BITS)
}

/// Reads a value written by [write_float]. `NaN` payloads are preserved bit for bit.
pub fn read_float<B: Buf>(reader: &mut Reader<B>) -> Result<f32, Error> {
    take(reader, WORD_BITS).map(f32::from_bits)
}

/// Quantization parameters shared by [write_compressed_float] and [read_compressed_float].
#[derive(Clone, Copy, Debug)]
struct Quantizer {
    min: f64,
    span: f64,
    steps: f64,
    bits: u32,
}

impl Quantizer {
    fn new(min: f32, max: f32, resolution: f32) -> Result<Self, Error> {
        // Written as a negation so that NaN bounds are rejected too.
        if !(min < max) || !min.is_finite() || !max.is_finite() {
            return Err(Error::InvalidArgument(format!("min={min}, max={max}")));
        }
        if !(resolution > 0.0) || !resolution.is_finite() {
            return Err(Error::InvalidArgument(format!("resolution={resolution}")));
        }

        let span = f64::from(max) - f64::from(min);
        let steps = (span / f64::from(resolution)).ceil();
        if steps > f64::from(u32::MAX) {
            return Err(Error::InvalidArgument(format!(
                "{steps} quanta in [{min}, {max}] at resolution {resolution}"
            )));
        }

        Ok(Self {
            min: f64::from(min),
            span,
            steps,
            bits: bits_required(steps as u32),
        })
    }
}

/// Writes `value` quantized to `resolution` within `[min, max]`.
///
/// Values outside the bounds are clamped to the nearest bound. The value read back differs from
/// the one written by at most `resolution / 2`, plus floating-point rounding.
pub fn write_compressed_float(
    writer: &mut Writer,
    value: f32,
    min: f32,
    max: f32,
    resolution: f32,
) -> Result<(), Error> {
    let quantizer = Quantizer::new(min, max, resolution)?;
    if value.is_nan() {
        return Err(Error::InvalidArgument("value=NaN".into()));
    }

    let normalized = ((f64::from(value) - quantizer.min) / quantizer.span).clamp(0.0, 1.0);
    let quantum = (normalized * quantizer.steps).round() as u32;
    put(writer, quantum, quantizer.bits)
}

/// Reads a value written by [write_compressed_float] with the same parameters.
pub fn read_compressed_float<B: Buf>(
    reader: &mut Reader<B>,
    min: f32,
    max: f32,
    resolution: f32,
) -> Result<f32, Error> {
    let quantizer = Quantizer::new(min, max, resolution)?;
    let quantum = take(reader, quantizer.bits)?;
    if f64::from(quantum) > quantizer.steps {
        return Err(Error::InvalidData(format!(
            "quantum {quantum} exceeds {} steps",
            quantizer.steps
        )));
    }

    let normalized = f64::from(quantum) / quantizer.steps;
    Ok((normalized * quantizer.span + quantizer.min) as f32)
}
