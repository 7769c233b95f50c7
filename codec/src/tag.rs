//! Per-field annotations.
//!
//! A field opts into the wire format by carrying a [Tag]: its ordering number (the field's
//! wire identity within one composite) plus optional modifiers. Tags can be built directly or
//! parsed from the annotation grammar:
//!
//! ```text
//! annotation = ordering *( "," modifier )
//! modifier   = "min=" int32 / "max=" int32 / "res=" float
//! ```
//!
//! ```
//! use packwire_codec::tag::{parse, Tag};
//!
//! let tag = parse("7,min=-10,max=10").unwrap().unwrap();
//! assert_eq!(tag, Tag::new(7).min(-10).max(10));
//!
//! // No annotation means the field is not serialized.
//! assert_eq!(parse("").unwrap(), None);
//! ```

use crate::Error;

/// Smallest accepted ordering number.
pub const MIN_ORDERING: i32 = 0;

/// Largest accepted ordering number. Ordering tokens are therefore 24 bits wide.
pub const MAX_ORDERING: i32 = (1 << 24) - 1;

/// Typed annotation of a serialized field.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tag {
    /// Wire identity of the field, unique within its composite.
    pub ordering: i32,
    /// Lower bound override. Integer fields default to `i32::MIN`.
    pub min: Option<i64>,
    /// Upper bound override. Integer fields default to `i32::MAX`.
    pub max: Option<i64>,
    /// Quantization step. When set on a float field, the field is encoded as a compressed
    /// float over `[min, max]`.
    pub resolution: Option<f32>,
}

impl Tag {
    /// Creates a tag with no modifiers.
    pub const fn new(ordering: i32) -> Self {
        Self {
            ordering,
            min: None,
            max: None,
            resolution: None,
        }
    }

    /// Sets the lower bound.
    pub fn min(mut self, min: i64) -> Self {
        self.min = Some(min);
        self
    }

    /// Sets the upper bound.
    pub fn max(mut self, max: i64) -> Self {
        self.max = Some(max);
        self
    }

    /// Sets the quantization step.
    pub fn resolution(mut self, resolution: f32) -> Self {
        self.resolution = Some(resolution);
        self
    }

    /// Checks that the ordering number lies in `[MIN_ORDERING, MAX_ORDERING]`.
    pub fn validate(&self) -> Result<(), Error> {
        if !(MIN_ORDERING..=MAX_ORDERING).contains(&self.ordering) {
            return Err(Error::OutOfRangeOrdering(self.ordering));
        }
        Ok(())
    }

    /// Returns the integer bounds, defaulting to the full `i32` range.
    pub fn int_bounds(&self) -> Result<(i32, i32), Error> {
        let narrow = |bound: i64| {
            i32::try_from(bound)
                .map_err(|_| Error::InvalidArgument(format!("bound {bound} does not fit in i32")))
        };
        let min = self.min.map(narrow).transpose()?.unwrap_or(i32::MIN);
        let max = self.max.map(narrow).transpose()?.unwrap_or(i32::MAX);
        Ok((min, max))
    }

    /// Returns `(min, max, resolution)` if this tag selects compressed float encoding.
    pub fn compressed_float(&self) -> Result<Option<(f32, f32, f32)>, Error> {
        let Some(resolution) = self.resolution else {
            return Ok(None);
        };
        match (self.min, self.max) {
            (Some(min), Some(max)) => Ok(Some((min as f32, max as f32, resolution))),
            _ => Err(Error::InvalidTagFormat(format!(
                "ordering={}: res requires both min and max",
                self.ordering
            ))),
        }
    }
}

/// Parses an annotation into a [Tag].
///
/// Returns `Ok(None)` for an empty annotation: the field is excluded from the wire format.
/// Unrecognized modifiers are ignored.
pub fn parse(annotation: &str) -> Result<Option<Tag>, Error> {
    if annotation.is_empty() {
        return Ok(None);
    }

    let mut tokens = annotation.split(',').map(str::trim);
    let first = tokens.next().unwrap_or_default();
    let ordering: i32 = first.parse().map_err(|_| {
        Error::InvalidTagFormat(format!(
            "ordering number must be the first token, found {first:?}"
        ))
    })?;

    let mut tag = Tag::new(ordering);
    tag.validate()?;

    for token in tokens {
        let Some((key, value)) = token.split_once('=') else {
            continue;
        };
        match key {
            "min" => set_once(&mut tag.min, parse_bound(token, value)?, token)?,
            "max" => set_once(&mut tag.max, parse_bound(token, value)?, token)?,
            "res" => set_once(&mut tag.resolution, parse_resolution(token, value)?, token)?,
            _ => continue,
        }
    }

    Ok(Some(tag))
}

fn parse_bound(token: &str, value: &str) -> Result<i64, Error> {
    if value.is_empty() {
        return Err(Error::InvalidTagFormat(format!("{token}: missing value")));
    }
    value
        .parse::<i32>()
        .map(i64::from)
        .map_err(|_| Error::InvalidTagFormat(format!("{token}: value must be an i32")))
}

fn parse_resolution(token: &str, value: &str) -> Result<f32, Error> {
    match value.parse::<f32>() {
        Ok(resolution) if resolution.is_finite() && resolution > 0.0 => Ok(resolution),
        _ => Err(Error::InvalidTagFormat(format!(
            "{token}: value must be a positive number"
        ))),
    }
}

fn set_once<T>(slot: &mut Option<T>, value: T, token: &str) -> Result<(), Error> {
    if slot.is_some() {
        return Err(Error::InvalidTagFormat(format!("{token}: modifier repeated")));
    }
    *slot = Some(value);
    Ok(())
}
