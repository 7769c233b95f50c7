//! Tag-ordered walking of composite values.
//!
//! A composite exposes a table of [Field]s through [Composite::fields]. Each tagged field is
//! written as an ordering token (range-encoded over `[MIN_ORDERING, MAX_ORDERING]`) followed by
//! its payload, so the wire layout is independent of declaration order. Decoding reads one token
//! per tagged field of the destination type and dispatches on it.
//!
//! The field table is rebuilt on every call. Callers encoding the same type in a hot loop should
//! keep `fields()` cheap (the [composite!] macro only builds a `Vec` of function pointers).
//!
//! # Example
//!
//! ```
//! use packwire_codec::{composite, decode, encode};
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Position {
//!     x: i32,
//!     y: i32,
//! }
//!
//! composite! {
//!     Position {
//!         x => "1,min=-512,max=511",
//!         y => "2,min=-512,max=511",
//!     }
//! }
//!
//! let position = Position { x: -3, y: 400 };
//! let bytes = encode(&position).unwrap();
//! // Two 24-bit ordering tokens and two 10-bit payloads fill three words.
//! assert_eq!(bytes.len(), 12);
//!
//! let mut decoded = Position::default();
//! decode(bytes, &mut decoded).unwrap();
//! assert_eq!(decoded, position);
//! ```

use crate::{
    bits::{Reader, Writer},
    range,
    tag::{self, Tag, MAX_ORDERING, MIN_ORDERING},
    Error,
};
use bytes::Buf;
use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

/// Borrowed view of a value, used when encoding.
pub enum ValueRef<'a> {
    Int32(i32),
    Float32(f32),
    Composite(&'a dyn Walk),
    Unsupported(&'static str),
}

/// Mutable view of a value, used when decoding.
pub enum ValueMut<'a> {
    Int32(&'a mut i32),
    Float32(&'a mut f32),
    Composite(&'a mut dyn Walk),
    Unsupported(&'static str),
}

/// Trait for types that can appear on the wire, either at the top level or as a field.
pub trait Value {
    fn value_ref(&self) -> ValueRef<'_>;

    fn value_mut(&mut self) -> ValueMut<'_>;
}

impl Value for i32 {
    #[inline]
    fn value_ref(&self) -> ValueRef<'_> {
        ValueRef::Int32(*self)
    }

    #[inline]
    fn value_mut(&mut self) -> ValueMut<'_> {
        ValueMut::Int32(self)
    }
}

impl Value for f32 {
    #[inline]
    fn value_ref(&self) -> ValueRef<'_> {
        ValueRef::Float32(*self)
    }

    #[inline]
    fn value_mut(&mut self) -> ValueMut<'_> {
        ValueMut::Float32(self)
    }
}

// Types that may be declared on a composite but have no wire representation. Tagging a field of
// one of these types fails with `Error::UnsupportedType`.
macro_rules! impl_unsupported {
    ($($type:ty),* $(,)?) => {
        $(
            impl Value for $type {
                #[inline]
                fn value_ref(&self) -> ValueRef<'_> {
                    ValueRef::Unsupported(stringify!($type))
                }

                #[inline]
                fn value_mut(&mut self) -> ValueMut<'_> {
                    ValueMut::Unsupported(stringify!($type))
                }
            }
        )*
    };
}

impl_unsupported!(bool, u8, u16, u32, u64, i8, i16, i64, f64, usize, isize, char, String);

impl<T> Value for Vec<T> {
    fn value_ref(&self) -> ValueRef<'_> {
        ValueRef::Unsupported("Vec")
    }

    fn value_mut(&mut self) -> ValueMut<'_> {
        ValueMut::Unsupported("Vec")
    }
}

impl<T> Value for Option<T> {
    fn value_ref(&self) -> ValueRef<'_> {
        ValueRef::Unsupported("Option")
    }

    fn value_mut(&mut self) -> ValueMut<'_> {
        ValueMut::Unsupported("Option")
    }
}

/// Source of a field's [Tag].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Annotation {
    /// Annotation text, parsed on use with [tag::parse].
    Text(&'static str),
    /// Already-typed tag.
    Tag(Tag),
}

impl From<&'static str> for Annotation {
    fn from(text: &'static str) -> Self {
        Self::Text(text)
    }
}

impl From<Tag> for Annotation {
    fn from(tag: Tag) -> Self {
        Self::Tag(tag)
    }
}

impl Annotation {
    /// Resolves to a validated tag, or `None` if the field is excluded.
    pub fn resolve(&self) -> Result<Option<Tag>, Error> {
        match self {
            Self::Text(text) => tag::parse(text),
            Self::Tag(tag) => {
                tag.validate()?;
                Ok(Some(*tag))
            }
        }
    }
}

/// Declared field of a composite `T`.
pub struct Field<T> {
    name: &'static str,
    annotation: Option<Annotation>,
    get: fn(&T) -> ValueRef<'_>,
    get_mut: fn(&mut T) -> ValueMut<'_>,
}

impl<T> Field<T> {
    /// Creates a field that is serialized according to `annotation`.
    pub fn new(
        name: &'static str,
        annotation: impl Into<Annotation>,
        get: fn(&T) -> ValueRef<'_>,
        get_mut: fn(&mut T) -> ValueMut<'_>,
    ) -> Self {
        Self {
            name,
            annotation: Some(annotation.into()),
            get,
            get_mut,
        }
    }

    /// Creates a field that is never read or written.
    pub fn untagged(
        name: &'static str,
        get: fn(&T) -> ValueRef<'_>,
        get_mut: fn(&mut T) -> ValueMut<'_>,
    ) -> Self {
        Self {
            name,
            annotation: None,
            get,
            get_mut,
        }
    }

    /// Returns the field name.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Trait for structured values whose fields are serialized by ordering number.
///
/// Usually implemented with [composite!], which also implements [Value].
pub trait Composite: Sized {
    /// Returns the declared fields, in declaration order.
    fn fields() -> Vec<Field<Self>>;
}

/// Object-safe recursion into a composite. Implemented for every [Composite].
pub trait Walk {
    fn walk_encode(&self, writer: &mut Writer) -> Result<(), Error>;

    fn walk_decode(&mut self, reader: &mut Reader<&mut dyn Buf>) -> Result<(), Error>;
}

impl<T: Composite> Walk for T {
    fn walk_encode(&self, writer: &mut Writer) -> Result<(), Error> {
        encode_composite(self, writer)
    }

    fn walk_decode(&mut self, reader: &mut Reader<&mut dyn Buf>) -> Result<(), Error> {
        decode_composite(self, reader)
    }
}

/// Tagged fields of one composite, in declaration order.
struct Layout<T> {
    entries: Vec<(Tag, Field<T>)>,
    by_ordering: BTreeMap<i32, usize>,
}

impl<T: Composite> Layout<T> {
    fn build() -> Result<Self, Error> {
        let mut entries = Vec::new();
        let mut by_ordering = BTreeMap::new();
        for field in T::fields() {
            let Some(annotation) = field.annotation else {
                continue;
            };
            let Some(tag) = annotation.resolve().map_err(|err| err.in_field(field.name))? else {
                continue;
            };
            if by_ordering.insert(tag.ordering, entries.len()).is_some() {
                return Err(Error::DuplicateOrdering(tag.ordering).in_field(field.name));
            }
            entries.push((tag, field));
        }
        Ok(Self {
            entries,
            by_ordering,
        })
    }
}

/// Encodes the tagged fields of `value`.
pub fn encode_composite<T: Composite>(value: &T, writer: &mut Writer) -> Result<(), Error> {
    let layout = Layout::<T>::build()?;
    for (tag, field) in &layout.entries {
        trace!(field = field.name, ordering = tag.ordering, "encoding field");
        range::write_integer(writer, tag.ordering, MIN_ORDERING, MAX_ORDERING)
            .and_then(|_| encode_field(writer, tag, (field.get)(value)))
            .map_err(|err| err.in_field(field.name))?;
    }
    Ok(())
}

/// Decodes exactly one ordering token per tagged field of `T` into `value`.
pub fn decode_composite<T: Composite>(
    value: &mut T,
    reader: &mut Reader<&mut dyn Buf>,
) -> Result<(), Error> {
    let layout = Layout::<T>::build()?;
    let mut seen = BTreeSet::new();
    for _ in 0..layout.entries.len() {
        let ordering = range::read_integer(reader, MIN_ORDERING, MAX_ORDERING)?;
        let index = *layout
            .by_ordering
            .get(&ordering)
            .ok_or(Error::UnknownOrdering(ordering))?;
        let (tag, field) = &layout.entries[index];
        if !seen.insert(ordering) {
            return Err(Error::DuplicateOrdering(ordering).in_field(field.name));
        }

        trace!(field = field.name, ordering, "decoding field");
        decode_field(reader, tag, (field.get_mut)(value)).map_err(|err| err.in_field(field.name))?;
    }
    Ok(())
}

fn encode_field(writer: &mut Writer, tag: &Tag, value: ValueRef<'_>) -> Result<(), Error> {
    match value {
        ValueRef::Int32(v) => {
            let (min, max) = tag.int_bounds()?;
            range::write_integer(writer, v, min, max)
        }
        ValueRef::Float32(v) => match tag.compressed_float()? {
            Some((min, max, resolution)) => {
                range::write_compressed_float(writer, v, min, max, resolution)
            }
            None => range::write_float(writer, v),
        },
        ValueRef::Composite(inner) => inner.walk_encode(writer),
        ValueRef::Unsupported(name) => Err(Error::UnsupportedType(name)),
    }
}

fn decode_field(
    reader: &mut Reader<&mut dyn Buf>,
    tag: &Tag,
    value: ValueMut<'_>,
) -> Result<(), Error> {
    match value {
        ValueMut::Int32(slot) => {
            let (min, max) = tag.int_bounds()?;
            *slot = range::read_integer(reader, min, max)?;
        }
        ValueMut::Float32(slot) => {
            *slot = match tag.compressed_float()? {
                Some((min, max, resolution)) => {
                    range::read_compressed_float(reader, min, max, resolution)?
                }
                None => range::read_float(reader)?,
            };
        }
        ValueMut::Composite(inner) => inner.walk_decode(reader)?,
        ValueMut::Unsupported(name) => return Err(Error::UnsupportedType(name)),
    }
    Ok(())
}

/// Encodes a top-level value. Bare integers use the full `i32` range and carry no token.
pub(crate) fn encode_value(writer: &mut Writer, value: ValueRef<'_>) -> Result<(), Error> {
    match value {
        ValueRef::Int32(v) => range::write_integer(writer, v, i32::MIN, i32::MAX),
        ValueRef::Float32(v) => range::write_float(writer, v),
        ValueRef::Composite(inner) => inner.walk_encode(writer),
        ValueRef::Unsupported(name) => Err(Error::UnsupportedType(name)),
    }
}

/// Decodes a top-level value written by [encode_value].
pub(crate) fn decode_value(
    reader: &mut Reader<&mut dyn Buf>,
    value: ValueMut<'_>,
) -> Result<(), Error> {
    match value {
        ValueMut::Int32(slot) => *slot = range::read_integer(reader, i32::MIN, i32::MAX)?,
        ValueMut::Float32(slot) => *slot = range::read_float(reader)?,
        ValueMut::Composite(inner) => inner.walk_decode(reader)?,
        ValueMut::Unsupported(name) => return Err(Error::UnsupportedType(name)),
    }
    Ok(())
}

/// Implements [Composite] and [Value] for a struct by listing its serialized fields.
///
/// Each entry maps a field to its annotation: either annotation text (see [crate::tag]) or a
/// [Tag]. Fields that are not listed are never read or written.
///
/// ```
/// use packwire_codec::{composite, tag::Tag};
///
/// #[derive(Default)]
/// struct Health {
///     current: i32,
///     regen: f32,
///     label: String,
/// }
///
/// composite! {
///     Health {
///         current => "1,min=0,max=100",
///         regen => Tag::new(2).min(0).max(5).resolution(0.1),
///     }
/// }
/// ```
#[macro_export]
macro_rules! composite {
    ($type:ty { $($field:ident => $annotation:expr),* $(,)? }) => {
        impl $crate::schema::Composite for $type {
            fn fields() -> ::std::vec::Vec<$crate::schema::Field<Self>> {
                ::std::vec![
                    $({
                        fn get(value: &$type) -> $crate::schema::ValueRef<'_> {
                            $crate::schema::Value::value_ref(&value.$field)
                        }
                        fn get_mut(value: &mut $type) -> $crate::schema::ValueMut<'_> {
                            $crate::schema::Value::value_mut(&mut value.$field)
                        }
                        $crate::schema::Field::new(::core::stringify!($field), $annotation, get, get_mut)
                    },)*
                ]
            }
        }

        impl $crate::schema::Value for $type {
            fn value_ref(&self) -> $crate::schema::ValueRef<'_> {
                $crate::schema::ValueRef::Composite(self)
            }

            fn value_mut(&mut self) -> $crate::schema::ValueMut<'_> {
                $crate::schema::ValueMut::Composite(self)
            }
        }
    };
}
