//! Script item: a tagged value flowing between operations and stored in a
//! processing context.
//!
//! Grounded on `original_source/.../scripting/item.cpp`'s `item::types`
//! enum. The distilled tag set is `{Invalid, Gray8, Rgb8, Mask, Int, Real,
//! Bool, String, Error}`. **Resolved open question:** that set has no tag
//! for an aggregate reduction result (a histogram), yet S1 requires
//! `otsu_threshold(histogram(g))` to thread a histogram between two script
//! operations — so a `Histogram` tag is added here. It's internal plumbing:
//! no script-facing algorithm accepts it as a final output, only as an
//! intermediate between `histogram` and `otsu_threshold`.

use std::fmt;

use tilework_core::error::{Error, Result};
use tilework_core::histogram::Histogram;
use tilework_core::image::Image;

/// The tag half of a script [`Item`], used for static type checking during parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    /// No value — the default for an item slot that hasn't been stored yet.
    Invalid,
    /// 8-bit single-channel image.
    Gray8,
    /// 8-bit three-channel image.
    Rgb8,
    /// Binary mask, represented the same as `Gray8` (0/255 values).
    Mask,
    /// Signed integer.
    Int,
    /// Real number.
    Real,
    /// Boolean.
    Bool,
    /// UTF-8 string.
    String,
    /// A failed computation's message.
    Error,
    /// Gray-level histogram; internal-only, see module docs.
    Histogram,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Invalid => "invalid",
            Self::Gray8 => "gray8",
            Self::Rgb8 => "rgb8",
            Self::Mask => "mask",
            Self::Int => "int",
            Self::Real => "real",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Error => "error",
            Self::Histogram => "histogram",
        };
        f.write_str(s)
    }
}

/// A tagged value: the unit of data the script engine passes around and stores.
#[derive(Debug, Clone)]
pub enum Item {
    /// Absent value.
    Invalid,
    /// Gray image payload.
    Gray8(Image),
    /// RGB image payload.
    Rgb8(Image),
    /// Mask image payload.
    Mask(Image),
    /// Integer payload.
    Int(i64),
    /// Real payload.
    Real(f64),
    /// Boolean payload.
    Bool(bool),
    /// String payload.
    String(String),
    /// Error payload (the message of a failed computation, stored rather than propagated).
    Error(String),
    /// Histogram payload.
    Histogram(Histogram<u64>),
}

impl Item {
    /// This item's tag.
    pub fn kind(&self) -> ItemKind {
        match self {
            Self::Invalid => ItemKind::Invalid,
            Self::Gray8(_) => ItemKind::Gray8,
            Self::Rgb8(_) => ItemKind::Rgb8,
            Self::Mask(_) => ItemKind::Mask,
            Self::Int(_) => ItemKind::Int,
            Self::Real(_) => ItemKind::Real,
            Self::Bool(_) => ItemKind::Bool,
            Self::String(_) => ItemKind::String,
            Self::Error(_) => ItemKind::Error,
            Self::Histogram(_) => ItemKind::Histogram,
        }
    }

    /// Borrows the image payload of a `Gray8`/`Rgb8`/`Mask` item.
    pub fn as_image(&self) -> Result<&Image> {
        match self {
            Self::Gray8(img) | Self::Rgb8(img) | Self::Mask(img) => Ok(img),
            other => Err(Error::invalid_parameter(
                "item",
                format!("expected an image item, got {}", other.kind()),
            )),
        }
    }

    /// Borrows the histogram payload.
    pub fn as_histogram(&self) -> Result<&Histogram<u64>> {
        match self {
            Self::Histogram(h) => Ok(h),
            other => Err(Error::invalid_parameter(
                "item",
                format!("expected a histogram item, got {}", other.kind()),
            )),
        }
    }

    /// Reads the integer payload.
    pub fn as_int(&self) -> Result<i64> {
        match self {
            Self::Int(v) => Ok(*v),
            other => Err(Error::invalid_parameter(
                "item",
                format!("expected an int item, got {}", other.kind()),
            )),
        }
    }

    /// Reads the real payload.
    pub fn as_real(&self) -> Result<f64> {
        match self {
            Self::Real(v) => Ok(*v),
            other => Err(Error::invalid_parameter(
                "item",
                format!("expected a real item, got {}", other.kind()),
            )),
        }
    }

    /// Reads the string payload.
    pub fn as_str(&self) -> Result<&str> {
        match self {
            Self::String(v) => Ok(v),
            other => Err(Error::invalid_parameter(
                "item",
                format!("expected a string item, got {}", other.kind()),
            )),
        }
    }
}

/// A literal argument value as it appears in script source.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Integer literal.
    Int(i64),
    /// Real literal.
    Real(f64),
    /// Boolean literal (`true`/`false`).
    Bool(bool),
    /// Double-quoted string literal.
    String(String),
}

impl Literal {
    /// The [`ItemKind`] a literal of this shape would produce.
    pub fn kind(&self) -> ItemKind {
        match self {
            Self::Int(_) => ItemKind::Int,
            Self::Real(_) => ItemKind::Real,
            Self::Bool(_) => ItemKind::Bool,
            Self::String(_) => ItemKind::String,
        }
    }
}

/// One resolved argument to an operation call: either an inline literal or
/// a reference to a previously bound item id.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// Inline literal value.
    Literal(Literal),
    /// Reference to a `var`-bound item, by id.
    Ref(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_kind_matches_payload() {
        assert_eq!(Item::Int(3).kind(), ItemKind::Int);
        assert_eq!(Item::Invalid.kind(), ItemKind::Invalid);
    }

    #[test]
    fn as_image_rejects_non_image_item() {
        assert!(Item::Int(1).as_image().is_err());
    }

    #[test]
    fn literal_kind_matches_variant() {
        assert_eq!(Literal::String("x".into()).kind(), ItemKind::String);
        assert_eq!(Literal::Bool(true).kind(), ItemKind::Bool);
    }
}
