//! Host values accepted as names and subscripts.
//!
//! Role
//! - Model the loosely typed values a scripting host hands over (strings, numbers, nil, ...).
//! - Convert the representable ones to the byte-strings stored in a key array.
use std::borrow::Cow;

use strum::{EnumIs, IntoStaticStr};

use crate::{
    config::MAX_SUBSCRIPT_LEN,
    error::{KeyError, KeyResult},
};

/// A value supplied by the host as a name or subscript.
///
/// Only strings and numbers are representable as subscripts; the other kinds exist so that
/// callers can forward host values unchecked and get a positioned [`crate::KeyError::TypeError`].
#[derive(Debug, Clone, Copy, PartialEq, EnumIs, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Value<'a> {
    /// Absent value.
    Nil,
    /// Boolean value; not a valid subscript.
    Boolean(bool),
    /// Integer, stored as its decimal text.
    Integer(i64),
    /// Floating point number, stored in shortest round-trip form.
    Number(f64),
    /// Raw byte-string.
    String(&'a [u8]),
}

impl<'a> Value<'a> {
    /// Host type name, used in error messages.
    pub fn type_name(&self) -> &'static str {
        self.into()
    }

    /// Byte-string form of this value, or `None` if it has none.
    ///
    /// Strings are borrowed; numbers are formatted.
    pub fn to_bytes(&self) -> Option<Cow<'a, [u8]>> {
        match *self {
            Value::String(bytes) => Some(Cow::Borrowed(bytes)),
            Value::Integer(i) => Some(Cow::Owned(i.to_string().into_bytes())),
            Value::Number(n) => Some(Cow::Owned(format_number(n).into_bytes())),
            Value::Nil | Value::Boolean(_) => None,
        }
    }

    /// Check that this value can be stored as argument `position` of `operation`.
    pub(crate) fn check(
        &self,
        operation: &'static str,
        position: usize,
        index: Option<usize>,
    ) -> KeyResult<()> {
        if self.is_nil() || self.is_boolean() {
            return Err(KeyError::TypeError {
                operation,
                position,
                index,
                found: self.type_name(),
            });
        }
        match self.known_len() {
            Some(len) if len > MAX_SUBSCRIPT_LEN => Err(KeyError::TooLong {
                operation,
                position,
                index,
                len,
                max: MAX_SUBSCRIPT_LEN,
            }),
            _ => Ok(()),
        }
    }

    /// Length of the byte-string form when it is known without formatting.
    pub(crate) fn known_len(&self) -> Option<usize> {
        match self {
            Value::String(bytes) => Some(bytes.len()),
            _ => None,
        }
    }
}

fn format_number(n: f64) -> String {
    // `{:?}` keeps the fractional marker on integral values ("3.0").
    format!("{n:?}")
}

impl<'a> From<&'a str> for Value<'a> {
    fn from(value: &'a str) -> Self {
        Value::String(value.as_bytes())
    }
}

impl<'a> From<&'a String> for Value<'a> {
    fn from(value: &'a String) -> Self {
        Value::String(value.as_bytes())
    }
}

impl<'a> From<&'a [u8]> for Value<'a> {
    fn from(value: &'a [u8]) -> Self {
        Value::String(value)
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for Value<'a> {
    fn from(value: &'a [u8; N]) -> Self {
        Value::String(value)
    }
}

impl<'a> From<&'a Vec<u8>> for Value<'a> {
    fn from(value: &'a Vec<u8>) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value<'_> {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value<'_> {
    fn from(value: i32) -> Self {
        Value::Integer(value as i64)
    }
}

impl From<f64> for Value<'_> {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<bool> for Value<'_> {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl<'a, T> From<Option<T>> for Value<'a>
where
    T: Into<Value<'a>>,
{
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Nil)
    }
}
