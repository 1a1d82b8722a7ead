//! Maps an ordered argument list into a populated, strongly-typed schema
//! instance.
//!
//! A schema is any type implementing [`CommandArgs`]: its
//! `from_arguments` body declares every field exactly once through
//! [`ArgumentSet::required`] or [`ArgumentSet::optional`], which makes the
//! required/optional marking part of the schema definition itself. Textual
//! values are converted through the [`ArgValue`] capability; implementations
//! ship for every built-in kind, and the [`arg_value_via_parse`] and
//! [`arg_value_via_constructor`] macros adopt custom types by convention.
//!
//! Mapping never partially returns: either every field resolves or the call
//! fails with a [`MappingError`].

use std::any::Any;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use thiserror::Error;
use uuid::Uuid;

use crate::command::CommandSpec;
use crate::parser::Argument;

/// Errors raised while mapping arguments into a schema instance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    /// A field with no optional marker was absent from the input.
    #[error("missing required argument {field:?}")]
    MissingRequiredArgument { field: String },

    /// The textual value could not be converted into the field's type.
    #[error("cannot convert {raw_value:?} into a value for argument {field:?}")]
    ValueConversion { field: String, raw_value: String },
}

/// Conversion capability from the textual value of an argument into a typed
/// field value.
///
/// Modeled after the shape of `argh::FromArgValue`: the error is a plain
/// message, later wrapped into [`MappingError::ValueConversion`] together
/// with the field name and the offending raw text.
pub trait ArgValue: Sized {
    /// Parses the raw textual value.
    fn from_raw(raw: &str) -> Result<Self, String>;

    /// Value used when the argument is present with an empty value, i.e. a
    /// flag with no trailing value. `None` means an empty value is not
    /// special and goes through [`ArgValue::from_raw`] like any other.
    fn from_empty() -> Option<Self> {
        None
    }
}

macro_rules! arg_value_from_str {
    ($($kind:ty)*) => {$(
        impl ArgValue for $kind {
            fn from_raw(raw: &str) -> Result<Self, String> {
                <$kind as FromStr>::from_str(raw).map_err(|e| e.to_string())
            }
        }
    )*};
}

arg_value_from_str!(i8 i16 i32 i64 i128 isize u8 u16 u32 u64 u128 usize f32 f64);

impl ArgValue for String {
    fn from_raw(raw: &str) -> Result<Self, String> {
        Ok(raw.to_owned())
    }
}

impl ArgValue for char {
    fn from_raw(raw: &str) -> Result<Self, String> {
        let mut chars = raw.chars();
        match (chars.next(), chars.next()) {
            (Some(only), None) => Ok(only),
            _ => Err(format!("expected a single character, got {raw:?}")),
        }
    }
}

/// Booleans are always optional: absent means `false`, present means `true`
/// unless the value spells `"false"` in any casing.
impl ArgValue for bool {
    fn from_raw(raw: &str) -> Result<Self, String> {
        Ok(!raw.eq_ignore_ascii_case("false"))
    }

    fn from_empty() -> Option<Self> {
        Some(true)
    }
}

/// Accepts both a date-plus-time form and a date-only form (midnight).
impl ArgValue for NaiveDateTime {
    fn from_raw(raw: &str) -> Result<Self, String> {
        if let Ok(full) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
            return Ok(full);
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(|date| date.and_time(NaiveTime::MIN))
            .map_err(|e| e.to_string())
    }
}

impl ArgValue for Uuid {
    fn from_raw(raw: &str) -> Result<Self, String> {
        Uuid::parse_str(raw).map_err(|e| e.to_string())
    }
}

/// Nullable wrapping: absent stays `None`, a present value parses as `T`.
impl<T: ArgValue> ArgValue for Option<T> {
    fn from_raw(raw: &str) -> Result<Self, String> {
        T::from_raw(raw).map(Some)
    }

    fn from_empty() -> Option<Self> {
        T::from_empty().map(Some)
    }
}

/// Adopts a type's `FromStr` implementation as its argument conversion (the
/// try-parse convention). The `Err` type must implement `Display`.
#[macro_export]
macro_rules! arg_value_via_parse {
    ($kind:ty) => {
        impl $crate::mapper::ArgValue for $kind {
            fn from_raw(raw: &str) -> Result<Self, String> {
                <$kind as ::std::str::FromStr>::from_str(raw).map_err(|e| e.to_string())
            }
        }
    };
}

/// Adopts a type's single-parameter constructor as its argument conversion:
/// the raw text is converted into the built-in kind `$inner` first and the
/// result passed through `From<$inner>`.
#[macro_export]
macro_rules! arg_value_via_constructor {
    ($kind:ty, $inner:ty) => {
        impl $crate::mapper::ArgValue for $kind {
            fn from_raw(raw: &str) -> Result<Self, String> {
                let inner = <$inner as $crate::mapper::ArgValue>::from_raw(raw)?;
                Ok(<$kind as ::std::convert::From<$inner>>::from(inner))
            }
        }
    };
}

/// Case-insensitive lookup view over an ordered argument list.
///
/// When a name appears more than once, the last occurrence wins.
pub struct ArgumentSet<'a> {
    arguments: &'a [Argument],
}

impl<'a> ArgumentSet<'a> {
    pub fn new(arguments: &'a [Argument]) -> Self {
        ArgumentSet { arguments }
    }

    /// Raw textual value for `name`, or `None` when absent.
    pub fn value_of(&self, name: &str) -> Option<&'a str> {
        self.arguments
            .iter()
            .rev()
            .find(|argument| argument.name.eq_ignore_ascii_case(name))
            .map(|argument| argument.value.as_str())
    }

    /// Declares a field that must appear in the input.
    pub fn required<T: ArgValue>(&self, field: &str) -> Result<T, MappingError> {
        match self.value_of(field) {
            Some(raw) => convert(field, raw),
            None => Err(MappingError::MissingRequiredArgument {
                field: field.to_owned(),
            }),
        }
    }

    /// Declares a field that falls back to its zero value when absent:
    /// `""`, `0`, `false`, `None`. Boolean fields are always declared
    /// through this method.
    pub fn optional<T: ArgValue + Default>(&self, field: &str) -> Result<T, MappingError> {
        match self.value_of(field) {
            Some(raw) => convert(field, raw),
            None => Ok(T::default()),
        }
    }
}

fn convert<T: ArgValue>(field: &str, raw: &str) -> Result<T, MappingError> {
    if raw.is_empty() {
        if let Some(value) = T::from_empty() {
            return Ok(value);
        }
    }
    T::from_raw(raw).map_err(|_| MappingError::ValueConversion {
        field: field.to_owned(),
        raw_value: raw.to_owned(),
    })
}

/// Argument schema capability: a record type populated from an
/// [`ArgumentSet`].
pub trait CommandArgs: Sized + 'static {
    fn from_arguments(arguments: &ArgumentSet<'_>) -> Result<Self, MappingError>;
}

/// Schema for commands that take no arguments.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EmptyArgs;

impl CommandArgs for EmptyArgs {
    fn from_arguments(_arguments: &ArgumentSet<'_>) -> Result<Self, MappingError> {
        Ok(EmptyArgs)
    }
}

/// The argument-mapping component: converts an ordered argument list into a
/// populated schema instance, either for a statically known schema type or,
/// type-erased, for the schema a command declares.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArgumentMapper;

impl ArgumentMapper {
    pub fn new() -> Self {
        ArgumentMapper
    }

    pub fn map<T: CommandArgs>(&self, arguments: &[Argument]) -> Result<T, MappingError> {
        T::from_arguments(&ArgumentSet::new(arguments))
    }

    /// Maps against the schema declared by `spec`, returning the boxed
    /// instance the executor will hand to the command.
    pub fn map_for(
        &self,
        spec: &CommandSpec,
        arguments: &[Argument],
    ) -> Result<Box<dyn Any>, MappingError> {
        spec.map_arguments(&ArgumentSet::new(arguments))
    }
}
