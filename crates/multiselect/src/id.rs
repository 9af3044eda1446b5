//! Record identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier of a record, also used as a group key.
///
/// Identifiers come from a small closed set of comparable primitives. Integers
/// that fit in `i64` are always stored as [`Id::Int`]; wider values use
/// [`Id::Big`], so the same number never has two representations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
	Str(Box<str>),
	Int(i64),
	Big(i128),
}

impl Id {
	/// Builds an identifier from a wide integer, narrowing when it fits.
	pub fn from_i128(value: i128) -> Self {
		match i64::try_from(value) {
			Ok(v) => Self::Int(v),
			Err(_) => Self::Big(value),
		}
	}

	/// Returns the string payload, if this is a string identifier.
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::Str(s) => Some(s),
			_ => None,
		}
	}
}

impl fmt::Display for Id {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Str(s) => f.write_str(s),
			Self::Int(n) => write!(f, "{n}"),
			Self::Big(n) => write!(f, "{n}"),
		}
	}
}

impl From<&str> for Id {
	fn from(value: &str) -> Self {
		Self::Str(value.into())
	}
}

impl From<String> for Id {
	fn from(value: String) -> Self {
		Self::Str(value.into_boxed_str())
	}
}

impl From<Box<str>> for Id {
	fn from(value: Box<str>) -> Self {
		Self::Str(value)
	}
}

impl From<&String> for Id {
	fn from(value: &String) -> Self {
		Self::Str(value.as_str().into())
	}
}

macro_rules! impl_from_int {
	($($t:ty),*) => {
		$(
			impl From<$t> for Id {
				fn from(value: $t) -> Self {
					Self::from_i128(value as i128)
				}
			}
		)*
	};
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32, u64, isize, usize);

impl From<i128> for Id {
	fn from(value: i128) -> Self {
		Self::from_i128(value)
	}
}
