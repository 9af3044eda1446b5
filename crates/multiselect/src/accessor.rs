//! Key and ID accessors.
//!
//! An [`Accessor`] is either a dotted field path resolved against the record
//! through [`Fields`], or an arbitrary function. The two variants fail
//! differently when grouping: a path that resolves to nothing is a
//! configuration error, a function that returns `None` excludes the item.

use std::fmt;
use std::rc::Rc;

use serde::Serialize;
use serde_json::Value;

use crate::id::Id;

/// Dotted field path such as `"taste.brix"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
	text: Box<str>,
	segments: Box<[Box<str>]>,
}

impl FieldPath {
	pub fn parse(text: &str) -> Self {
		Self {
			text: text.into(),
			segments: text.split('.').map(Into::into).collect(),
		}
	}

	pub fn as_str(&self) -> &str {
		&self.text
	}

	pub fn segments(&self) -> impl Iterator<Item = &str> {
		self.segments.iter().map(AsRef::as_ref)
	}
}

impl fmt::Display for FieldPath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.text)
	}
}

/// Records that support dotted-path lookup.
///
/// Implementations return `None` when any segment is missing or when the
/// final value is not an identifier-like primitive. A numeric segment indexes
/// into an array, and a whole-number float such as `1.0` is the integer ID `1`.
pub trait Fields {
	fn resolve(&self, path: &FieldPath) -> Option<Id>;
}

impl Fields for Value {
	fn resolve(&self, path: &FieldPath) -> Option<Id> {
		let mut cursor = self;
		for segment in path.segments() {
			cursor = match cursor {
				Value::Object(map) => map.get(segment)?,
				Value::Array(list) => list.get(segment.parse::<usize>().ok()?)?,
				_ => return None,
			};
		}
		json_id(cursor)
	}
}

impl<T: Fields + ?Sized> Fields for Rc<T> {
	fn resolve(&self, path: &FieldPath) -> Option<Id> {
		(**self).resolve(path)
	}
}

impl<T: Fields + ?Sized> Fields for Box<T> {
	fn resolve(&self, path: &FieldPath) -> Option<Id> {
		(**self).resolve(path)
	}
}

/// Resolves `path` against any serializable record by way of its JSON form.
///
/// Convenient for implementing [`Fields`] on plain structs; each call
/// serializes the record, so hand-written lookups are preferable for hot paths.
pub fn resolve_serialized<T: Serialize + ?Sized>(record: &T, path: &FieldPath) -> Option<Id> {
	serde_json::to_value(record).ok()?.resolve(path)
}

fn json_id(value: &Value) -> Option<Id> {
	match value {
		Value::String(s) => Some(Id::from(s.as_str())),
		Value::Number(n) => {
			if let Some(i) = n.as_i64() {
				Some(Id::Int(i))
			} else if let Some(u) = n.as_u64() {
				Some(Id::from(u))
			} else {
				n.as_f64().filter(|f| f.fract() == 0.0 && (i64::MIN as f64..i64::MAX as f64).contains(f)).map(|f| Id::Int(f as i64))
			}
		}
		_ => None,
	}
}

/// Two-variant accessor producing an [`Id`] from a record.
pub enum Accessor<D> {
	/// Dotted path; a miss is an error wherever the accessor is strict.
	Path {
		path: FieldPath,
		resolve: fn(&D, &FieldPath) -> Option<Id>,
	},
	/// Custom logic; `None` excludes the record when grouping.
	Function(Rc<dyn Fn(&D) -> Option<Id>>),
}

impl<D> Accessor<D> {
	pub fn path(path: &str) -> Self
	where
		D: Fields,
	{
		Self::Path {
			path: FieldPath::parse(path),
			resolve: <D as Fields>::resolve,
		}
	}

	pub fn function<F>(f: F) -> Self
	where
		F: Fn(&D) -> Option<Id> + 'static,
	{
		Self::Function(Rc::new(f))
	}

	pub fn resolve(&self, data: &D) -> Option<Id> {
		match self {
			Self::Path { path, resolve } => resolve(data, path),
			Self::Function(f) => f(data),
		}
	}

	pub fn is_path(&self) -> bool {
		matches!(self, Self::Path { .. })
	}
}

impl<D> Clone for Accessor<D> {
	fn clone(&self) -> Self {
		match self {
			Self::Path { path, resolve } => Self::Path {
				path: path.clone(),
				resolve: *resolve,
			},
			Self::Function(f) => Self::Function(Rc::clone(f)),
		}
	}
}

impl<D> fmt::Debug for Accessor<D> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Path { path, .. } => f.debug_tuple("Path").field(&path.as_str()).finish(),
			Self::Function(_) => f.write_str("Function(..)"),
		}
	}
}

impl<D> fmt::Display for Accessor<D> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Path { path, .. } => write!(f, "'{path}'"),
			Self::Function(_) => f.write_str("<function>"),
		}
	}
}

impl<D: Fields> From<&str> for Accessor<D> {
	fn from(path: &str) -> Self {
		Self::path(path)
	}
}
