//! Configuration errors raised while building a selection model.

use thiserror::Error;

use crate::id::Id;

/// Errors that can occur when constructing a [`MultiSelect`](crate::MultiSelect).
///
/// All of them describe a contract violation between the caller and its
/// data. Queries and mutations on a built model never fail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
	/// The ID accessor yielded nothing for a record.
	#[error("id accessor {accessor} returned no value for record #{index}")]
	MissingId {
		/// Position of the record in the input data.
		index: usize,
		/// Rendered accessor, for diagnostics.
		accessor: String,
	},

	/// A string-path group accessor yielded nothing for an item.
	#[error("grouping by path '{path}' returned no value for item {item} at level {level}")]
	MissingGroupKey {
		path: String,
		level: usize,
		item: Id,
	},

	/// Two records resolved to the same ID.
	#[error("duplicate id {id} for records #{first} and #{second}")]
	DuplicateId {
		id: Id,
		first: usize,
		second: usize,
	},
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
