//! Selection state for grouped, filterable item lists: item registry,
//! grouping, filtering, projected group views, collapsed selections and
//! batched change notification.
//!
//! ```text
//! let model = MultiSelect::builder(records, ItemDef::new("id"))
//!     .group_by("category")
//!     .build()?;
//! model.get_group(&"fruit".into())?.select(&model, Scope::ALL);
//! scheduler::run_frame(); // listeners see { added: [...], removed: [] }
//! ```

/// Record field lookup: dotted paths and function accessors.
pub mod accessor;
/// Collapsing a selection into its coarsest covering entries.
pub mod collapse;
/// Construction errors.
pub mod error;
/// Active filter and filtered-subset operations.
pub mod filter;
/// Static multi-level group tree.
pub mod group;
/// Record identifiers.
pub mod id;
/// Items, the item registry and the selection sink seam.
pub mod item;
/// The selection model tying every engine together.
pub mod model;
/// Group views under filter and selection scopes, plus their cache.
pub mod projection;
/// Deferred notification scheduling.
pub mod scheduler;
/// Canonical selection set and diff accumulation.
pub mod selection;
/// Model tunables.
pub mod settings;

#[cfg(test)]
mod test_support;

pub use accessor::{Accessor, FieldPath, Fields};
pub use collapse::{CollapseOptions, CollapsedNode, OrderBook, PositionStrategy, UNORDERED};
pub use error::{Error, Result};
pub use filter::Filter;
pub use group::{GroupBy, GroupNode, GroupTree};
pub use id::Id;
pub use item::{Change, Item, ItemDef, SelectionSink};
pub use model::{MultiSelect, MultiSelectBuilder, Subscription};
pub use projection::{GroupTreeOptions, GroupView, Projection, Scope, SelectionScope};
#[cfg(feature = "tokio")]
pub use scheduler::LocalSpawn;
pub use scheduler::{FrameQueue, Scheduler};
pub use selection::{SelectionDiff, SelectionState, SelectionSummary};
pub use settings::Settings;
