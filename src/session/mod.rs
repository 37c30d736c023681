/// Session layer: everything stateful about a browsing session.
///
/// ```text
///   ┌──────────────────┐     next batch      ┌───────────────┐
///   │ PaginationCtrl    │ ──────────────────▶ │ TemplateSession│
///   └──────────────────┘                     │  (fan-out,     │
///   ┌──────────────────┐   field lookups     │   row merge)   │
///   │ UnitMetadataCache │ ──────────────────▶ │               │
///   │ ProbeGeometry     │                     └──────┬────────┘
///   └──────────────────┘                            │ per unit
///   ┌──────────────────┐    user toggles            ▼
///   │ SelectionSet      │ ◀───────────────  RowState (Pending →
///   └──────────────────┘                    Loading → Loaded/Errored)
/// ```
pub mod browser;
pub mod metadata;
pub mod pagination;
pub mod row;
pub mod selection;

pub use browser::TemplateSession;
pub use metadata::{MetaValue, ProbeGeometry, UnitField, UnitMetadataCache};
pub use pagination::{LoadPhase, PaginationController};
pub use row::{RowState, UnitRow};
pub use selection::SelectionSet;
