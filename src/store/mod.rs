/// Store layer: transports, array metadata, and the slice client.
///
/// Architecture:
/// ```text
///  remote object store (HTTP) / in-memory map
///        │
///        ▼
///   ┌────────────┐
///   │ transport   │  key → bytes, absence ≠ failure
///   └────────────┘
///        │
///        ▼
///   ┌────────────┐
///   │   meta      │  descriptors, dtypes, element codecs
///   └────────────┘
///        │
///        ▼
///   ┌────────────┐
///   │   client    │  open group / resolve array / fetch slice
///   └────────────┘
/// ```
pub mod client;
pub mod memory;
pub mod meta;
pub mod transport;

pub use client::{ArrayHandle, ArrayStoreClient, AxisSpec, GroupHandle, Slice};
pub use memory::{MemoryStoreBuilder, MemoryTransport};
pub use meta::{ArrayData, Dtype};
pub use transport::{HttpTransport, StoreTransport};
