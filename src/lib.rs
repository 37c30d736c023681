//! unitscope – client-side engine for browsing neural-unit waveform
//! templates stored as chunked multidimensional arrays in a remote object
//! store.
//!
//! The crate fetches per-unit template slices and probe/unit metadata,
//! derives per-channel peak-to-peak amplitudes and the best/active channel
//! selection, and manages incremental batch loading plus a stable selection
//! set over an open-ended unit index space. Rendering is somebody else's
//! job: the session exposes per-unit row records and leaves drawing to the
//! consumer.
//!
//! ```no_run
//! use unitscope::config::SessionConfig;
//! use unitscope::session::TemplateSession;
//! use unitscope::store::HttpTransport;
//!
//! # async fn run() -> Result<(), unitscope::error::SessionError> {
//! let config = SessionConfig::default();
//! let transport = HttpTransport::new(config.store_url.clone());
//! let mut session = TemplateSession::connect(transport, config).await?;
//! let loaded = session.load_next_batch().await;
//! println!("loaded units: {loaded:?}");
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod config;
pub mod error;
pub mod session;
pub mod store;
