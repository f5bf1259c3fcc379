//! timebuffer - Cross-frame relay channel
//!
//! A per-frame pipeline is a DAG, so a node cannot read what it produced on the
//! previous frame. A [`ReaderEndpoint`] and a [`WriterEndpoint`] bound to the
//! same name share one [`BufferSlot`]: the writer publishes at frame N, the
//! reader consumes at frame N+1.
//!
//! ```
//! use timebuffer_core::{ReaderConfig, ReaderEndpoint, Registry, RenderScale, WriterConfig, WriterEndpoint};
//!
//! let registry = Registry::new();
//! let reader = ReaderEndpoint::new(registry.clone(), "graph", ReaderConfig::new("accum"))?;
//! let writer = WriterEndpoint::new(registry.clone(), "graph", WriterConfig::new("accum"))?;
//!
//! let scale = RenderScale::IDENTITY;
//! let first = reader.acquire(1, scale, None)?;
//! writer.publish(1, first, scale)?;
//! let fed_back = reader.acquire(2, scale, None)?;
//! assert!(fed_back.is_empty());
//! # Ok::<(), timebuffer_core::Error>(())
//! ```

mod binding;
pub mod cancel;
pub mod config;
pub mod error;
pub mod format;
pub mod payload;
pub mod reader;
pub mod registry;
pub mod slot;
pub mod writer;

/// Frame index
pub type Frame = i64;

pub use cancel::CancelToken;
pub use config::{OrderingPolicy, ReaderConfig, WaitStrategy, WriterConfig};
pub use error::{Error, Result, Status};
pub use format::{ChannelLayout, Precision};
pub use payload::{Descriptor, Payload, Rect, RenderScale};
pub use reader::ReaderEndpoint;
pub use registry::{EndpointId, Key, Registry, Role};
pub use slot::{BufferSlot, SlotState};
pub use writer::WriterEndpoint;
