//! Template lookup and rendering.
//!
//! Templates are owned by external tooling; this module only reads them.
//! Metadata lives in a keyed store, bodies live in a blob store, and the
//! renderer combines both into a send-ready [`Deliverable`].

mod renderer;
mod store;
mod types;

pub use renderer::TemplateRenderer;
pub use store::{BlobStore, FsBlobStore, MemoryBlobStore, MemoryTemplateStore, TemplateStore};
pub use types::{Deliverable, ParamValue, Parameters, Template, TemplateKey};
