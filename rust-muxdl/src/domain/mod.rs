//! Domain types for download requests and stream variants.

pub mod filename;
pub mod request;
pub mod variant;

pub use filename::{filename_for, sanitize_title};
pub use request::{DownloadRequest, ResolvedSelection, Selection};
pub use variant::{MediaDetails, StreamVariant, VariantCatalog, VariantKind};
