pub mod config;
pub mod error;
pub mod pdf;
pub mod pipeline;
pub mod raster;
pub mod source;

pub use config::job::CompressionPolicy;
pub use error::{PdfMergeError, Result};
pub use pipeline::orchestrator::{MergeOptions, merge, merge_with_cancel};
pub use source::{ByteSource, InputDescriptor, InputKind, OfficeFormat};
