//! cafs-upload: the upload path
//!
//! payload → fingerprint → catalog lookup → existence check →
//! reuse / store-new / rewrite-stale → catalog upsert → locator

pub mod locator;
pub mod origin;
pub mod resolver;

pub use locator::build_locator;
pub use origin::{FixedOrigin, OriginResolver, RequestOrigin};
pub use resolver::{UploadReport, UploadService};
