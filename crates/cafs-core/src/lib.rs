pub mod config;
pub mod error;
pub mod types;

pub use config::{CafsConfig, ConfigProvider};
pub use error::{CafsError, CafsResult, ErrorKind};
pub use types::{
    correlation_label, FileRecord, NewFileRecord, StorageKind, UploadOutcome, UploadReceipt,
};
