//! cafs-storage: date-partitioned storage layout over OpenDAL backends

pub mod health;
pub mod layout;
pub mod operator;
pub mod store;

pub use health::{check_health, is_healthy};
pub use layout::{allocate_path, declared_extension, extension_of};
pub use operator::{build_local_operator, build_operator, S3Config};
pub use store::FileStore;
