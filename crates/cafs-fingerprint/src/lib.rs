//! cafs-fingerprint: content fingerprints for uploaded payloads
//!
//! # Overview
//! - `blake3`: deterministic hashing of slices and readers (content identity)
//! - `payload`: drain an upload stream into memory while hashing it, so the
//!   same bytes can be persisted after the fingerprint is known

pub mod blake3;
pub mod payload;

pub use self::blake3::{hash_bytes, hash_from_hex, hash_reader, hash_to_hex, ContentHash, Hash};
pub use payload::{read_payload, Payload};
