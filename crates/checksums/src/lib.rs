#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `checksums` provides the streaming hash, comparison, retry, and hash-index
//! primitives the integrity checker (component C1) is built from.
//!
//! # Design
//!
//! - [`strong`] exposes SHA-256 and MD5 digests behind the [`strong::StrongDigest`]
//!   trait.
//! - [`hash_file`], [`compare_size`], [`compare_metadata`], and
//!   [`verify_with_retry`] are the per-file verification primitives the engine
//!   calls once per copied file, selected by the configured integrity method.
//! - [`load_hash_index`] reads an externally supplied SQLite hash index and
//!   builds a lookup table tolerant of path-spelling variants, so verification
//!   can prefer a precomputed digest over recomputing one from the source.
//!
//! # Errors
//!
//! All fallible operations return [`errors::MigrationError`] carrying one of
//! the `VERIFY_*` codes.

pub mod hash_index;
mod hashfile;
pub mod strong;

pub use hash_index::{generate_path_variants, load_hash_index};
pub use hashfile::{compare_metadata, compare_size, hash_file, mismatch_error, verify_with_retry, HashAlgorithm};
