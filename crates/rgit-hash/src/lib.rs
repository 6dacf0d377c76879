//! Object identity for the rgit version-control library.
//!
//! Provides the 20-byte `ObjectId` digest type with its 40-character hex
//! display codec, and SHA-1 object hashing.

mod error;
pub mod hasher;
mod oid;

pub use error::HashError;
pub use hasher::Hasher;
pub use oid::ObjectId;
