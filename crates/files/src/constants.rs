//! On-disk naming conventions owned by the store.
//!
//! Both prefixes start with `.`, which validated folder and file names never do, so store-owned
//! entries can never collide with client data.

/// Prefix of staging files written inside a folder before being renamed into place.
pub const STAGING_PREFIX: &str = ".upload-";

/// Suffix of staging files.
pub const STAGING_SUFFIX: &str = ".tmp";

/// Prefix of folders renamed out of the way by a delete-all, directly under the root.
pub const TOMBSTONE_PREFIX: &str = ".trash-";
