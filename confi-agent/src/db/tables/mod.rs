//! Database model modules - extends Database with domain-specific methods
//!
//! Each module adds `impl Database` blocks with methods for a specific table group.

mod cache;    // cache_entries (key/value JSON state)
mod memories; // memories (seen posts and agent replies)
