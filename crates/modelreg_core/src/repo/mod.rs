//! Repository layer over the metadata record tables.
//!
//! # Invariants
//! - Repositories are bound to one catalog type id at construction.
//! - Repository APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.

pub mod record_repo;
