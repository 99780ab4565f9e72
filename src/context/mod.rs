//! User Context Module
//!
//! A per-instance key/value bag that applications use to hand arbitrary objects to
//! their distributed-object code (for example, a service handle that a task needs).
//!
//! The store is seeded once from the configured template and is private to the owning
//! instance afterwards: two instances started from the same template never observe each
//! other's writes.

pub mod store;
