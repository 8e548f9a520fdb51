//! VHData compute service
//!
//! Keeps lookup and rollup columns of user databases in sync with the rows
//! they derive from, and evaluates formula expressions over row documents.

pub mod api;
pub mod compute;
pub mod entity;
pub mod formula;
pub mod schema;
pub mod store;

#[cfg(test)]
pub(crate) mod testutil;
