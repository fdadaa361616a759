//! `spendwise-core`: expense domain building blocks.
//!
//! This crate contains **pure domain** types (no IO, no async). Stores, backends
//! and the analysis workflow live in the other workspace crates.

pub mod error;
pub mod expense;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use expense::{ExpenseRecord, ExpenseUpdate};
pub use id::{ExpenseId, OwnerId};
