//! Types shared between the recognition client and anything speaking its HTTP contract.

pub mod domain;
pub mod error;
pub mod protocol;
