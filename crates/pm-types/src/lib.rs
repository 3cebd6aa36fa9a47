//! Core types and traits for the puppet-master job API.
//!
//! Wire DTOs match the JSON the service returns under `/jobs`.

mod dto;
mod error;
mod traits;

pub use dto::*;
pub use error::*;
pub use traits::*;
