//! Data Transfer Objects (DTOs) for API requests and responses

pub mod billing;
pub mod common;
pub mod invoice;
pub mod payment;

pub use billing::*;
pub use common::*;
pub use invoice::*;
pub use payment::*;
