//! Route handlers, one module per resource.

pub mod health;
pub mod profiles;
pub mod reports;
pub mod runs;
pub mod scorers;
pub mod upload;
