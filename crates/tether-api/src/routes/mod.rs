//! API route modules.

pub mod calls;
pub mod health;
