//! Repository layer: query functions organized by table.

pub mod call_logs;
pub mod users;
