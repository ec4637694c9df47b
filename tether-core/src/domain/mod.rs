//! Domain models: backends, the registry that owns them, and client assignments.

pub mod assignment;
pub mod backend;
pub mod registry;
