//! Backend health: records, the atomically published snapshot store, and the
//! background prober that feeds it.

pub mod prober;
pub mod record;
pub mod store;
