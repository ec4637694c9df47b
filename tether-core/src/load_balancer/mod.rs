//! Weighted selection and sticky routing.

pub mod affinity;
pub mod selector;
