//! Route handlers

pub mod predict;
pub mod records;
pub mod subjects;
