//! Result tables and their serialized forms

pub mod json;
pub mod table;

pub use table::OutputTable;
