//! Report formatting and result files

pub mod json;
pub mod text;
