pub mod check;
pub mod digest;
pub mod summary;
