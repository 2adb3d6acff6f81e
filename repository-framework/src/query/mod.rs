pub mod builder;
pub mod join;
pub mod sort;
