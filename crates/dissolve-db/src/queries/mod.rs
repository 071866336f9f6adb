pub mod companies;
pub mod tasks;
