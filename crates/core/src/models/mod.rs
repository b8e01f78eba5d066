pub mod account;
pub mod student;
pub mod sync;
