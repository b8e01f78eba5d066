pub mod check;
pub mod init;
pub mod logging;
pub mod sync;
