pub mod command;
pub mod dispatch;
pub mod file;
pub mod mates;
pub mod system;
