pub mod keys;
pub mod status;
pub mod watch;
