pub mod certs;
pub mod watch;
