pub mod config;
pub mod debugger;
pub mod host;
pub mod log;
pub mod playground;
