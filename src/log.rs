//! Crate-wide logging switch on top of the `log` facade.

use std::sync::atomic::{AtomicBool, Ordering};

/// Log target for protocol traffic (received commands and sent packets).
pub const PROTOCOL_TARGET: &str = "dbgp";

static ENABLED: AtomicBool = AtomicBool::new(true);

#[inline(always)]
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::SeqCst)
}

pub fn disable() {
    ENABLED.store(false, Ordering::SeqCst)
}

pub fn enable() {
    ENABLED.store(true, Ordering::SeqCst)
}

/// Install `env_logger` (driven by `RUST_LOG`), or switch crate logging off entirely
/// when `quiet` is set.
pub fn init(quiet: bool) {
    if quiet {
        disable();
        return;
    }
    enable();
    let _ = env_logger::Builder::from_default_env()
        .format_timestamp_millis()
        .try_init();
}

#[doc(hidden)]
#[macro_export]
macro_rules! _gated_log {
    ($log_fn: path, $($arg:tt)+) => {
        if $crate::log::is_enabled() {
            $log_fn!($($arg)+)
        }
    };
}

#[macro_export]
macro_rules! dbgp_info {
    ($($arg:tt)+) => { $crate::_gated_log!(log::info, $($arg)+) };
}

#[macro_export]
macro_rules! dbgp_warn {
    ($($arg:tt)+) => { $crate::_gated_log!(log::warn, $($arg)+) };
}

#[macro_export]
macro_rules! dbgp_error {
    ($($arg:tt)+) => { $crate::_gated_log!(log::error, $($arg)+) };
}

#[macro_export]
macro_rules! dbgp_debug {
    ($($arg:tt)+) => { $crate::_gated_log!(log::debug, $($arg)+) };
}
