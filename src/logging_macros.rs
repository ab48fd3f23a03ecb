#![warn(clippy::all, rust_2018_idioms)]

/// Run-scoped logging macros.
///
/// Every event carries the run id and foreground flag of the `RunContext` it
/// was emitted for, plus the module and line, so interleaved foreground and
/// background runs can be told apart in the log file.
#[macro_export]
macro_rules! run_debug {
    ($ctx:expr, $($arg:tt)*) => {
        tracing::debug!(
            run = %$ctx.run_id(),
            foreground = $ctx.is_foreground(),
            "[{}:{}] {}", module_path!(), line!(), format!($($arg)*)
        )
    };
}

#[macro_export]
macro_rules! run_info {
    ($ctx:expr, $($arg:tt)*) => {
        tracing::info!(
            run = %$ctx.run_id(),
            foreground = $ctx.is_foreground(),
            "[{}:{}] {}", module_path!(), line!(), format!($($arg)*)
        )
    };
}

#[macro_export]
macro_rules! run_warn {
    ($ctx:expr, $($arg:tt)*) => {
        tracing::warn!(
            run = %$ctx.run_id(),
            foreground = $ctx.is_foreground(),
            "[{}:{}] {}", module_path!(), line!(), format!($($arg)*)
        )
    };
}
