#![allow(unused_macros)]

macro_rules! trace {
    ($($t:tt)*) => {
        log!(trace, $($t)*)
    }
}

macro_rules! debug {
    ($($t:tt)*) => {
        log!(debug, $($t)*)
    }
}

macro_rules! info {
    ($($t:tt)*) => {
        log!(info, $($t)*)
    }
}

macro_rules! warn {
    ($($t:tt)*) => {
        log!(warn, $($t)*)
    }
}

macro_rules! error {
    ($($t:tt)*) => {
        log!(error, $($t)*)
    }
}

// Forwards to the `log` facade; without the feature the arguments are only
// type-checked so call sites stay warning free.
macro_rules! log {
    ($level: ident, $($t:tt)*) => {{
        #[cfg(feature = "log")]
        { ::log::$level!(target: "rsclearkey", $($t)*) }
        #[cfg(not(feature = "log"))]
        { if false { let _ = format_args!($($t)*); } }
    }}
}
