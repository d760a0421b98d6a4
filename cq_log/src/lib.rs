//! Text logging for the cq crates.
//!
//! * `trace`: per-chunk kernel detail, spammy.
//! * `debug`: plan shapes, cache hits/misses, strategy choices.
//! * `info`: query start/end, cache evictions.
//! * `warn`: degraded paths (e.g. falling back to scalar evaluation).
//! * `error`: fatal plan errors about to be returned to the caller.

// `tracing`'s macros support field capture and span scoping, which is why
// we build on it rather than the plain `log` facade.
pub use tracing::{debug, error, info, span, trace, warn, Level};

/// Installs a global `tracing` subscriber that writes to stderr, honoring
/// `CQ_LOG` (falling back to `RUST_LOG`) for per-target filtering.
///
/// Safe to call more than once; only the first call takes effect.
pub fn init() {
    use std::sync::Once;
    static START: Once = Once::new();
    START.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_env("CQ_LOG")
            .or_else(|_| tracing_subscriber::EnvFilter::try_from_env("RUST_LOG"))
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();
    });
}

/// Native-only profiling-style scope macro, kept as a no-op hook so hot
/// kernels can be annotated uniformly without pulling in a profiler here.
#[macro_export]
macro_rules! profile_function {
    () => {
        let _span = $crate::span!($crate::Level::TRACE, "fn", name = %{
            fn f() {}
            fn type_name_of<T>(_: T) -> &'static str {
                std::any::type_name::<T>()
            }
            let name = type_name_of(f);
            &name[..name.len() - 3]
        });
    };
}

#[macro_export]
macro_rules! profile_scope {
    ($name:expr) => {
        let _span = $crate::span!($crate::Level::TRACE, "scope", name = $name);
    };
}
