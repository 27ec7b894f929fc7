//! Shared `env_logger` bootstrap for the library's own diagnostic logging and the `ppc-xenon-recomp`
//! binary, matching the teacher's use of `log` + `env_logger` rather than a bespoke logging facade.

/// Initializes the global logger from the `RUST_LOG` environment variable, defaulting to `info`
/// when unset. Safe to call more than once; only the first call has an effect.
pub fn init() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
