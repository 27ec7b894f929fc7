//! This module provides [`Config`], the parsed form of the translation-run configuration file
//! (§6): the source image, the output directory, and the register-elision profile flags.
//!
//! Parsing goes through `serde` + `toml`, mirroring the original recompiler's use of `toml++`
//! (`original_source/XenonRecomp/pch.h`). Unknown keys are rejected outright — §6 states flatly
//! that "unrecognised flags are fatal" — via `#[serde(deny_unknown_fields)]` rather than a
//! hand-rolled key allowlist.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Error;

/// The register-elision profile flags from §3/§6. Each names a subset of [`crate::context::Context`]
/// fields that the active build promoted to a stack-local of every emitted function instead of a
/// `Context` field; the flag names match the Cargo feature names in `Cargo.toml` one-for-one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ElisionProfile {
    /// r0, r2, r11, r12, f0, v32..v63.
    pub non_argument_as_local: bool,
    /// r14..r31, f14..f31, v14..v31, v64..v127.
    pub non_volatile_as_local: bool,
    pub skip_lr: bool,
    pub skip_msr: bool,
    pub ctr_as_local: bool,
    pub xer_as_local: bool,
    pub reserved_as_local: bool,
    pub cr_as_local: bool,
}

impl ElisionProfile {
    /// The profile actually baked into this binary via its Cargo features. The emitter and
    /// `Context`'s field layout are a compile-time specialization (§9: "a run-time flag inside
    /// emitted code is unacceptable"), so this is the only profile a running translator can
    /// honor — [`Self::check_matches_compiled`] is what reconciles it against the config file.
    pub const fn compiled() -> Self {
        Self {
            non_argument_as_local: cfg!(feature = "non_argument_as_local"),
            non_volatile_as_local: cfg!(feature = "non_volatile_as_local"),
            skip_lr: cfg!(feature = "skip_lr"),
            skip_msr: cfg!(feature = "skip_msr"),
            ctr_as_local: cfg!(feature = "ctr_as_local"),
            xer_as_local: cfg!(feature = "xer_as_local"),
            reserved_as_local: cfg!(feature = "reserved_as_local"),
            cr_as_local: cfg!(feature = "cr_as_local"),
        }
    }

    /// Rejects a configured profile that does not match the profile this binary was compiled
    /// with. A config file can request a profile, but since the profile governs `Context`'s
    /// field layout at compile time, only a rebuild with the matching `--features` can actually
    /// honor a different one.
    pub fn check_matches_compiled(&self) -> Result<(), Error> {
        let compiled = Self::compiled();
        if *self != compiled {
            return Err(Error::ConfigError(format!(
                "configured elision profile {self:?} does not match the profile this binary \
                 was compiled with ({compiled:?}); rebuild with matching --features"
            )));
        }
        Ok(())
    }
}

/// The parsed configuration file: source image, output directory, and elision profile.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Path to the XEX image to translate.
    pub image: PathBuf,
    /// Directory the emitted source tree and `PPCFuncMappings` file are written to.
    pub out_dir: PathBuf,
    /// Register-elision profile. Defaults to eliding nothing.
    #[serde(default)]
    pub elision: ElisionProfile,
}

impl Config {
    /// Parses a configuration file from `path` and checks its elision profile against the one
    /// this binary was compiled with.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&text)?;
        config.elision.check_matches_compiled()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_elision_flag_is_rejected() {
        let toml = r#"
            image = "game.xex"
            out_dir = "out"

            [elision]
            not_a_real_flag = true
        "#;
        let err = toml::from_str::<Config>(toml).unwrap_err();
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    fn missing_elision_table_defaults_to_eliding_nothing() {
        let toml = r#"
            image = "game.xex"
            out_dir = "out"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.elision, ElisionProfile::default());
    }

    #[test]
    fn mismatched_profile_is_rejected() {
        let mut profile = ElisionProfile::compiled();
        profile.skip_lr = !profile.skip_lr;
        assert!(profile.check_matches_compiled().is_err());
    }
}
