//! This module provides an `Error` type for the crate using the [`thiserror`] crate.
use thiserror::Error;

/// The `Error` type, covering both translate-time failures (which abort translation with a
/// file+address context) and the run-time failures emitted code calls into a host trap shim to
/// report.
#[derive(Debug, Error)]
pub enum Error {
    /// A decoded instruction has no emitter implementation. Fatal at translate time.
    #[error("translation gap at {address:#010x}: unimplemented opcode `{opcode}`")]
    TranslationGap {
        /// The guest address of the offending instruction.
        address: u32,
        /// The opcode mnemonic reported by the disassembler collaborator.
        opcode: String,
    },
    /// Control-flow recovery could not assign a reachable target to a branch whose target
    /// address does not lie in any recovered function.
    #[error("unresolved branch at {address:#010x} targeting {target:#010x}")]
    UnresolvedBranch {
        /// The guest address of the branch instruction.
        address: u32,
        /// The guest address the branch targets.
        target: u32,
    },
    /// Run-time: an indirect call landed on a nil function-table slot.
    #[error("unresolved indirect call to guest address {0:#010x}")]
    UnresolvedIndirect(u32),
    /// The image loader collaborator rejected the input.
    #[error("bad image: {0}")]
    BadImage(String),
    /// The configuration file named an unrecognised flag, or two elision flags contradict.
    #[error("config error: {0}")]
    ConfigError(String),
    /// The emitter selected a host intrinsic unavailable at the target host SIMD level.
    #[error("host intrinsic `{intrinsic}` is unavailable on this target for opcode at {address:#010x}")]
    HostIntrinsicMiss {
        /// The guest address of the instruction that required the intrinsic.
        address: u32,
        /// The name of the unavailable host intrinsic.
        intrinsic: String,
    },
    /// Wraps [`std::io::Error`].
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Wraps [`toml::de::Error`].
    #[error(transparent)]
    TomlDecode(#[from] toml::de::Error),
}
