//! `ppc_xenon_recomp` translates a PowerPC (Xenon/Xbox 360) executable's code sections into
//! semantically equivalent Rust source ahead of time: no guest instruction executes at run time.
//! Every guest basic block becomes a host function operating over an explicit [`Context`]
//! register file and a flat, big-endian-addressable guest [`memory`] buffer.
//!
//! This crate covers the translation pipeline and guest execution model only. The XEX image
//! loader, the PPC disassembler, and the host-shim library that implements guest syscalls are
//! external collaborators whose contracts this crate consumes ([`image::ImageSource`],
//! [`flow::Decoder`], [`trampoline::PpcFunc`]) rather than implements.

pub mod condition;
pub mod config;
pub mod context;
pub mod driver;
pub mod emit;
pub mod error;
pub mod flow;
pub mod fpscr;
pub mod image;
pub mod logging;
pub mod memory;
pub mod trampoline;
pub mod vector;

pub use config::{Config, ElisionProfile};
pub use context::Context;
pub use driver::{Driver, TranslationOutput};
pub use error::Error;
pub use memory::GuestMemory;
pub use trampoline::{FuncMapping, FunctionTable, PpcFunc, TrampolineLayout};
