//! The translation driver (C9): orders the passes — load the image, recover control flow, emit
//! each function, assemble the function table — and writes the emitted artifact tree plus the
//! `PPCFuncMappings` file (§4.7) to `Config::out_dir`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{error, info, warn};

use crate::config::Config;
use crate::emit::Emitter;
use crate::error::Error;
use crate::flow::{Decoder, FlowRecovery, Function};
use crate::image::ImageSource;
use crate::trampoline::{FunctionTable, TrampolineLayout};

/// Drives one translation run end to end.
pub struct Driver<'a> {
    config: &'a Config,
}

/// The result of a completed run: every function's emitted source, keyed by the symbol name the
/// driver assigned it, and the recovered function table layout (for callers that want to emit
/// their own `PPCFuncMappings` wiring rather than use [`Driver::write_artifact`]'s).
pub struct TranslationOutput {
    pub functions: BTreeMap<u32, (String, String)>,
    pub layout: TrampolineLayout,
}

impl<'a> Driver<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Runs control-flow recovery and emission over `image`, using `decoder` to decode
    /// instructions. Does not touch the filesystem; see [`Self::write_artifact`] for that.
    pub fn translate<D: Decoder>(
        &self,
        image: &dyn ImageSource,
        decoder: &D,
    ) -> Result<TranslationOutput, Error> {
        let recovery = FlowRecovery::new(image, decoder);
        let recovered = recovery.run();
        info!("control-flow recovery found {} function(s)", recovered.len());

        let layout = self.layout_for(image);
        let emitter = Emitter::new(&self.config.elision);

        let mut functions = BTreeMap::new();
        for (entry, function) in &recovered {
            let name = function_name(*entry);
            match emitter.emit_function(&name, &function.instrs, &function.local_labels) {
                Ok(source) => {
                    info!("translated {name} ({} instruction(s))", function.instrs.len());
                    functions.insert(*entry, (name, source));
                }
                Err(Error::TranslationGap { address, opcode }) => {
                    warn!(
                        "translation gap at {address:#010x} ({opcode}); leaving {name} unresolved"
                    );
                }
                Err(other) => {
                    error!("fatal error translating {name}: {other}");
                    return Err(other);
                }
            }
        }

        self.check_unresolved_targets(&recovered, &functions);

        Ok(TranslationOutput { functions, layout })
    }

    /// Warns about every branch/call target control-flow recovery discovered that did not end up
    /// with a translated function — §3's function-table invariant requires every *reachable*
    /// target be populated, but a target outside any code section (an import stub) legitimately
    /// never gets one; this only flags in-section misses.
    fn check_unresolved_targets(
        &self,
        recovered: &BTreeMap<u32, Function>,
        translated: &BTreeMap<u32, (String, String)>,
    ) {
        for entry in recovered.keys() {
            if !translated.contains_key(entry) {
                warn!("function at {entry:#010x} was recovered but never translated");
            }
        }
    }

    fn layout_for(&self, image: &dyn ImageSource) -> TrampolineLayout {
        let (image_base, image_size) = image
            .code_sections()
            .iter()
            .fold((u32::MAX, 0u32), |(base, end), section| {
                (base.min(section.base), end.max(section.end()))
            });
        let image_base = if image.code_sections().is_empty() { 0 } else { image_base };
        TrampolineLayout {
            image_base,
            image_size: image_size.saturating_sub(image_base),
            code_base: image_base,
        }
    }

    /// Writes the emitted artifact tree: one file per function under `out_dir/src/`, plus a
    /// `ppc_func_mappings.rs` defining `ppc_lookup_func` and the nil-terminated mapping table the
    /// emitted call sites resolve indirect branches through (§4.7).
    pub fn write_artifact(&self, output: &TranslationOutput) -> Result<(), Error> {
        let src_dir = self.config.out_dir.join("src");
        fs::create_dir_all(&src_dir)?;

        let mut module_names = Vec::new();
        for (name, source) in output.functions.values() {
            let path = src_dir.join(format!("{name}.rs"));
            fs::write(&path, source)?;
            module_names.push(name.clone());
        }
        self.write_mappings(&output.functions)?;
        module_names.push("ppc_func_mappings".to_string());
        self.write_module_root(&src_dir, &module_names)?;
        Ok(())
    }

    fn write_module_root(&self, src_dir: &Path, module_names: &[String]) -> Result<(), Error> {
        let mut out = String::new();
        out.push_str("// Generated by ppc-xenon-recomp. Do not edit.\n\n");
        for name in module_names {
            out.push_str(&format!("mod {name};\n"));
        }
        for name in module_names {
            out.push_str(&format!("pub use {name}::*;\n"));
        }
        fs::write(src_dir.join("mod.rs"), out)?;
        Ok(())
    }

    fn write_mappings(&self, functions: &BTreeMap<u32, (String, String)>) -> Result<(), Error> {
        let mut out = String::new();
        out.push_str("// Generated by ppc-xenon-recomp. Do not edit.\n\n");
        out.push_str("use crate::trampoline::PpcFunc;\n\n");
        out.push_str("pub static PPC_FUNC_MAPPINGS: &[(u32, PpcFunc)] = &[\n");
        for (guest, (name, _)) in functions {
            out.push_str(&format!("    ({guest:#010x}, super::{name}::{name}),\n"));
        }
        out.push_str("];\n\n");
        out.push_str(
            "pub fn ppc_lookup_func(guest: u32) -> Option<PpcFunc> {\n    PPC_FUNC_MAPPINGS\n        .binary_search_by_key(&guest, |(addr, _)| *addr)\n        .ok()\n        .map(|i| PPC_FUNC_MAPPINGS[i].1)\n}\n",
        );
        fs::write(self.out_dir().join("src").join("ppc_func_mappings.rs"), out)?;
        Ok(())
    }

    fn out_dir(&self) -> &PathBuf {
        &self.config.out_dir
    }
}

fn function_name(address: u32) -> String {
    format!("fn_{address:08x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::opcode::{BranchCondition, DecodedInstr, InstrKind, IntOp};
    use crate::image::{CodeSection, StaticImage};
    use std::collections::HashMap;

    struct FixedDecoder {
        instrs: HashMap<u32, DecodedInstr>,
    }

    impl Decoder for FixedDecoder {
        fn decode(&self, address: u32) -> Option<DecodedInstr> {
            self.instrs.get(&address).cloned()
        }
    }

    fn sample_config(out_dir: PathBuf) -> Config {
        Config {
            image: PathBuf::from("unused.xex"),
            out_dir,
            elision: Default::default(),
        }
    }

    #[test]
    fn translate_emits_one_function_per_recovered_entry() {
        let entry = 0x1000;
        let mut instrs = HashMap::new();
        instrs.insert(
            entry,
            DecodedInstr {
                address: entry,
                length: 4,
                kind: InstrKind::Integer {
                    op: IntOp::AddImmediate(1),
                    rd: 3,
                    ra: 3,
                    rb: None,
                    rc: false,
                    oe: false,
                },
            },
        );
        instrs.insert(
            entry + 4,
            DecodedInstr {
                address: entry + 4,
                length: 4,
                kind: InstrKind::BranchToLink { link: false, condition: BranchCondition::Always },
            },
        );
        let decoder = FixedDecoder { instrs };
        let image = StaticImage {
            code_sections: vec![CodeSection { base: 0x1000, data: vec![0u8; 0x100] }],
            entry_point: entry,
            imports: Vec::new(),
            symbols: Vec::new(),
        };

        let config = sample_config(PathBuf::from("/tmp/does-not-matter"));
        let driver = Driver::new(&config);
        let output = driver.translate(&image, &decoder).unwrap();

        assert_eq!(output.functions.len(), 1);
        let (name, source) = &output.functions[&entry];
        assert_eq!(name, "fn_00001000");
        assert!(source.contains("pub unsafe extern \"C\" fn fn_00001000"));
    }

    #[test]
    fn write_artifact_produces_one_file_per_function_and_a_mapping_table() {
        use std::sync::atomic::{AtomicU32, Ordering};
        static COUNTER: AtomicU32 = AtomicU32::new(0);
        let tmp = std::env::temp_dir().join(format!(
            "ppc-xenon-recomp-test-{}-{}",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        let config = sample_config(tmp.clone());
        let driver = Driver::new(&config);

        let mut functions = BTreeMap::new();
        functions.insert(
            0x2000u32,
            ("fn_00002000".to_string(), "pub fn stub() {}".to_string()),
        );
        let output = TranslationOutput {
            functions,
            layout: TrampolineLayout { image_base: 0x2000, image_size: 0x1000, code_base: 0x2000 },
        };

        driver.write_artifact(&output).unwrap();
        assert!(tmp.join("src").join("fn_00002000.rs").is_file());
        assert!(tmp.join("src").join("mod.rs").is_file());
        assert!(tmp.join("src").join("ppc_func_mappings.rs").is_file());

        let _ = fs::remove_dir_all(&tmp);
    }
}
