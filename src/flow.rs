//! Control-flow recovery (C7): discovers guest function boundaries and the branch edges within
//! and across them, from nothing but the entry point, the exported symbol table, and a linear
//! decode of each code section (§4.6).
//!
//! This is a worklist algorithm, not a CFG reconstruction from a relocation table: PPC's `bl`
//! gives no structural hint beyond "this address is a function", so every candidate entry comes
//! from either the image's declared symbols or a discovered `bl`/`b` target that control flow
//! recovery decides belongs to a different function than its predecessor (§4.6 step 2).

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::emit::opcode::{BranchCondition, DecodedInstr, InstrKind};
use crate::image::ImageSource;

/// One recovered guest function: its entry address, the instructions belonging to it in address
/// order, and the addresses within it that are targets of some branch (local or otherwise) — the
/// emitter needs the latter to decide where to start a new dispatch block (§4.5).
#[derive(Debug, Clone)]
pub struct Function {
    pub entry: u32,
    pub instrs: Vec<DecodedInstr>,
    pub local_labels: BTreeSet<u32>,
}

impl Function {
    /// The address one past this function's last instruction.
    pub fn end(&self) -> u32 {
        self.instrs
            .last()
            .map(|i| i.address + i.length as u32)
            .unwrap_or(self.entry)
    }
}

/// The decoder collaborator control-flow recovery drives: given an address, decode the single
/// instruction starting there. A real implementation wraps whatever PPC disassembler the pack's
/// loader work supplies; this crate only consumes the shape (§1).
pub trait Decoder {
    fn decode(&self, address: u32) -> Option<DecodedInstr>;
}

/// Recovers every reachable function in `image`, starting from its entry point and exported
/// symbols (§4.6 step 1), linearly decoding forward from each worklist entry until a function
/// boundary (§4.6 step 2), and resolving cross-function edges against the set of discovered
/// entries (§4.6 step 3). Ties — two discovered entries claiming the same address — are broken in
/// favor of whichever was discovered first (§4.6's "earliest-discovered wins").
pub struct FlowRecovery<'a, D: Decoder> {
    image: &'a dyn ImageSource,
    decoder: &'a D,
}

impl<'a, D: Decoder> FlowRecovery<'a, D> {
    pub fn new(image: &'a dyn ImageSource, decoder: &'a D) -> Self {
        Self { image, decoder }
    }

    /// Runs recovery to completion and returns every discovered function, keyed by entry address
    /// for deterministic iteration order.
    pub fn run(&self) -> BTreeMap<u32, Function> {
        let mut entries: VecDeque<u32> = VecDeque::new();
        let mut seen_entries: BTreeSet<u32> = BTreeSet::new();

        let mut seed = |addr: u32, entries: &mut VecDeque<u32>, seen: &mut BTreeSet<u32>| {
            if seen.insert(addr) {
                entries.push_back(addr);
            }
        };
        seed(self.image.entry_point(), &mut entries, &mut seen_entries);
        for symbol in self.image.symbols() {
            seed(symbol.address, &mut entries, &mut seen_entries);
        }

        let mut functions: BTreeMap<u32, Function> = BTreeMap::new();

        while let Some(entry) = entries.pop_front() {
            if functions.contains_key(&entry) {
                continue;
            }
            if self.image.section_containing(entry).is_none() {
                // A branch/symbol pointing outside any code section (e.g. an import stub) is not
                // something this crate can recover a body for; leave it unresolved for the driver
                // to report.
                continue;
            }

            let instrs = self.linear_decode(entry, &functions);
            let (local_labels, cross_function_targets) = self.classify_targets(&instrs);
            for addr in &cross_function_targets {
                if seen_entries.insert(*addr) {
                    entries.push_back(*addr);
                }
            }

            functions.insert(
                entry,
                Function {
                    entry,
                    instrs,
                    local_labels,
                },
            );
        }

        functions
    }

    /// Decodes forward from `entry` until a function-boundary instruction (unconditional `blr`
    /// with no pending conditional fallthrough, a direct branch, or fallthrough into the entry of
    /// an already-fully-recovered function) or the decoder runs out of instructions. Branch
    /// targets are *not* consulted here — whether a target belongs to this function or to another
    /// one can only be decided once the whole body is known (§4.6 step 2), which `classify_targets`
    /// does once this scan is complete. Consulting the worklist (addresses merely queued, not yet
    /// resolved) here would wrongly treat this function's own later local labels as external
    /// boundaries and truncate the body before reaching them.
    fn linear_decode(&self, entry: u32, functions: &BTreeMap<u32, Function>) -> Vec<DecodedInstr> {
        let mut instrs = Vec::new();
        let mut addr = entry;

        loop {
            if addr != entry && functions.contains_key(&addr) {
                // Fallthrough into another function's already-recovered entry point terminates
                // this one.
                break;
            }
            let Some(instr) = self.decoder.decode(addr) else {
                break;
            };
            let length = instr.length as u32;
            let terminates = self.terminates_function(&instr);

            instrs.push(instr);

            if terminates {
                break;
            }
            addr += length;
        }

        instrs
    }

    /// Whether `instr` ends the function it's in: an unconditional return-to-link (`blr` with no
    /// condition), an unconditional direct branch (tail call — control never falls through), or an
    /// unconditional branch-to-count (tail call via CTR).
    fn terminates_function(&self, instr: &DecodedInstr) -> bool {
        match &instr.kind {
            InstrKind::Branch { .. } => true,
            InstrKind::BranchToLink { condition: BranchCondition::Always, .. } => true,
            InstrKind::BranchToCount { condition: BranchCondition::Always, .. } => true,
            _ => false,
        }
    }

    /// Splits every branch target referenced by `instrs` into local labels (targets that land
    /// inside this function's own body, the emitter's dispatch-block split points, §4.5) and
    /// cross-function targets (targets outside it, new candidate function entries, §4.6 step 3).
    /// This can only run after the full body is known — a target can't be classified while still
    /// mid-scan, since later instructions in the same linear decode may yet bring it into the body.
    fn classify_targets(&self, instrs: &[DecodedInstr]) -> (BTreeSet<u32>, BTreeSet<u32>) {
        let body: BTreeSet<u32> = instrs.iter().map(|i| i.address).collect();
        let mut local_labels = BTreeSet::new();
        let mut cross_function = BTreeSet::new();
        for instr in instrs {
            let target = match &instr.kind {
                InstrKind::Branch { target, .. } => Some(*target),
                InstrKind::BranchConditional { target, .. } => Some(*target),
                _ => None,
            };
            if let Some(target) = target {
                if body.contains(&target) {
                    local_labels.insert(target);
                } else {
                    cross_function.insert(target);
                }
            }
        }
        (local_labels, cross_function)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::opcode::{CrBit, IntOp};
    use crate::image::{CodeSection, StaticImage, Symbol};
    use std::collections::HashMap;

    /// A decoder backed by a fixed address -> instruction map, for deterministic tests.
    struct FixedDecoder {
        instrs: HashMap<u32, DecodedInstr>,
    }

    impl Decoder for FixedDecoder {
        fn decode(&self, address: u32) -> Option<DecodedInstr> {
            self.instrs.get(&address).cloned()
        }
    }

    fn image_with_section(base: u32, len: usize, entry: u32) -> StaticImage {
        StaticImage {
            code_sections: vec![CodeSection { base, data: vec![0u8; len] }],
            entry_point: entry,
            imports: Vec::new(),
            symbols: Vec::new(),
        }
    }

    #[test]
    fn a_straight_line_function_terminates_at_its_blr() {
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
                kind: InstrKind::BranchToLink {
                    link: false,
                    condition: BranchCondition::Always,
                },
            },
        );
        let decoder = FixedDecoder { instrs };
        let image = image_with_section(0x1000, 0x100, entry);
        let recovery = FlowRecovery::new(&image, &decoder);
        let functions = recovery.run();

        assert_eq!(functions.len(), 1);
        let f = &functions[&entry];
        assert_eq!(f.instrs.len(), 2);
        assert_eq!(f.end(), entry + 8);
    }

    #[test]
    fn a_direct_branch_seeds_a_new_function_entry() {
        let entry = 0x2000;
        let callee = 0x3000;
        let mut instrs = HashMap::new();
        instrs.insert(
            entry,
            DecodedInstr {
                address: entry,
                length: 4,
                kind: InstrKind::BranchConditional {
                    target: callee,
                    link: true,
                    condition: BranchCondition::IfSet { field: 0, bit: CrBit::Eq },
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
        instrs.insert(
            callee,
            DecodedInstr {
                address: callee,
                length: 4,
                kind: InstrKind::BranchToLink { link: false, condition: BranchCondition::Always },
            },
        );
        let decoder = FixedDecoder { instrs };
        let image = StaticImage {
            code_sections: vec![CodeSection { base: 0x2000, data: vec![0u8; 0x2000] }],
            entry_point: entry,
            imports: Vec::new(),
            symbols: vec![Symbol { address: callee, name: "callee".into() }],
        };
        let recovery = FlowRecovery::new(&image, &decoder);
        let functions = recovery.run();

        assert!(functions.contains_key(&entry));
        assert!(functions.contains_key(&callee));
    }

    #[test]
    fn a_branch_target_outside_any_code_section_is_skipped_not_panicked() {
        let entry = 0x4000;
        let mut instrs = HashMap::new();
        instrs.insert(
            entry,
            DecodedInstr {
                address: entry,
                length: 4,
                kind: InstrKind::Branch { target: 0xDEAD_0000, link: false },
            },
        );
        let decoder = FixedDecoder { instrs };
        let image = image_with_section(0x4000, 0x100, entry);
        let recovery = FlowRecovery::new(&image, &decoder);
        let functions = recovery.run();

        assert_eq!(functions.len(), 1);
        assert!(!functions.contains_key(&0xDEAD_0000));
    }

    #[test]
    fn local_backward_branch_is_recorded_as_a_label_not_a_new_function() {
        let entry = 0x5000;
        let mut instrs = HashMap::new();
        instrs.insert(
            entry,
            DecodedInstr {
                address: entry,
                length: 4,
                kind: InstrKind::Integer {
                    op: IntOp::AddImmediate(-1),
                    rd: 3,
                    ra: 3,
                    rb: None,
                    rc: true,
                    oe: false,
                },
            },
        );
        instrs.insert(
            entry + 4,
            DecodedInstr {
                address: entry + 4,
                length: 4,
                kind: InstrKind::BranchConditional {
                    target: entry,
                    link: false,
                    condition: BranchCondition::IfClear { field: 0, bit: CrBit::Eq },
                },
            },
        );
        instrs.insert(
            entry + 8,
            DecodedInstr {
                address: entry + 8,
                length: 4,
                kind: InstrKind::BranchToLink { link: false, condition: BranchCondition::Always },
            },
        );
        let decoder = FixedDecoder { instrs };
        let image = image_with_section(0x5000, 0x100, entry);
        let recovery = FlowRecovery::new(&image, &decoder);
        let functions = recovery.run();

        assert_eq!(functions.len(), 1);
        let f = &functions[&entry];
        assert!(f.local_labels.contains(&entry));
    }

    /// A forward conditional branch to a later address in the *same* function must not truncate
    /// that function's body, even when the target address is also independently seeded (here via
    /// the symbol table, to put it in the worklist before this function is ever decoded). Before
    /// the fix this address would already be in `seen_entries` by the time the scan reached it,
    /// so the scan would stop short of the real terminator and the emitted `pc = {target}` would
    /// have no matching local label.
    #[test]
    fn forward_local_branch_to_a_preseeded_address_does_not_truncate_the_function() {
        let entry = 0x6000;
        let target = entry + 8;
        let mut instrs = HashMap::new();
        instrs.insert(
            entry,
            DecodedInstr {
                address: entry,
                length: 4,
                kind: InstrKind::BranchConditional {
                    target,
                    link: false,
                    condition: BranchCondition::IfSet { field: 0, bit: CrBit::Eq },
                },
            },
        );
        instrs.insert(
            entry + 4,
            DecodedInstr {
                address: entry + 4,
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
            target,
            DecodedInstr {
                address: target,
                length: 4,
                kind: InstrKind::BranchToLink { link: false, condition: BranchCondition::Always },
            },
        );
        let decoder = FixedDecoder { instrs };
        let image = StaticImage {
            code_sections: vec![CodeSection { base: 0x6000, data: vec![0u8; 0x100] }],
            entry_point: entry,
            imports: Vec::new(),
            symbols: vec![Symbol { address: target, name: "also_a_label".into() }],
        };
        let recovery = FlowRecovery::new(&image, &decoder);
        let functions = recovery.run();

        let f = &functions[&entry];
        assert_eq!(f.end(), target + 4);
        assert!(f.local_labels.contains(&target));
    }
}
