//! The instruction emitter (C6): turns a decoded instruction stream into Rust source text for one
//! guest function, parameterised by the active [`ElisionProfile`] (§4.5).
//!
//! Each emitted function compiles to the [`crate::trampoline::PpcFunc`] calling convention and is
//! structured as a `loop` dispatching on a `pc` local by guest address — the idiomatic-Rust
//! analogue of the original's `goto`-per-label C++ output, since stable Rust has no computed
//! goto. A same-function branch becomes `pc = target; continue;`; a branch leaving the function
//! becomes a function-table lookup and tail call (§4.6 step 3).

pub mod opcode;

use std::collections::BTreeSet;
use std::fmt::Write as _;

pub use opcode::{
    BarrierKind, BranchCondition, CrBit, CrFieldIndex, DecodedInstr, InstrKind, IntOp, IntOperand,
    MemWidth, RegIndex,
};

use crate::config::ElisionProfile;
use crate::error::Error;

/// Lowers a decoded instruction stream into the Rust source of one guest function body.
///
/// Every register reference goes through an `*_expr` helper that consults the active
/// [`ElisionProfile`]: a register the profile promoted to a stack-local is named directly
/// (`r14`), one left in `Context` is addressed through `ctx` (`ctx.r14`). [`Self::local_declarations`]
/// declares exactly the locals a given instruction stream needs.
pub struct Emitter<'a> {
    profile: &'a ElisionProfile,
}

impl<'a> Emitter<'a> {
    pub fn new(profile: &'a ElisionProfile) -> Self {
        Self { profile }
    }

    /// Emits the full host function for a guest function occupying `instrs` (in ascending
    /// address order). `local_labels` are the addresses inside this function that are
    /// branch targets — every other address control-flow recovery decided to land on becomes a
    /// plain fallthrough with no dispatch arm of its own.
    pub fn emit_function(
        &self,
        name: &str,
        instrs: &[DecodedInstr],
        local_labels: &BTreeSet<u32>,
    ) -> Result<String, Error> {
        let mut out = String::new();
        writeln!(out, "#[no_mangle]").unwrap();
        writeln!(
            out,
            "pub unsafe extern \"C\" fn {name}(ctx: &mut crate::context::Context, base: *mut u8) {{"
        )
        .unwrap();

        for local in self.local_declarations(instrs) {
            writeln!(out, "    {local}").unwrap();
        }

        let entry = instrs.first().map(|i| i.address).unwrap_or(0);
        writeln!(out, "    let mut pc: u32 = {entry:#010x};").unwrap();
        writeln!(out, "    loop {{").unwrap();
        writeln!(out, "        match pc {{").unwrap();

        let mut blocks: Vec<(u32, String)> = Vec::new();
        let mut current_addr = entry;
        let mut body = String::new();
        for (i, instr) in instrs.iter().enumerate() {
            if local_labels.contains(&instr.address) && instr.address != current_addr {
                blocks.push((current_addr, std::mem::take(&mut body)));
                current_addr = instr.address;
            }
            let next = instrs.get(i + 1).map(|n| n.address);
            self.emit_instr(&mut body, instr, next)?;
        }
        blocks.push((current_addr, body));

        for (addr, body) in &blocks {
            writeln!(out, "            {addr:#010x} => {{").unwrap();
            out.push_str(body);
            writeln!(out, "            }}").unwrap();
        }
        writeln!(
            out,
            "            _ => unreachable!(\"no block for pc {{:#010x}} in {name}\", pc),"
        )
        .unwrap();
        writeln!(out, "        }}").unwrap();
        writeln!(out, "    }}").unwrap();
        writeln!(out, "}}").unwrap();
        Ok(out)
    }

    /// Declares a stack-local for every register the active profile promoted out of `Context`
    /// that this function actually touches, zero-initialized at entry. Correctness of carrying a
    /// value in such a local *across a call* is the emitter's and the trampoline call-boundary
    /// codegen's joint responsibility (§3's "selective elision" contract); a single function's
    /// straight-line body emitted here never needs to, since it either returns or tail-calls out.
    fn local_declarations(&self, instrs: &[DecodedInstr]) -> Vec<String> {
        let mut decls = Vec::new();
        let mut gprs = BTreeSet::new();
        let mut crs = BTreeSet::new();
        let mut needs_lr = false;
        let mut needs_ctr = false;
        let mut needs_xer = false;
        let mut needs_reserved = false;

        for instr in instrs {
            for reg in instr.kind.referenced_gprs() {
                if self.gpr_is_local(reg) {
                    gprs.insert(reg);
                }
            }
            if self.cr_is_local() {
                for field in instr.kind.referenced_cr_fields() {
                    crs.insert(field);
                }
            }
            needs_lr |= self.lr_is_local() && instr.kind.references_lr();
            needs_ctr |= self.ctr_is_local() && instr.kind.references_ctr();
            needs_xer |= self.xer_is_local() && instr.kind.references_xer();
            needs_reserved |= self.reserved_is_local() && instr.kind.references_reserved();
        }

        for r in gprs {
            decls.push(format!(
                "let mut r{r}: crate::context::Register = crate::context::Register::default();"
            ));
        }
        for f in crs {
            decls.push(format!(
                "let mut cr{f}: crate::context::CrField = crate::context::CrField::default();"
            ));
        }
        if needs_lr {
            decls.push("let mut lr: u64 = 0;".to_string());
        }
        if needs_ctr {
            decls.push(
                "let mut ctr: crate::context::Register = crate::context::Register::default();"
                    .to_string(),
            );
        }
        if needs_xer {
            decls.push(
                "let mut xer: crate::context::XerRegister = crate::context::XerRegister::default();"
                    .to_string(),
            );
        }
        if needs_reserved {
            decls.push(
                "let mut reserved: crate::context::Register = crate::context::Register::default();"
                    .to_string(),
            );
        }
        decls
    }

    fn gpr_is_local(&self, index: RegIndex) -> bool {
        match index {
            0 | 2 | 11 | 12 => self.profile.non_argument_as_local,
            14..=31 => self.profile.non_volatile_as_local,
            _ => false,
        }
    }

    fn gpr_expr(&self, index: RegIndex) -> String {
        if self.gpr_is_local(index) {
            format!("r{index}")
        } else {
            format!("ctx.r{index}")
        }
    }

    fn cr_is_local(&self) -> bool {
        self.profile.cr_as_local
    }

    fn cr_expr(&self, field: CrFieldIndex) -> String {
        if self.cr_is_local() {
            format!("cr{field}")
        } else {
            format!("ctx.cr{field}")
        }
    }

    fn lr_is_local(&self) -> bool {
        self.profile.skip_lr
    }

    fn lr_expr(&self) -> String {
        if self.lr_is_local() {
            "lr".to_string()
        } else {
            "ctx.lr".to_string()
        }
    }

    fn ctr_is_local(&self) -> bool {
        self.profile.ctr_as_local
    }

    fn ctr_expr(&self) -> String {
        if self.ctr_is_local() {
            "ctr".to_string()
        } else {
            "ctx.ctr".to_string()
        }
    }

    fn xer_is_local(&self) -> bool {
        self.profile.xer_as_local
    }

    fn xer_expr(&self) -> String {
        if self.xer_is_local() {
            "xer".to_string()
        } else {
            "ctx.xer".to_string()
        }
    }

    fn reserved_is_local(&self) -> bool {
        self.profile.reserved_as_local
    }

    fn reserved_expr(&self) -> String {
        if self.reserved_is_local() {
            "reserved".to_string()
        } else {
            "ctx.reserved".to_string()
        }
    }

    fn emit_instr(
        &self,
        out: &mut String,
        instr: &DecodedInstr,
        next: Option<u32>,
    ) -> Result<(), Error> {
        match &instr.kind {
            InstrKind::Integer { op, rd, ra, rb, rc, oe } => {
                self.emit_integer(out, instr.address, *op, *rd, *ra, *rb, *rc, *oe)?;
                self.emit_fallthrough(out, next);
            }
            InstrKind::Load { width, signed, rd, ra, disp } => {
                self.emit_load(out, *width, *signed, *rd, *ra, *disp);
                self.emit_fallthrough(out, next);
            }
            InstrKind::Store { width, rs, ra, disp } => {
                self.emit_store(out, *width, *rs, *ra, *disp);
                self.emit_fallthrough(out, next);
            }
            InstrKind::LoadReserve { width, rd, ra, rb } => {
                let addr = format!(
                    "({}.u32().wrapping_add({}.u32()))",
                    self.gpr_expr(*ra),
                    self.gpr_expr(*rb)
                );
                let call = match width {
                    MemWidth::U32 => "reservation_load_u32",
                    MemWidth::U64 => "reservation_load_u64",
                    _ => {
                        return Err(Error::TranslationGap {
                            address: instr.address,
                            opcode: "lxarx".into(),
                        })
                    }
                };
                writeln!(
                    out,
                    "                let __addr = {addr};\n                {}.set_u32(__addr);\n                {}.set_u64(crate::memory::{call}(base, __addr) as u64);",
                    self.reserved_expr(),
                    self.gpr_expr(*rd)
                )
                .unwrap();
                self.emit_fallthrough(out, next);
            }
            InstrKind::StoreConditional { width, rs, ra, rb } => {
                let addr = format!(
                    "({}.u32().wrapping_add({}.u32()))",
                    self.gpr_expr(*ra),
                    self.gpr_expr(*rb)
                );
                let (call, cast) = match width {
                    MemWidth::U32 => ("reservation_store_u32", "u32"),
                    MemWidth::U64 => ("reservation_store_u64", "u64"),
                    _ => {
                        return Err(Error::TranslationGap {
                            address: instr.address,
                            opcode: "stcx.".into(),
                        })
                    }
                };
                let cr0 = self.cr_expr(0);
                writeln!(
                    out,
                    "                let __addr = {addr};\n                let __ok = crate::memory::{call}(base, __addr, {}.u32(), {}.{cast}());\n                {cr0}.lt = false;\n                {cr0}.gt = false;\n                {cr0}.eq = __ok;\n                {cr0}.so_or_un = {}.so;",
                    self.reserved_expr(),
                    self.gpr_expr(*rs),
                    self.xer_expr(),
                )
                .unwrap();
                self.emit_fallthrough(out, next);
            }
            InstrKind::CompareInt { field, signed, ra, rb_or_imm } => {
                let field = self.cr_expr(*field);
                let right = match rb_or_imm {
                    IntOperand::Reg(r) => self.gpr_expr(*r),
                    IntOperand::Immediate(imm) => {
                        format!("crate::context::Register::from_bits({imm}i64 as u64)")
                    }
                };
                let (lhs, rhs) = if *signed {
                    (format!("{}.s64()", self.gpr_expr(*ra)), format!("{right}.s64()"))
                } else {
                    (format!("{}.u64()", self.gpr_expr(*ra)), format!("{right}.u64()"))
                };
                writeln!(
                    out,
                    "                {field}.compare({lhs}, {rhs}, &{});",
                    self.xer_expr()
                )
                .unwrap();
                self.emit_fallthrough(out, next);
            }
            InstrKind::CompareFp { field, fa, fb } => {
                let field = self.cr_expr(*field);
                writeln!(
                    out,
                    "                {field}.compare_fp(ctx.f{fa}.f64(), ctx.f{fb}.f64());"
                )
                .unwrap();
                self.emit_fallthrough(out, next);
            }
            InstrKind::Branch { target, link } => {
                self.emit_link(out, *link, next);
                writeln!(out, "                pc = {target:#010x};\n                continue;").unwrap();
            }
            InstrKind::BranchConditional { target, link, condition } => {
                let cond = self.branch_condition_expr(*condition);
                writeln!(out, "                if {cond} {{").unwrap();
                self.emit_link(out, *link, next);
                writeln!(
                    out,
                    "                    pc = {target:#010x};\n                    continue;\n                }}"
                )
                .unwrap();
                self.emit_fallthrough(out, next);
            }
            InstrKind::BranchToLink { link, condition } => {
                let cond = self.branch_condition_expr(*condition);
                writeln!(out, "                if {cond} {{").unwrap();
                writeln!(out, "                    let __target = {} as u32;", self.lr_expr()).unwrap();
                self.emit_link(out, *link, next);
                self.emit_tail_call(out, "__target");
                writeln!(out, "                }}").unwrap();
                self.emit_fallthrough(out, next);
            }
            InstrKind::BranchToCount { link, condition } => {
                let cond = self.branch_condition_expr(*condition);
                writeln!(out, "                if {cond} {{").unwrap();
                writeln!(out, "                    let __target = {}.u32();", self.ctr_expr()).unwrap();
                self.emit_link(out, *link, next);
                self.emit_tail_call(out, "__target");
                writeln!(out, "                }}").unwrap();
                self.emit_fallthrough(out, next);
            }
            InstrKind::Barrier(kind) => {
                let call = match kind {
                    BarrierKind::Sync | BarrierKind::LightweightSync | BarrierKind::InstructionSync => {
                        "crate::memory::fence();"
                    }
                    BarrierKind::Eieio => "crate::memory::eieio();",
                };
                writeln!(out, "                {call}").unwrap();
                self.emit_fallthrough(out, next);
            }
            InstrKind::Unimplemented { mnemonic } => {
                return Err(Error::TranslationGap {
                    address: instr.address,
                    opcode: (*mnemonic).to_string(),
                });
            }
        }
        Ok(())
    }

    /// Emits an integer arithmetic/logical op (§4.5). The overflow-setting (`o`) form
    /// (`addo`/`subfo`/`mullwo`) is only defined for `Add`/`Subf`/`Mullw` on real PPC hardware —
    /// there is no `o`-form of an immediate or logical op — so `oe` set on any other op is a
    /// translation gap rather than a silent no-op.
    fn emit_integer(
        &self,
        out: &mut String,
        address: u32,
        op: IntOp,
        rd: RegIndex,
        ra: RegIndex,
        rb: Option<RegIndex>,
        rc: bool,
        oe: bool,
    ) -> Result<(), Error> {
        let dst = self.gpr_expr(rd);
        let a = self.gpr_expr(ra);

        if oe {
            let overflowing = match op {
                IntOp::Add => {
                    format!("{a}.s32().overflowing_add({}.s32())", self.gpr_expr(rb.unwrap()))
                }
                IntOp::Subf => {
                    format!("{}.s32().overflowing_sub({a}.s32())", self.gpr_expr(rb.unwrap()))
                }
                IntOp::Mullw => {
                    format!("{a}.s32().overflowing_mul({}.s32())", self.gpr_expr(rb.unwrap()))
                }
                IntOp::AddImmediate(_) | IntOp::And | IntOp::Or | IntOp::Xor => {
                    return Err(Error::TranslationGap {
                        address,
                        opcode: format!("{op:?} with oe set"),
                    });
                }
            };
            let xer = self.xer_expr();
            writeln!(
                out,
                "                let (__r, __ov) = {overflowing};\n                {dst}.set_u32(__r as u32);\n                {xer}.ov = __ov;\n                {xer}.so |= __ov;"
            )
            .unwrap();
            if rc {
                writeln!(out, "                {}.compare(__r as i64, 0i64, &{xer});", self.cr_expr(0))
                    .unwrap();
            }
            return Ok(());
        }

        let expr = match op {
            IntOp::Add => format!("{a}.u32().wrapping_add({}.u32())", self.gpr_expr(rb.unwrap())),
            IntOp::AddImmediate(imm) => format!("{a}.u32().wrapping_add({imm}i32 as u32)"),
            IntOp::Subf => format!("{}.u32().wrapping_sub({a}.u32())", self.gpr_expr(rb.unwrap())),
            IntOp::Mullw => format!(
                "({a}.s32() as i64 * {}.s32() as i64) as u32",
                self.gpr_expr(rb.unwrap())
            ),
            IntOp::And => format!("{a}.u32() & {}.u32()", self.gpr_expr(rb.unwrap())),
            IntOp::Or => format!("{a}.u32() | {}.u32()", self.gpr_expr(rb.unwrap())),
            IntOp::Xor => format!("{a}.u32() ^ {}.u32()", self.gpr_expr(rb.unwrap())),
        };
        writeln!(out, "                {dst}.set_u32({expr});").unwrap();
        if rc {
            writeln!(
                out,
                "                {}.compare({dst}.s32() as i64, 0i64, &{});",
                self.cr_expr(0),
                self.xer_expr()
            )
            .unwrap();
        }
        Ok(())
    }

    fn emit_load(&self, out: &mut String, width: MemWidth, signed: bool, rd: RegIndex, ra: RegIndex, disp: i32) {
        let addr = format!("{}.u32().wrapping_add({disp}i32 as u32)", self.gpr_expr(ra));
        let (call, setter) = match (width, signed) {
            (MemWidth::U8, false) => ("load_u8", "set_u8"),
            (MemWidth::U8, true) => ("load_u8", "set_s8"),
            (MemWidth::U16, false) => ("load_u16", "set_u16"),
            (MemWidth::U16, true) => ("load_u16", "set_s16"),
            (MemWidth::U32, false) => ("load_u32", "set_u32"),
            (MemWidth::U32, true) => ("load_u32", "set_s32"),
            (MemWidth::U64, _) => ("load_u64", "set_u64"),
        };
        writeln!(
            out,
            "                {}.{setter}(crate::memory::{call}(base, {addr}) as _);",
            self.gpr_expr(rd)
        )
        .unwrap();
    }

    fn emit_store(&self, out: &mut String, width: MemWidth, rs: RegIndex, ra: RegIndex, disp: i32) {
        let addr = format!("{}.u32().wrapping_add({disp}i32 as u32)", self.gpr_expr(ra));
        let (call, getter) = match width {
            MemWidth::U8 => ("store_u8", "u8"),
            MemWidth::U16 => ("store_u16", "u16"),
            MemWidth::U32 => ("store_u32", "u32"),
            MemWidth::U64 => ("store_u64", "u64"),
        };
        writeln!(
            out,
            "                crate::memory::{call}(base, {addr}, {}.{getter}());",
            self.gpr_expr(rs)
        )
        .unwrap();
    }

    fn emit_link(&self, out: &mut String, link: bool, next: Option<u32>) {
        if link {
            let ret = next.unwrap_or(0);
            writeln!(out, "                {} = {ret:#010x}u64;", self.lr_expr()).unwrap();
        }
    }

    /// Emits the indirect-call path (§4.7): a call to `ppc_lookup_func`, a function the driver
    /// generates once per emitted artifact closing over the translated [`crate::trampoline::FunctionTable`]
    /// (the `PPC_LOOKUP_FUNC` macro's role) — not part of this library, since it lives in the
    /// generated output alongside the emitted functions themselves. Each emitted function is its
    /// own sibling module next to `ppc_func_mappings` (see `driver::write_module_root`), so the
    /// call is fully qualified through `super`; a bare call would not be in scope.
    fn emit_tail_call(&self, out: &mut String, target_expr: &str) {
        writeln!(
            out,
            "                    match super::ppc_func_mappings::ppc_lookup_func({target_expr}) {{\n                        Some(host) => {{ host(ctx, base); return; }}\n                        None => panic!(\"unresolved indirect call to {{:#010x}}\", {target_expr}),\n                    }}"
        )
        .unwrap();
    }

    fn emit_fallthrough(&self, out: &mut String, next: Option<u32>) {
        if let Some(next) = next {
            writeln!(out, "                pc = {next:#010x};").unwrap();
        } else {
            writeln!(out, "                return;").unwrap();
        }
    }

    fn branch_condition_expr(&self, condition: BranchCondition) -> String {
        match condition {
            BranchCondition::Always => "true".to_string(),
            BranchCondition::IfSet { field, bit } => {
                format!("{}.{}", self.cr_expr(field), cr_bit_field(bit))
            }
            BranchCondition::IfClear { field, bit } => {
                format!("!{}.{}", self.cr_expr(field), cr_bit_field(bit))
            }
            BranchCondition::DecrementCtr { branch_if_zero } => {
                let cmp = if branch_if_zero { "== 0" } else { "!= 0" };
                let ctr = self.ctr_expr();
                format!("{{ {ctr}.set_u64({ctr}.u64().wrapping_sub(1)); {ctr}.u64() {cmp} }}")
            }
        }
    }
}

fn cr_bit_field(bit: CrBit) -> &'static str {
    match bit {
        CrBit::Lt => "lt",
        CrBit::Gt => "gt",
        CrBit::Eq => "eq",
        CrBit::SoOrUn => "so_or_un",
    }
}

impl InstrKind {
    /// GPR indices this instruction reads or writes, used to decide which elided registers need
    /// a stack-local declared in the enclosing function.
    fn referenced_gprs(&self) -> Vec<RegIndex> {
        match self {
            InstrKind::Integer { rd, ra, rb, .. } => {
                let mut v = vec![*rd, *ra];
                if let Some(rb) = rb {
                    v.push(*rb);
                }
                v
            }
            InstrKind::Load { rd, ra, .. } => vec![*rd, *ra],
            InstrKind::Store { rs, ra, .. } => vec![*rs, *ra],
            InstrKind::LoadReserve { rd, ra, rb, .. } => vec![*rd, *ra, *rb],
            InstrKind::StoreConditional { rs, ra, rb, .. } => vec![*rs, *ra, *rb],
            InstrKind::CompareInt { ra, rb_or_imm, .. } => {
                let mut v = vec![*ra];
                if let IntOperand::Reg(rb) = rb_or_imm {
                    v.push(*rb);
                }
                v
            }
            _ => Vec::new(),
        }
    }

    /// CR fields this instruction sets, used to decide which fields need a stack-local under
    /// `cr_as_local`.
    fn referenced_cr_fields(&self) -> Vec<CrFieldIndex> {
        match self {
            InstrKind::Integer { rc, .. } if *rc => vec![0],
            InstrKind::StoreConditional { .. } => vec![0],
            InstrKind::CompareInt { field, .. } => vec![*field],
            InstrKind::CompareFp { field, .. } => vec![*field],
            InstrKind::BranchConditional { condition, .. }
            | InstrKind::BranchToLink { condition, .. }
            | InstrKind::BranchToCount { condition, .. } => match condition {
                BranchCondition::IfSet { field, .. } | BranchCondition::IfClear { field, .. } => {
                    vec![*field]
                }
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    fn references_lr(&self) -> bool {
        match self {
            InstrKind::Branch { link, .. } => *link,
            InstrKind::BranchConditional { link, .. } => *link,
            InstrKind::BranchToLink { .. } => true,
            InstrKind::BranchToCount { link, .. } => *link,
            _ => false,
        }
    }

    fn references_ctr(&self) -> bool {
        let decrements = |c: &BranchCondition| matches!(c, BranchCondition::DecrementCtr { .. });
        match self {
            InstrKind::BranchToCount { .. } => true,
            InstrKind::BranchConditional { condition, .. } => decrements(condition),
            InstrKind::BranchToLink { condition, .. } => decrements(condition),
            _ => false,
        }
    }

    fn references_xer(&self) -> bool {
        matches!(self, InstrKind::CompareInt { .. })
            || matches!(self, InstrKind::Integer { rc: true, .. })
    }

    fn references_reserved(&self) -> bool {
        matches!(self, InstrKind::LoadReserve { .. } | InstrKind::StoreConditional { .. })
    }
}
