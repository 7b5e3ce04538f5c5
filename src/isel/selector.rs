//! Lowering of linearized, non-SSA functions into bytecode.
//!
//! Blocks are emitted in arena order, which after linearization is the final
//! execution order. A temp becomes an argument, local, scratch or scoped parameter
//! depending on its index and scope. Any expression that is neither a temp nor a
//! constant is first evaluated into a scratch slot.
//!
//! # Frame layout
//!
//! ```text
//! scratch area (reserved by Push)
//! ┌────────────────────────────┬─────────────────────────────────┐
//! │ compiler temporaries       │ staging slots, reused by every  │
//! │ temp_count - slot_count    │ statement (call args, operands) │
//! └────────────────────────────┴─────────────────────────────────┘
//! ```
//!
//! # Branches
//!
//! Branches are emitted with a zero offset and their patch sites recorded per target
//! block. Once every block has an address, each site is patched with
//! `block_address - patch_site`.

use std::collections::HashMap;

use tracing::debug;

use crate::{
    ir::{BlockId, ConstValue, Expr, ExprKind, Function, Name, RegExpFlags, StmtKind, Temp},
    isel::{CallArgs, CodeBuffer, Instr, Param, BRANCH_OFFSET_FIELD},
    Error, Result,
};

/// Where the selector registers the literals and names it encounters.
///
/// [`crate::unit::UnitBuilder`] implements this for the compiled-unit tables.
/// Registering the same value twice must return the same index.
pub trait Registry {
    /// Index of `value` in the string table.
    fn register_string(&mut self, value: &str) -> u32;

    /// Index of a constant, given as the bits of its runtime value.
    fn register_constant(&mut self, bits: u64) -> u32;

    /// Index of a regular expression literal in the regexp table.
    fn register_regexp(&mut self, pattern: &str, flags: RegExpFlags) -> u32;

    /// Index of a runtime name lookup in the lookup table.
    fn register_lookup(&mut self, name: &str) -> u32;
}

/// Tuning of the instruction selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectorConfig {
    /// Initial code buffer size in bytes. The buffer doubles whenever it runs full.
    pub initial_capacity: usize,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        SelectorConfig {
            initial_capacity: 4096,
        }
    }
}

/// The bytecode of one function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFunction {
    /// Function name.
    pub name: String,
    /// Number of formal parameters.
    pub formal_count: u32,
    /// Number of local variable slots.
    pub local_count: u32,
    /// Size of the scratch area reserved by the leading `Push`.
    pub frame_size: u32,
    /// The encoded instructions, branches already patched.
    pub code: Vec<u8>,
}

/// Instruction selector.
///
/// # Examples
///
/// ```rust,no_run
/// use ssair::prelude::*;
///
/// let mut b = FunctionBuilder::new("id", 1, 0);
/// let entry = b.entry();
/// b.ret(entry, Expr::temp(0))?;
/// let mut function = b.build()?;
/// Optimizer::default().run(&mut function)?;
///
/// let mut unit = UnitBuilder::new("/src/id.js");
/// let selected = InstructionSelection::default().select(&function, &mut unit)?;
/// for (addr, instr) in ssair::isel::decode(&selected.code)? {
///     println!("{addr:4}: {instr}");
/// }
/// # Ok::<(), ssair::Error>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct InstructionSelection {
    config: SelectorConfig,
}

impl InstructionSelection {
    /// Creates a selector with the given buffer configuration.
    #[must_use]
    pub fn new(config: SelectorConfig) -> Self {
        InstructionSelection { config }
    }

    /// Lowers `function` into bytecode.
    ///
    /// # Arguments
    ///
    /// * `function` - A linearized function without phi nodes
    /// * `registry` - Receives every string, constant, regexp and name lookup
    ///
    /// # Errors
    ///
    /// Returns [`Error::SsaError`] if the function still contains a phi, assigns to
    /// something that is not assignable, or if a branch distance does not fit the
    /// offset field.
    pub fn select<R: Registry + ?Sized>(
        &self,
        function: &Function,
        registry: &mut R,
    ) -> Result<SelectedFunction> {
        let slot_count = function.slot_count();
        let mut selector = Selector {
            function,
            registry,
            buffer: CodeBuffer::new(self.config.initial_capacity),
            patches: HashMap::new(),
            addrs: vec![None; function.block_count()],
            formal_count: function.formal_count,
            slot_count,
            staging_base: function.temp_count.saturating_sub(slot_count),
            staging_next: 0,
            staging_max: 0,
        };

        let push = selector.buffer.emit(&Instr::Push { frame_size: 0 });
        for position in 0..function.block_count() {
            selector.select_block(BlockId::new(position))?;
        }
        selector.patch_jumps()?;

        let frame_size = selector.staging_base + selector.staging_max;
        selector.buffer.patch_u32(push + 1, frame_size)?;

        debug!(
            function = %function.name,
            code_size = selector.buffer.len(),
            frame_size,
            growths = selector.buffer.growths(),
            "selected instructions"
        );

        Ok(SelectedFunction {
            name: function.name.clone(),
            formal_count: function.formal_count,
            local_count: function.local_count,
            frame_size,
            code: selector.buffer.into_code(),
        })
    }
}

struct Selector<'a, R: Registry + ?Sized> {
    function: &'a Function,
    registry: &'a mut R,
    buffer: CodeBuffer,
    patches: HashMap<BlockId, Vec<usize>>,
    addrs: Vec<Option<usize>>,
    formal_count: u32,
    slot_count: u32,
    staging_base: u32,
    staging_next: u32,
    staging_max: u32,
}

impl<R: Registry + ?Sized> Selector<'_, R> {
    fn select_block(&mut self, block: BlockId) -> Result<()> {
        self.addrs[block.index()] = Some(self.buffer.len());
        let next = BlockId::new(block.index() + 1);
        let function = self.function;

        for stmt in &function.block(block).stmts {
            self.staging_next = 0;
            match &stmt.kind {
                StmtKind::Move { target, source } => self.select_move(target, source)?,
                StmtKind::Exp { expr } => match &expr.kind {
                    ExprKind::Temp(_) | ExprKind::Const(_) => {}
                    _ => {
                        let slot = self.stage();
                        self.lower_into(expr, slot)?;
                    }
                },
                StmtKind::Jump { target } => self.branch(Instr::Jump { offset: 0 }, *target),
                StmtKind::CJump {
                    cond,
                    iftrue,
                    iffalse,
                } => {
                    let condition = match &cond.kind {
                        ExprKind::Temp(temp) => self.temp(*temp),
                        _ => {
                            let slot = self.stage();
                            self.lower_into(cond, slot)?;
                            slot
                        }
                    };
                    self.branch(Instr::CJump { offset: 0, condition }, *iftrue);
                    if *iffalse != next {
                        self.branch(Instr::Jump { offset: 0 }, *iffalse);
                    }
                }
                StmtKind::Ret { expr } => {
                    let result = self.operand(expr)?;
                    self.buffer.emit(&Instr::Ret { result });
                }
                StmtKind::Try {
                    body,
                    handler,
                    exception,
                } => {
                    let exception = self.temp(*exception);
                    self.branch(Instr::Try { offset: 0, exception }, *handler);
                    if *body != next {
                        self.branch(Instr::Jump { offset: 0 }, *body);
                    }
                }
                StmtKind::Phi { .. } => {
                    return Err(Error::SsaError(format!(
                        "phi in block {} of {} reached instruction selection",
                        block, function.name
                    )));
                }
            }
        }
        Ok(())
    }

    fn select_move(&mut self, target: &Expr, source: &Expr) -> Result<()> {
        match &target.kind {
            ExprKind::Temp(temp) => {
                let result = self.temp(*temp);
                self.lower_into(source, result)
            }
            ExprKind::Name(Name::Identifier(id)) => {
                let name = self.registry.register_lookup(id);
                let source = self.operand(source)?;
                self.buffer.emit(&Instr::StoreName { name, source });
                Ok(())
            }
            ExprKind::Member(base, member) => {
                let base = self.operand(base)?;
                let name = self.registry.register_string(member);
                let source = self.operand(source)?;
                self.buffer.emit(&Instr::StoreProperty { base, name, source });
                Ok(())
            }
            ExprKind::Subscript(base, index) => {
                let base = self.operand(base)?;
                let index = self.operand(index)?;
                let source = self.operand(source)?;
                self.buffer.emit(&Instr::StoreElement {
                    base,
                    index,
                    source,
                });
                Ok(())
            }
            _ => Err(Error::SsaError(format!(
                "cannot assign to {} in {}",
                target, self.function.name
            ))),
        }
    }

    /// Emits the instructions computing `expr` into `result`.
    fn lower_into(&mut self, expr: &Expr, result: Param) -> Result<()> {
        let instr = match &expr.kind {
            ExprKind::Temp(temp) => Instr::MoveTemp {
                source: self.temp(*temp),
                result,
            },
            ExprKind::Const(value) => Instr::LoadValue {
                value: self.constant(*value),
                result,
            },
            ExprKind::String(value) => Instr::LoadString {
                string: self.registry.register_string(value),
                result,
            },
            ExprKind::RegExp { pattern, flags } => Instr::LoadRegExp {
                regexp: self.registry.register_regexp(pattern, *flags),
                result,
            },
            ExprKind::Closure(function) => Instr::LoadClosure {
                function: *function,
                result,
            },
            ExprKind::Name(Name::This) => Instr::LoadThis { result },
            ExprKind::Name(Name::Identifier(id)) => Instr::LoadName {
                name: self.registry.register_lookup(id),
                result,
            },
            ExprKind::Unop(op, operand) => Instr::Unop {
                op: *op,
                source: self.operand(operand)?,
                result,
            },
            ExprKind::Binop(op, left, right) => {
                let lhs = self.operand(left)?;
                let rhs = self.operand(right)?;
                Instr::Binop {
                    op: *op,
                    lhs,
                    rhs,
                    result,
                }
            }
            ExprKind::Member(base, member) => {
                let base = self.operand(base)?;
                Instr::LoadProperty {
                    base,
                    name: self.registry.register_string(member),
                    result,
                }
            }
            ExprKind::Subscript(base, index) => {
                let base = self.operand(base)?;
                let index = self.operand(index)?;
                Instr::LoadElement {
                    base,
                    index,
                    result,
                }
            }
            ExprKind::Call(callee, args) => self.select_call(callee, args, result, false)?,
            ExprKind::New(callee, args) => self.select_call(callee, args, result, true)?,
        };
        self.buffer.emit(&instr);
        Ok(())
    }

    fn select_call(
        &mut self,
        callee: &Expr,
        args: &[Expr],
        result: Param,
        construct: bool,
    ) -> Result<Instr> {
        Ok(match &callee.kind {
            ExprKind::Member(base, member) => {
                let base = self.operand(base)?;
                let name = self.registry.register_string(member);
                let call = self.call_args(args)?;
                if construct {
                    Instr::CreateProperty {
                        base,
                        name,
                        call,
                        result,
                    }
                } else {
                    Instr::CallProperty {
                        base,
                        name,
                        call,
                        result,
                    }
                }
            }
            ExprKind::Subscript(base, index) if !construct => {
                let base = self.operand(base)?;
                let index = self.operand(index)?;
                let call = self.call_args(args)?;
                Instr::CallElement {
                    base,
                    index,
                    call,
                    result,
                }
            }
            ExprKind::Name(Name::Identifier(id)) => {
                let name = self.registry.register_lookup(id);
                let call = self.call_args(args)?;
                if construct {
                    Instr::CreateName { name, call, result }
                } else {
                    Instr::CallName { name, call, result }
                }
            }
            _ => {
                let func = self.operand(callee)?;
                let call = self.call_args(args)?;
                if construct {
                    Instr::CreateValue { func, call, result }
                } else {
                    Instr::CallValue { func, call, result }
                }
            }
        })
    }

    /// Places the arguments of a call in a contiguous run of scratch slots.
    ///
    /// A single argument that already lives in the scratch area is passed in place.
    fn call_args(&mut self, args: &[Expr]) -> Result<CallArgs> {
        if let [arg] = args {
            if let ExprKind::Temp(temp) = arg.kind {
                if let Param::Temp(slot) = self.temp(temp) {
                    return Ok(CallArgs { argc: 1, args: slot });
                }
            }
        }
        if args.is_empty() {
            return Ok(CallArgs::default());
        }

        let argc = u32::try_from(args.len())
            .map_err(|_| Error::SsaError(format!("too many call arguments: {}", args.len())))?;
        let first = self.stage_block(argc);
        for (slot, arg) in (first..).zip(args) {
            let source = self.operand(arg)?;
            self.buffer.emit(&Instr::MoveTemp {
                source,
                result: Param::Temp(slot),
            });
        }
        Ok(CallArgs { argc, args: first })
    }

    /// Returns a param reading `expr`, evaluating it into a staging slot first unless
    /// it is a temp or a constant.
    fn operand(&mut self, expr: &Expr) -> Result<Param> {
        match &expr.kind {
            ExprKind::Temp(temp) => Ok(self.temp(*temp)),
            ExprKind::Const(value) => Ok(self.constant(*value)),
            _ => {
                let slot = self.stage();
                self.lower_into(expr, slot)?;
                Ok(slot)
            }
        }
    }

    fn temp(&self, temp: Temp) -> Param {
        if temp.is_scoped() {
            Param::ScopedLocal {
                index: temp.index,
                scope: temp.scope,
            }
        } else if temp.index < self.formal_count {
            Param::Argument(temp.index)
        } else if temp.index < self.slot_count {
            Param::Local(temp.index - self.formal_count)
        } else {
            Param::Temp(temp.index - self.slot_count)
        }
    }

    fn constant(&mut self, value: ConstValue) -> Param {
        Param::Value(self.registry.register_constant(value.to_bits()))
    }

    fn stage(&mut self) -> Param {
        Param::Temp(self.stage_block(1))
    }

    fn stage_block(&mut self, count: u32) -> u32 {
        let first = self.staging_base + self.staging_next;
        self.staging_next += count;
        self.staging_max = self.staging_max.max(self.staging_next);
        first
    }

    fn branch(&mut self, instr: Instr, target: BlockId) {
        let addr = self.buffer.emit(&instr);
        self.patches
            .entry(target)
            .or_default()
            .push(addr + BRANCH_OFFSET_FIELD);
    }

    fn patch_jumps(&mut self) -> Result<()> {
        for (target, sites) in std::mem::take(&mut self.patches) {
            let Some(addr) = self.addrs.get(target.index()).copied().flatten() else {
                return Err(Error::SsaError(format!(
                    "branch to unknown block {} in {}",
                    target, self.function.name
                )));
            };
            for site in sites {
                let distance = i64::try_from(addr).unwrap_or(i64::MAX)
                    - i64::try_from(site).unwrap_or(i64::MAX);
                let offset = i32::try_from(distance).map_err(|_| {
                    Error::SsaError(format!("branch distance {distance} out of range"))
                })?;
                self.buffer.patch_i32(site, offset)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::{AluOp, FunctionBuilder},
        isel::{decode, Opcode},
    };

    #[derive(Default)]
    struct Tables {
        strings: Vec<String>,
        constants: Vec<u64>,
        regexps: Vec<(String, RegExpFlags)>,
        lookups: Vec<String>,
    }

    fn intern<T: PartialEq + Clone>(table: &mut Vec<T>, value: T) -> u32 {
        let index = table.iter().position(|v| *v == value).unwrap_or_else(|| {
            table.push(value);
            table.len() - 1
        });
        index as u32
    }

    impl Registry for Tables {
        fn register_string(&mut self, value: &str) -> u32 {
            intern(&mut self.strings, value.to_string())
        }
        fn register_constant(&mut self, bits: u64) -> u32 {
            intern(&mut self.constants, bits)
        }
        fn register_regexp(&mut self, pattern: &str, flags: RegExpFlags) -> u32 {
            intern(&mut self.regexps, (pattern.to_string(), flags))
        }
        fn register_lookup(&mut self, name: &str) -> u32 {
            intern(&mut self.lookups, name.to_string())
        }
    }

    fn instrs(selected: &SelectedFunction) -> Vec<(usize, Instr)> {
        decode(&selected.code).unwrap()
    }

    #[test]
    fn test_param_classification() {
        // 1 formal, 1 local, temps 2.. in the scratch area
        let mut b = FunctionBuilder::new("f", 1, 1);
        let entry = b.entry();
        b.move_to(entry, Expr::temp(1), Expr::temp(0)).unwrap();
        b.move_to(entry, Expr::temp(2), Expr::scoped(3, 1)).unwrap();
        b.ret(entry, Expr::temp(2)).unwrap();
        let function = b.build().unwrap();

        let mut tables = Tables::default();
        let selected = InstructionSelection::default()
            .select(&function, &mut tables)
            .unwrap();
        let code = instrs(&selected);

        assert_eq!(selected.frame_size, 1);
        assert_eq!(code[0].1, Instr::Push { frame_size: 1 });
        assert_eq!(
            code[1].1,
            Instr::MoveTemp {
                source: Param::Argument(0),
                result: Param::Local(0)
            }
        );
        assert_eq!(
            code[2].1,
            Instr::MoveTemp {
                source: Param::ScopedLocal { index: 3, scope: 1 },
                result: Param::Temp(0)
            }
        );
        assert_eq!(code[3].1, Instr::Ret { result: Param::Temp(0) });
    }

    #[test]
    fn test_call_arguments_are_contiguous() {
        // this.push(a >>> 2, "x")
        let mut b = FunctionBuilder::new("f", 1, 0);
        let entry = b.entry();
        b.exp(
            entry,
            Expr::call(
                Expr::member(Expr::this(), "push"),
                vec![
                    Expr::binop(AluOp::URShift, Expr::temp(0), Expr::number(2.0)),
                    Expr::string("x"),
                ],
            ),
        )
        .unwrap();
        b.ret(entry, Expr::undefined()).unwrap();
        let function = b.build().unwrap();

        let mut tables = Tables::default();
        let selected = InstructionSelection::default()
            .select(&function, &mut tables)
            .unwrap();
        let code: Vec<Instr> = instrs(&selected).into_iter().map(|(_, i)| i).collect();

        // slot 0: call result, slot 1: `this`, slots 2..4: arguments, 4 and 5: operands
        assert_eq!(code[1], Instr::LoadThis { result: Param::Temp(1) });
        assert!(matches!(
            code[2],
            Instr::Binop { op: AluOp::URShift, lhs: Param::Argument(0), result: Param::Temp(4), .. }
        ));
        assert_eq!(
            code[3],
            Instr::MoveTemp {
                source: Param::Temp(4),
                result: Param::Temp(2)
            }
        );
        assert_eq!(code[4], Instr::LoadString { string: 1, result: Param::Temp(5) });
        assert_eq!(
            code[6],
            Instr::CallProperty {
                base: Param::Temp(1),
                name: 0,
                call: CallArgs { argc: 2, args: 2 },
                result: Param::Temp(0),
            }
        );
        assert_eq!(tables.strings, vec!["push".to_string(), "x".to_string()]);
        assert_eq!(selected.frame_size, 6);
    }

    #[test]
    fn test_single_temp_argument_passed_in_place() {
        let mut b = FunctionBuilder::new("f", 0, 0);
        let entry = b.entry();
        let t = b.new_temp();
        b.move_to(entry, Expr::from_temp(t), Expr::number(1.0)).unwrap();
        b.move_to(
            entry,
            Expr::from_temp(t),
            Expr::call(Expr::name("print"), vec![Expr::from_temp(t)]),
        )
        .unwrap();
        b.ret(entry, Expr::from_temp(t)).unwrap();
        let function = b.build().unwrap();

        let mut tables = Tables::default();
        let selected = InstructionSelection::default()
            .select(&function, &mut tables)
            .unwrap();
        let code = instrs(&selected);

        assert_eq!(
            code[2].1,
            Instr::CallName {
                name: 0,
                call: CallArgs { argc: 1, args: 0 },
                result: Param::Temp(0),
            }
        );
        assert_eq!(tables.lookups, vec!["print".to_string()]);
    }

    #[test]
    fn test_branches_are_patched() {
        //   L0: if (a < 1) goto L2 else goto L1
        //   L1: return 1
        //   L2: return 2
        let mut b = FunctionBuilder::new("f", 1, 0);
        let entry = b.entry();
        let l1 = b.new_block();
        let l2 = b.new_block();
        b.cjump(
            entry,
            Expr::binop(AluOp::Lt, Expr::temp(0), Expr::number(1.0)),
            l2,
            l1,
        )
        .unwrap();
        b.ret(l1, Expr::number(1.0)).unwrap();
        b.ret(l2, Expr::number(2.0)).unwrap();
        let function = b.build().unwrap();

        let mut tables = Tables::default();
        let selected = InstructionSelection::default()
            .select(&function, &mut tables)
            .unwrap();
        let code = instrs(&selected);

        // Push, Binop, CJump, Ret, Ret: the false edge falls through to L1
        assert_eq!(code.len(), 5);
        assert!(matches!(
            code[1].1,
            Instr::Binop { op: AluOp::Lt, result: Param::Temp(0), .. }
        ));
        let (cjump_addr, cjump) = &code[2];
        let offset = cjump.branch_offset().unwrap();
        let target = (cjump_addr + BRANCH_OFFSET_FIELD) as i64 + i64::from(offset);
        assert_eq!(target as usize, code[4].0);
    }

    #[test]
    fn test_backward_jump_and_explicit_false_edge() {
        //   L0: goto L1
        //   L1: if (a) goto L1 else goto L2  (L2 is next, no extra jump)
        //   L2: if (a) goto L2 else goto L1  (explicit jump back)
        let mut b = FunctionBuilder::new("f", 1, 0);
        let entry = b.entry();
        let l1 = b.new_block();
        let l2 = b.new_block();
        let l3 = b.new_block();
        b.jump(entry, l1).unwrap();
        b.cjump(l1, Expr::temp(0), l1, l2).unwrap();
        b.cjump(l2, Expr::temp(0), l3, l1).unwrap();
        b.ret(l3, Expr::temp(0)).unwrap();
        let function = b.build().unwrap();

        let mut tables = Tables::default();
        let selected = InstructionSelection::default()
            .select(&function, &mut tables)
            .unwrap();
        let code = instrs(&selected);

        let opcodes: Vec<_> = code.iter().map(|(_, i)| i.opcode()).collect();
        assert_eq!(
            opcodes,
            vec![
                Opcode::Push,
                Opcode::Jump,
                Opcode::CJump,
                Opcode::CJump,
                Opcode::Jump,
                Opcode::Ret
            ]
        );

        let (addr, jump_back) = &code[4];
        let offset = jump_back.branch_offset().unwrap();
        let target = (addr + BRANCH_OFFSET_FIELD) as i64 + i64::from(offset);
        assert_eq!(target as usize, code[2].0);
        assert!(jump_back.branch_offset().unwrap() < 0);
    }

    #[test]
    fn test_phi_is_rejected() {
        let mut function = Function::new("f", 0, 0);
        let entry = function.entry();
        let phi = function.make_stmt(StmtKind::Phi {
            target: Temp::new(0),
            incoming: Vec::new(),
        });
        let ret = function.make_stmt(StmtKind::Ret {
            expr: Expr::undefined(),
        });
        function.block_mut(entry).stmts = vec![phi, ret];

        let mut tables = Tables::default();
        assert!(matches!(
            InstructionSelection::default().select(&function, &mut tables),
            Err(Error::SsaError(_))
        ));
    }

    #[test]
    fn test_small_buffer_grows() {
        let mut b = FunctionBuilder::new("f", 0, 0);
        let entry = b.entry();
        for i in 0..32 {
            b.exp(entry, Expr::call(Expr::name("tick"), vec![Expr::number(f64::from(i))]))
                .unwrap();
        }
        b.ret(entry, Expr::undefined()).unwrap();
        let function = b.build().unwrap();

        let mut tables = Tables::default();
        let selected = InstructionSelection::new(SelectorConfig { initial_capacity: 16 })
            .select(&function, &mut tables)
            .unwrap();
        assert_eq!(instrs(&selected).len(), 1 + 32 * 2 + 1);
        assert_eq!(tables.constants.len(), 33);
    }
}
