//! Bytecode instruction records and their byte layout.
//!
//! Every record starts with a one-byte [`Opcode`] followed by its fields in the order
//! they are declared on the matching [`Instr`] variant. Fields are little-endian:
//! indices and counts are `u32`, branch offsets are `i32`, operators are one byte and
//! a [`Param`] takes nine bytes (a tag and two `u32`s).
//!
//! Branch offsets always sit right after the opcode, so the patch site of a branch
//! emitted at `addr` is `addr + 1`. The stored offset is relative to that site.

use std::fmt;

use strum::{Display, FromRepr, IntoStaticStr};

use crate::{
    file::io::{push_le, read_le_at},
    ir::AluOp,
    Result,
};

/// Encoded size of a [`Param`].
pub const PARAM_SIZE: usize = 9;

/// Distance from the start of a branch instruction to its offset field.
pub const BRANCH_OFFSET_FIELD: usize = 1;

/// The one-byte instruction tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, FromRepr, IntoStaticStr)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum Opcode {
    Push = 0,
    LoadValue,
    LoadString,
    LoadRegExp,
    LoadClosure,
    LoadName,
    StoreName,
    LoadThis,
    LoadProperty,
    StoreProperty,
    LoadElement,
    StoreElement,
    MoveTemp,
    Unop,
    Binop,
    CallValue,
    CallProperty,
    CallElement,
    CallName,
    CreateValue,
    CreateProperty,
    CreateName,
    Jump,
    CJump,
    Ret,
    Try,
}

/// An instruction operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Param {
    /// Entry of the unit's constant table.
    Value(u32),
    /// Formal parameter slot.
    Argument(u32),
    /// Local variable slot.
    Local(u32),
    /// Slot of the scratch area, which holds compiler temporaries first and the
    /// per-instruction staging slots after them.
    Temp(u32),
    /// Variable `index` of the `scope`-th enclosing function.
    ScopedLocal {
        /// Slot in the enclosing function.
        index: u32,
        /// How many functions up.
        scope: u32,
    },
}

impl Param {
    fn encode(self, out: &mut Vec<u8>) {
        let (tag, a, b) = match self {
            Param::Value(i) => (0_u8, i, 0),
            Param::Argument(i) => (1, i, 0),
            Param::Local(i) => (2, i, 0),
            Param::Temp(i) => (3, i, 0),
            Param::ScopedLocal { index, scope } => (4, index, scope),
        };
        push_le(out, tag);
        push_le(out, a);
        push_le(out, b);
    }

    fn decode(code: &[u8], offset: &mut usize) -> Result<Self> {
        let tag: u8 = read_le_at(code, offset)?;
        let a: u32 = read_le_at(code, offset)?;
        let b: u32 = read_le_at(code, offset)?;
        Ok(match tag {
            0 => Param::Value(a),
            1 => Param::Argument(a),
            2 => Param::Local(a),
            3 => Param::Temp(a),
            4 => Param::ScopedLocal { index: a, scope: b },
            _ => return Err(malformed_error!("invalid param tag {}", tag)),
        })
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Value(i) => write!(f, "#{i}"),
            Param::Argument(i) => write!(f, "a{i}"),
            Param::Local(i) => write!(f, "l{i}"),
            Param::Temp(i) => write!(f, "t{i}"),
            Param::ScopedLocal { index, scope } => write!(f, "s{index}@{scope}"),
        }
    }
}

/// Argument block of a call: `argc` values starting at scratch slot `args`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CallArgs {
    /// Number of arguments.
    pub argc: u32,
    /// First scratch slot of the block.
    pub args: u32,
}

/// A decoded or to-be-encoded instruction.
///
/// Name fields of `LoadName`, `StoreName`, `CallName` and `CreateName` index the
/// lookup table; every other name or string field indexes the string table.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum Instr {
    /// Reserves the scratch area. Always the first instruction of a function.
    Push { frame_size: u32 },
    LoadValue { value: Param, result: Param },
    LoadString { string: u32, result: Param },
    LoadRegExp { regexp: u32, result: Param },
    LoadClosure { function: u32, result: Param },
    LoadName { name: u32, result: Param },
    StoreName { name: u32, source: Param },
    LoadThis { result: Param },
    LoadProperty { base: Param, name: u32, result: Param },
    StoreProperty { base: Param, name: u32, source: Param },
    LoadElement { base: Param, index: Param, result: Param },
    StoreElement { base: Param, index: Param, source: Param },
    MoveTemp { source: Param, result: Param },
    Unop { op: AluOp, source: Param, result: Param },
    Binop { op: AluOp, lhs: Param, rhs: Param, result: Param },
    CallValue { func: Param, call: CallArgs, result: Param },
    CallProperty { base: Param, name: u32, call: CallArgs, result: Param },
    CallElement { base: Param, index: Param, call: CallArgs, result: Param },
    CallName { name: u32, call: CallArgs, result: Param },
    CreateValue { func: Param, call: CallArgs, result: Param },
    CreateProperty { base: Param, name: u32, call: CallArgs, result: Param },
    CreateName { name: u32, call: CallArgs, result: Param },
    /// Unconditional branch.
    Jump { offset: i32 },
    /// Branch taken when `condition` is truthy.
    CJump { offset: i32, condition: Param },
    Ret { result: Param },
    /// Enters a protected region whose handler lies at `offset`, storing the thrown
    /// value into `exception`.
    Try { offset: i32, exception: Param },
}

impl Instr {
    /// The tag of this instruction.
    #[must_use]
    pub fn opcode(&self) -> Opcode {
        match self {
            Instr::Push { .. } => Opcode::Push,
            Instr::LoadValue { .. } => Opcode::LoadValue,
            Instr::LoadString { .. } => Opcode::LoadString,
            Instr::LoadRegExp { .. } => Opcode::LoadRegExp,
            Instr::LoadClosure { .. } => Opcode::LoadClosure,
            Instr::LoadName { .. } => Opcode::LoadName,
            Instr::StoreName { .. } => Opcode::StoreName,
            Instr::LoadThis { .. } => Opcode::LoadThis,
            Instr::LoadProperty { .. } => Opcode::LoadProperty,
            Instr::StoreProperty { .. } => Opcode::StoreProperty,
            Instr::LoadElement { .. } => Opcode::LoadElement,
            Instr::StoreElement { .. } => Opcode::StoreElement,
            Instr::MoveTemp { .. } => Opcode::MoveTemp,
            Instr::Unop { .. } => Opcode::Unop,
            Instr::Binop { .. } => Opcode::Binop,
            Instr::CallValue { .. } => Opcode::CallValue,
            Instr::CallProperty { .. } => Opcode::CallProperty,
            Instr::CallElement { .. } => Opcode::CallElement,
            Instr::CallName { .. } => Opcode::CallName,
            Instr::CreateValue { .. } => Opcode::CreateValue,
            Instr::CreateProperty { .. } => Opcode::CreateProperty,
            Instr::CreateName { .. } => Opcode::CreateName,
            Instr::Jump { .. } => Opcode::Jump,
            Instr::CJump { .. } => Opcode::CJump,
            Instr::Ret { .. } => Opcode::Ret,
            Instr::Try { .. } => Opcode::Try,
        }
    }

    /// The relative branch offset, for instructions that carry one.
    #[must_use]
    pub fn branch_offset(&self) -> Option<i32> {
        match self {
            Instr::Jump { offset } | Instr::CJump { offset, .. } | Instr::Try { offset, .. } => {
                Some(*offset)
            }
            _ => None,
        }
    }

    /// Appends the encoded record to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        push_le(out, self.opcode() as u8);
        match self {
            Instr::Push { frame_size } => push_le(out, *frame_size),
            Instr::LoadValue { value, result } => {
                value.encode(out);
                result.encode(out);
            }
            Instr::LoadString { string: index, result }
            | Instr::LoadRegExp { regexp: index, result }
            | Instr::LoadClosure { function: index, result }
            | Instr::LoadName { name: index, result } => {
                push_le(out, *index);
                result.encode(out);
            }
            Instr::StoreName { name, source } => {
                push_le(out, *name);
                source.encode(out);
            }
            Instr::LoadThis { result } | Instr::Ret { result } => result.encode(out),
            Instr::LoadProperty { base, name, result: other }
            | Instr::StoreProperty { base, name, source: other } => {
                base.encode(out);
                push_le(out, *name);
                other.encode(out);
            }
            Instr::LoadElement { base, index, result: other }
            | Instr::StoreElement { base, index, source: other } => {
                base.encode(out);
                index.encode(out);
                other.encode(out);
            }
            Instr::MoveTemp { source, result } => {
                source.encode(out);
                result.encode(out);
            }
            Instr::Unop { op, source, result } => {
                push_le(out, *op as u8);
                source.encode(out);
                result.encode(out);
            }
            Instr::Binop { op, lhs, rhs, result } => {
                push_le(out, *op as u8);
                lhs.encode(out);
                rhs.encode(out);
                result.encode(out);
            }
            Instr::CallValue { func, call, result } | Instr::CreateValue { func, call, result } => {
                func.encode(out);
                encode_call(out, *call);
                result.encode(out);
            }
            Instr::CallProperty { base, name, call, result }
            | Instr::CreateProperty { base, name, call, result } => {
                base.encode(out);
                push_le(out, *name);
                encode_call(out, *call);
                result.encode(out);
            }
            Instr::CallElement { base, index, call, result } => {
                base.encode(out);
                index.encode(out);
                encode_call(out, *call);
                result.encode(out);
            }
            Instr::CallName { name, call, result } | Instr::CreateName { name, call, result } => {
                push_le(out, *name);
                encode_call(out, *call);
                result.encode(out);
            }
            Instr::Jump { offset } => push_le(out, *offset),
            Instr::CJump { offset, condition: param } | Instr::Try { offset, exception: param } => {
                push_le(out, *offset);
                param.encode(out);
            }
        }
    }

    /// Decodes the record starting at `offset` and advances `offset` past it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the record is truncated and
    /// [`crate::Error::Malformed`] on an unknown opcode, operator or param tag.
    pub fn decode(code: &[u8], offset: &mut usize) -> Result<Instr> {
        let tag: u8 = read_le_at(code, offset)?;
        let Some(opcode) = Opcode::from_repr(tag) else {
            return Err(malformed_error!("invalid opcode {:#04x} at {}", tag, *offset - 1));
        };

        let param = |offset: &mut usize| Param::decode(code, offset);
        let index = |offset: &mut usize| read_le_at::<u32>(code, offset);
        let call = |offset: &mut usize| -> Result<CallArgs> {
            Ok(CallArgs {
                argc: read_le_at(code, offset)?,
                args: read_le_at(code, offset)?,
            })
        };
        let alu = |offset: &mut usize| -> Result<AluOp> {
            let raw: u8 = read_le_at(code, offset)?;
            AluOp::from_repr(raw).ok_or_else(|| malformed_error!("invalid operator {}", raw))
        };

        Ok(match opcode {
            Opcode::Push => Instr::Push {
                frame_size: index(offset)?,
            },
            Opcode::LoadValue => Instr::LoadValue {
                value: param(offset)?,
                result: param(offset)?,
            },
            Opcode::LoadString => Instr::LoadString {
                string: index(offset)?,
                result: param(offset)?,
            },
            Opcode::LoadRegExp => Instr::LoadRegExp {
                regexp: index(offset)?,
                result: param(offset)?,
            },
            Opcode::LoadClosure => Instr::LoadClosure {
                function: index(offset)?,
                result: param(offset)?,
            },
            Opcode::LoadName => Instr::LoadName {
                name: index(offset)?,
                result: param(offset)?,
            },
            Opcode::StoreName => Instr::StoreName {
                name: index(offset)?,
                source: param(offset)?,
            },
            Opcode::LoadThis => Instr::LoadThis {
                result: param(offset)?,
            },
            Opcode::LoadProperty => Instr::LoadProperty {
                base: param(offset)?,
                name: index(offset)?,
                result: param(offset)?,
            },
            Opcode::StoreProperty => Instr::StoreProperty {
                base: param(offset)?,
                name: index(offset)?,
                source: param(offset)?,
            },
            Opcode::LoadElement => Instr::LoadElement {
                base: param(offset)?,
                index: param(offset)?,
                result: param(offset)?,
            },
            Opcode::StoreElement => Instr::StoreElement {
                base: param(offset)?,
                index: param(offset)?,
                source: param(offset)?,
            },
            Opcode::MoveTemp => Instr::MoveTemp {
                source: param(offset)?,
                result: param(offset)?,
            },
            Opcode::Unop => Instr::Unop {
                op: alu(offset)?,
                source: param(offset)?,
                result: param(offset)?,
            },
            Opcode::Binop => Instr::Binop {
                op: alu(offset)?,
                lhs: param(offset)?,
                rhs: param(offset)?,
                result: param(offset)?,
            },
            Opcode::CallValue => Instr::CallValue {
                func: param(offset)?,
                call: call(offset)?,
                result: param(offset)?,
            },
            Opcode::CallProperty => Instr::CallProperty {
                base: param(offset)?,
                name: index(offset)?,
                call: call(offset)?,
                result: param(offset)?,
            },
            Opcode::CallElement => Instr::CallElement {
                base: param(offset)?,
                index: param(offset)?,
                call: call(offset)?,
                result: param(offset)?,
            },
            Opcode::CallName => Instr::CallName {
                name: index(offset)?,
                call: call(offset)?,
                result: param(offset)?,
            },
            Opcode::CreateValue => Instr::CreateValue {
                func: param(offset)?,
                call: call(offset)?,
                result: param(offset)?,
            },
            Opcode::CreateProperty => Instr::CreateProperty {
                base: param(offset)?,
                name: index(offset)?,
                call: call(offset)?,
                result: param(offset)?,
            },
            Opcode::CreateName => Instr::CreateName {
                name: index(offset)?,
                call: call(offset)?,
                result: param(offset)?,
            },
            Opcode::Jump => Instr::Jump {
                offset: read_le_at(code, offset)?,
            },
            Opcode::CJump => Instr::CJump {
                offset: read_le_at(code, offset)?,
                condition: param(offset)?,
            },
            Opcode::Ret => Instr::Ret {
                result: param(offset)?,
            },
            Opcode::Try => Instr::Try {
                offset: read_le_at(code, offset)?,
                exception: param(offset)?,
            },
        })
    }
}

fn encode_call(out: &mut Vec<u8>, call: CallArgs) {
    push_le(out, call.argc);
    push_le(out, call.args);
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mnemonic: &'static str = self.opcode().into();
        write!(f, "{mnemonic:<15}")?;
        match self {
            Instr::Push { frame_size } => write!(f, "{frame_size}"),
            Instr::LoadValue { value, result } => write!(f, "{result}, {value}"),
            Instr::LoadString { string: i, result }
            | Instr::LoadRegExp { regexp: i, result }
            | Instr::LoadClosure { function: i, result }
            | Instr::LoadName { name: i, result } => write!(f, "{result}, [{i}]"),
            Instr::StoreName { name, source } => write!(f, "[{name}], {source}"),
            Instr::LoadThis { result } | Instr::Ret { result } => write!(f, "{result}"),
            Instr::LoadProperty { base, name, result } => write!(f, "{result}, {base}.[{name}]"),
            Instr::StoreProperty { base, name, source } => write!(f, "{base}.[{name}], {source}"),
            Instr::LoadElement { base, index, result } => write!(f, "{result}, {base}[{index}]"),
            Instr::StoreElement { base, index, source } => write!(f, "{base}[{index}], {source}"),
            Instr::MoveTemp { source, result } => write!(f, "{result}, {source}"),
            Instr::Unop { op, source, result } => write!(f, "{result}, {}{source}", op.symbol()),
            Instr::Binop { op, lhs, rhs, result } => {
                write!(f, "{result}, {lhs} {} {rhs}", op.symbol())
            }
            Instr::CallValue { func, call, result } | Instr::CreateValue { func, call, result } => {
                write!(f, "{result}, {func}(t{}..+{})", call.args, call.argc)
            }
            Instr::CallProperty { base, name, call, result }
            | Instr::CreateProperty { base, name, call, result } => {
                write!(f, "{result}, {base}.[{name}](t{}..+{})", call.args, call.argc)
            }
            Instr::CallElement { base, index, call, result } => {
                write!(f, "{result}, {base}[{index}](t{}..+{})", call.args, call.argc)
            }
            Instr::CallName { name, call, result } | Instr::CreateName { name, call, result } => {
                write!(f, "{result}, [{name}](t{}..+{})", call.args, call.argc)
            }
            Instr::Jump { offset } => write!(f, "{offset:+}"),
            Instr::CJump { offset, condition } => write!(f, "{condition}, {offset:+}"),
            Instr::Try { offset, exception } => write!(f, "{exception}, {offset:+}"),
        }
    }
}

/// Decodes a complete code buffer.
///
/// # Returns
///
/// Every instruction together with its byte offset in `code`.
///
/// # Errors
///
/// Fails on the first record [`Instr::decode`] rejects.
pub fn decode(code: &[u8]) -> Result<Vec<(usize, Instr)>> {
    let mut offset = 0;
    let mut instrs = Vec::new();
    while offset < code.len() {
        let start = offset;
        instrs.push((start, Instr::decode(code, &mut offset)?));
    }
    Ok(instrs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let mut out = Vec::new();
        Instr::CJump {
            offset: -12,
            condition: Param::ScopedLocal { index: 2, scope: 1 },
        }
        .encode(&mut out);

        assert_eq!(out.len(), 1 + 4 + PARAM_SIZE);
        assert_eq!(out[0], Opcode::CJump as u8);
        assert_eq!(&out[1..5], &(-12_i32).to_le_bytes());
        assert_eq!(out[5], 4);
        assert_eq!(&out[6..10], &2_u32.to_le_bytes());
        assert_eq!(&out[10..14], &1_u32.to_le_bytes());
    }

    #[test]
    fn test_decode_stream() {
        let instrs = [
            Instr::Push { frame_size: 3 },
            Instr::Binop {
                op: AluOp::URShift,
                lhs: Param::Argument(0),
                rhs: Param::Value(1),
                result: Param::Temp(0),
            },
            Instr::CallProperty {
                base: Param::Local(0),
                name: 4,
                call: CallArgs { argc: 2, args: 1 },
                result: Param::Temp(0),
            },
            Instr::Ret { result: Param::Temp(0) },
        ];
        let mut code = Vec::new();
        for instr in &instrs {
            instr.encode(&mut code);
        }

        let decoded = decode(&code).unwrap();
        assert_eq!(decoded.len(), 4);
        assert_eq!(decoded[0], (0, instrs[0].clone()));
        assert_eq!(decoded[1].0, 5);
        assert_eq!(decoded[3].1, instrs[3]);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode(&[0xFF]).is_err());
        assert!(matches!(decode(&[Opcode::Push as u8, 1]), Err(crate::Error::OutOfBounds)));

        let mut code = Vec::new();
        Instr::Ret { result: Param::Temp(0) }.encode(&mut code);
        code[1] = 9;
        assert!(decode(&code).is_err());
    }

    #[test]
    fn test_display() {
        let instr = Instr::Binop {
            op: AluOp::Add,
            lhs: Param::Local(1),
            rhs: Param::Value(0),
            result: Param::Temp(2),
        };
        assert_eq!(instr.to_string(), "Binop          t2, l1 + #0");
        assert_eq!(Instr::Jump { offset: -8 }.to_string(), "Jump           -8");
    }
}
