//! Expressions, temporaries and operators.
//!
//! Every [`Expr`] carries a mutable [`IrType`] filled in by type inference and
//! refined by type propagation. Constants start out with the type of their value.

use bitflags::bitflags;
use strum::{Display, EnumIter, FromRepr, IntoStaticStr};

use crate::ir::IrType;

/// A temporary, identified by `(index, scope)`.
///
/// `scope == 0` is a temporary of the function being compiled and may be put into
/// SSA form. A nonzero scope names a variable captured from an enclosing function;
/// those are never renamed, never removed and always typed as objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Temp {
    /// Slot index within its scope.
    pub index: u32,
    /// Number of enclosing scopes to walk up, 0 for the current function.
    pub scope: u32,
}

impl Temp {
    /// A temporary of the current function.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Temp { index, scope: 0 }
    }

    /// A variable captured from the `scope`-th enclosing function.
    #[must_use]
    pub const fn scoped(index: u32, scope: u32) -> Self {
        Temp { index, scope }
    }

    /// Returns true if this temporary lives in an enclosing scope.
    #[must_use]
    pub const fn is_scoped(self) -> bool {
        self.scope != 0
    }
}

/// A literal value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstValue {
    /// `undefined`
    Undefined,
    /// `null`
    Null,
    /// `true` or `false`
    Bool(bool),
    /// Any number, stored as a double.
    Number(f64),
}

/// Encoded `undefined` in the constant table.
pub const UNDEFINED_BITS: u64 = 0xFFFA_0000_0000_0000;
/// Encoded `null` in the constant table.
pub const NULL_BITS: u64 = 0xFFFB_0000_0000_0000;
/// Encoded `false` in the constant table, `true` is `FALSE_BITS | 1`.
pub const FALSE_BITS: u64 = 0xFFFC_0000_0000_0000;
const CANONICAL_NAN: u64 = 0x7FF8_0000_0000_0000;

impl ConstValue {
    /// The narrowest lattice type describing this value.
    ///
    /// Integral numbers that fit a signed 32-bit integer (other than `-0`) are
    /// `SINT32`, every other number is `DOUBLE`.
    #[must_use]
    pub fn ir_type(&self) -> IrType {
        match *self {
            ConstValue::Undefined => IrType::UNDEFINED,
            ConstValue::Null => IrType::NULL,
            ConstValue::Bool(_) => IrType::BOOL,
            ConstValue::Number(value) => {
                let is_negative_zero = value == 0.0 && value.is_sign_negative();
                let fits = value.fract() == 0.0
                    && value >= f64::from(i32::MIN)
                    && value <= f64::from(i32::MAX)
                    && !is_negative_zero;
                if fits {
                    IrType::SINT32
                } else {
                    IrType::DOUBLE
                }
            }
        }
    }

    /// Encodes the value into the 64-bit constant table representation.
    ///
    /// Numbers are stored as their IEEE-754 bits with NaN canonicalized. The other
    /// values live in negative quiet-NaN payloads no arithmetic ever produces.
    #[must_use]
    pub fn to_bits(&self) -> u64 {
        match *self {
            ConstValue::Undefined => UNDEFINED_BITS,
            ConstValue::Null => NULL_BITS,
            ConstValue::Bool(value) => FALSE_BITS | u64::from(value),
            ConstValue::Number(value) if value.is_nan() => CANONICAL_NAN,
            ConstValue::Number(value) => value.to_bits(),
        }
    }

    /// Decodes a value written by [`ConstValue::to_bits`].
    #[must_use]
    pub fn from_bits(bits: u64) -> Self {
        match bits {
            UNDEFINED_BITS => ConstValue::Undefined,
            NULL_BITS => ConstValue::Null,
            FALSE_BITS => ConstValue::Bool(false),
            b if b == FALSE_BITS | 1 => ConstValue::Bool(true),
            b => ConstValue::Number(f64::from_bits(b)),
        }
    }
}

/// Unary and binary operators.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, FromRepr, IntoStaticStr,
)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum AluOp {
    Not,
    UMinus,
    UPlus,
    Compl,
    Increment,
    Decrement,

    BitAnd,
    BitOr,
    BitXor,

    Add,
    Sub,
    Mul,
    Div,
    Mod,

    LShift,
    RShift,
    URShift,

    Gt,
    Lt,
    Ge,
    Le,
    Equal,
    NotEqual,
    StrictEqual,
    StrictNotEqual,

    Instanceof,
    In,

    And,
    Or,
}

impl AluOp {
    /// Returns true for operators taking a single operand.
    #[must_use]
    pub fn is_unary(self) -> bool {
        matches!(
            self,
            AluOp::Not
                | AluOp::UMinus
                | AluOp::UPlus
                | AluOp::Compl
                | AluOp::Increment
                | AluOp::Decrement
        )
    }

    /// Returns true for relational and equality operators.
    #[must_use]
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            AluOp::Gt
                | AluOp::Lt
                | AluOp::Ge
                | AluOp::Le
                | AluOp::Equal
                | AluOp::NotEqual
                | AluOp::StrictEqual
                | AluOp::StrictNotEqual
        )
    }

    /// The source-level spelling of the operator.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            AluOp::Not => "!",
            AluOp::UMinus => "-",
            AluOp::UPlus => "+",
            AluOp::Compl => "~",
            AluOp::Increment => "++",
            AluOp::Decrement => "--",
            AluOp::BitAnd => "&",
            AluOp::BitOr => "|",
            AluOp::BitXor => "^",
            AluOp::Add => "+",
            AluOp::Sub => "-",
            AluOp::Mul => "*",
            AluOp::Div => "/",
            AluOp::Mod => "%",
            AluOp::LShift => "<<",
            AluOp::RShift => ">>",
            AluOp::URShift => ">>>",
            AluOp::Gt => ">",
            AluOp::Lt => "<",
            AluOp::Ge => ">=",
            AluOp::Le => "<=",
            AluOp::Equal => "==",
            AluOp::NotEqual => "!=",
            AluOp::StrictEqual => "===",
            AluOp::StrictNotEqual => "!==",
            AluOp::Instanceof => "instanceof",
            AluOp::In => "in",
            AluOp::And => "&&",
            AluOp::Or => "||",
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Flags of a regular expression literal.
    pub struct RegExpFlags: u32 {
        /// `g`
        const GLOBAL = 0x01;
        /// `i`
        const IGNORE_CASE = 0x02;
        /// `m`
        const MULTILINE = 0x04;
    }
}

/// A name resolved at runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum Name {
    /// The `this` reference. Reading it has no side effect.
    This,
    /// A lookup of an identifier in the scope chain or the global object.
    Identifier(String),
}

/// The shape of an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Read of a temporary.
    Temp(Temp),
    /// A literal.
    Const(ConstValue),
    /// A string literal.
    String(String),
    /// A regular expression literal.
    RegExp {
        /// The pattern source.
        pattern: String,
        /// Its flags.
        flags: RegExpFlags,
    },
    /// A runtime name lookup.
    Name(Name),
    /// Creation of a closure over the function with the given index in the unit.
    Closure(u32),
    /// A unary operation.
    Unop(AluOp, Box<Expr>),
    /// A binary operation.
    Binop(AluOp, Box<Expr>, Box<Expr>),
    /// A call of `base` with `args`.
    Call(Box<Expr>, Vec<Expr>),
    /// A `new` expression.
    New(Box<Expr>, Vec<Expr>),
    /// `base[index]`
    Subscript(Box<Expr>, Box<Expr>),
    /// `base.name`
    Member(Box<Expr>, String),
}

/// An expression together with its inferred type.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    /// The expression itself.
    pub kind: ExprKind,
    /// The lattice type, [`IrType::UNKNOWN`] until inference runs.
    pub ty: IrType,
}

impl Expr {
    /// Wraps an [`ExprKind`] with an unknown type.
    #[must_use]
    pub fn new(kind: ExprKind) -> Self {
        let ty = match &kind {
            ExprKind::Const(value) => value.ir_type(),
            _ => IrType::UNKNOWN,
        };
        Expr { kind, ty }
    }

    /// Read of temp `index` in the current scope.
    #[must_use]
    pub fn temp(index: u32) -> Self {
        Expr::new(ExprKind::Temp(Temp::new(index)))
    }

    /// Read of a captured variable.
    #[must_use]
    pub fn scoped(index: u32, scope: u32) -> Self {
        Expr::new(ExprKind::Temp(Temp::scoped(index, scope)))
    }

    /// Read of the given temp.
    #[must_use]
    pub fn from_temp(temp: Temp) -> Self {
        Expr::new(ExprKind::Temp(temp))
    }

    /// A literal value.
    #[must_use]
    pub fn constant(value: ConstValue) -> Self {
        Expr::new(ExprKind::Const(value))
    }

    /// A number literal.
    #[must_use]
    pub fn number(value: f64) -> Self {
        Expr::constant(ConstValue::Number(value))
    }

    /// A boolean literal.
    #[must_use]
    pub fn boolean(value: bool) -> Self {
        Expr::constant(ConstValue::Bool(value))
    }

    /// The `undefined` literal.
    #[must_use]
    pub fn undefined() -> Self {
        Expr::constant(ConstValue::Undefined)
    }

    /// A string literal.
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Expr::new(ExprKind::String(value.into()))
    }

    /// A regular expression literal.
    #[must_use]
    pub fn regexp(pattern: impl Into<String>, flags: RegExpFlags) -> Self {
        Expr::new(ExprKind::RegExp {
            pattern: pattern.into(),
            flags,
        })
    }

    /// A name lookup.
    #[must_use]
    pub fn name(id: impl Into<String>) -> Self {
        Expr::new(ExprKind::Name(Name::Identifier(id.into())))
    }

    /// The `this` reference.
    #[must_use]
    pub fn this() -> Self {
        Expr::new(ExprKind::Name(Name::This))
    }

    /// A closure over function `index`.
    #[must_use]
    pub fn closure(index: u32) -> Self {
        Expr::new(ExprKind::Closure(index))
    }

    /// A unary operation.
    #[must_use]
    pub fn unop(op: AluOp, expr: Expr) -> Self {
        Expr::new(ExprKind::Unop(op, Box::new(expr)))
    }

    /// A binary operation.
    #[must_use]
    pub fn binop(op: AluOp, left: Expr, right: Expr) -> Self {
        Expr::new(ExprKind::Binop(op, Box::new(left), Box::new(right)))
    }

    /// A call.
    #[must_use]
    pub fn call(base: Expr, args: Vec<Expr>) -> Self {
        Expr::new(ExprKind::Call(Box::new(base), args))
    }

    /// A `new` expression.
    #[must_use]
    pub fn construct(base: Expr, args: Vec<Expr>) -> Self {
        Expr::new(ExprKind::New(Box::new(base), args))
    }

    /// An element access.
    #[must_use]
    pub fn subscript(base: Expr, index: Expr) -> Self {
        Expr::new(ExprKind::Subscript(Box::new(base), Box::new(index)))
    }

    /// A property access.
    #[must_use]
    pub fn member(base: Expr, name: impl Into<String>) -> Self {
        Expr::new(ExprKind::Member(Box::new(base), name.into()))
    }

    /// Returns the temp if this expression is a plain temp read.
    #[must_use]
    pub fn as_temp(&self) -> Option<Temp> {
        match self.kind {
            ExprKind::Temp(temp) => Some(temp),
            _ => None,
        }
    }

    /// Returns the literal if this expression is a constant.
    #[must_use]
    pub fn as_const(&self) -> Option<ConstValue> {
        match self.kind {
            ExprKind::Const(value) => Some(value),
            _ => None,
        }
    }

    /// Calls `f` for every temp read by this expression, left to right.
    pub fn for_each_temp(&self, f: &mut impl FnMut(Temp)) {
        match &self.kind {
            ExprKind::Temp(temp) => f(*temp),
            ExprKind::Const(_)
            | ExprKind::String(_)
            | ExprKind::RegExp { .. }
            | ExprKind::Name(_)
            | ExprKind::Closure(_) => {}
            ExprKind::Unop(_, expr) => expr.for_each_temp(f),
            ExprKind::Binop(_, left, right) => {
                left.for_each_temp(f);
                right.for_each_temp(f);
            }
            ExprKind::Call(base, args) | ExprKind::New(base, args) => {
                base.for_each_temp(f);
                for arg in args {
                    arg.for_each_temp(f);
                }
            }
            ExprKind::Subscript(base, index) => {
                base.for_each_temp(f);
                index.for_each_temp(f);
            }
            ExprKind::Member(base, _) => base.for_each_temp(f),
        }
    }

    /// Calls `f` for every temp read by this expression, allowing it to be rewritten.
    pub fn for_each_temp_mut(&mut self, f: &mut impl FnMut(&mut Temp)) {
        match &mut self.kind {
            ExprKind::Temp(temp) => f(temp),
            ExprKind::Const(_)
            | ExprKind::String(_)
            | ExprKind::RegExp { .. }
            | ExprKind::Name(_)
            | ExprKind::Closure(_) => {}
            ExprKind::Unop(_, expr) => expr.for_each_temp_mut(f),
            ExprKind::Binop(_, left, right) => {
                left.for_each_temp_mut(f);
                right.for_each_temp_mut(f);
            }
            ExprKind::Call(base, args) | ExprKind::New(base, args) => {
                base.for_each_temp_mut(f);
                for arg in args {
                    arg.for_each_temp_mut(f);
                }
            }
            ExprKind::Subscript(base, index) => {
                base.for_each_temp_mut(f);
                index.for_each_temp_mut(f);
            }
            ExprKind::Member(base, _) => base.for_each_temp_mut(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_const_types() {
        assert_eq!(ConstValue::Number(1.0).ir_type(), IrType::SINT32);
        assert_eq!(ConstValue::Number(-0.0).ir_type(), IrType::DOUBLE);
        assert_eq!(ConstValue::Number(0.5).ir_type(), IrType::DOUBLE);
        assert_eq!(ConstValue::Number(4_294_967_295.0).ir_type(), IrType::DOUBLE);
        assert_eq!(ConstValue::Bool(true).ir_type(), IrType::BOOL);
        assert_eq!(Expr::undefined().ty, IrType::UNDEFINED);
    }

    #[test]
    fn test_const_bits() {
        for value in [
            ConstValue::Undefined,
            ConstValue::Null,
            ConstValue::Bool(false),
            ConstValue::Bool(true),
            ConstValue::Number(-12.25),
        ] {
            assert_eq!(ConstValue::from_bits(value.to_bits()), value);
        }
        let nan = ConstValue::from_bits(ConstValue::Number(f64::NAN).to_bits());
        assert!(matches!(nan, ConstValue::Number(v) if v.is_nan()));
    }

    #[test]
    fn test_alu_op_repr() {
        for op in AluOp::iter() {
            assert_eq!(AluOp::from_repr(op as u8), Some(op));
        }
        assert!(AluOp::Increment.is_unary());
        assert!(!AluOp::Add.is_unary());
        assert!(AluOp::StrictNotEqual.is_comparison());
        assert_eq!(AluOp::URShift.symbol(), ">>>");
    }

    #[test]
    fn test_for_each_temp_order() {
        let expr = Expr::call(
            Expr::member(Expr::temp(3), "f"),
            vec![Expr::binop(AluOp::Add, Expr::temp(1), Expr::scoped(2, 1))],
        );
        let mut seen = Vec::new();
        expr.for_each_temp(&mut |t| seen.push(t));
        assert_eq!(seen, vec![Temp::new(3), Temp::new(1), Temp::scoped(2, 1)]);
    }

    #[test]
    fn test_for_each_temp_mut_rewrites() {
        let mut expr = Expr::binop(AluOp::Mul, Expr::temp(1), Expr::temp(1));
        expr.for_each_temp_mut(&mut |t| t.index += 10);
        match expr.kind {
            ExprKind::Binop(_, left, right) => {
                assert_eq!(left.as_temp(), Some(Temp::new(11)));
                assert_eq!(right.as_temp(), Some(Temp::new(11)));
            }
            _ => panic!("expected binop"),
        }
    }
}
