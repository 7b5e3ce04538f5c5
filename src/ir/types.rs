//! The type lattice used by type inference and propagation.
//!
//! An [`IrType`] is a set of runtime types a value may have at a program point.
//! [`IrType::UNKNOWN`] (the empty set) is the bottom element and set union is the
//! join, so a value's type can only grow as inference learns more about it. The
//! lattice has finite height, which is what makes the inference fixpoint terminate.
//!
//! # Examples
//!
//! ```rust,ignore
//! use ssair::ir::{IrType, JoinSemiLattice};
//!
//! let int = IrType::SINT32;
//! let merged = int.join(&IrType::DOUBLE);
//! assert!(merged.is_number());
//! assert_eq!(merged.collapse_phi(), IrType::DOUBLE);
//! ```

use std::fmt::{self, Debug};

use bitflags::bitflags;

/// A join semi-lattice with a join (least upper bound) operation.
///
/// The join must be idempotent, commutative and associative. Values produced by
/// repeated joins only ever move towards [`JoinSemiLattice::is_top`].
pub trait JoinSemiLattice: Clone + Debug + PartialEq {
    /// Returns the bottom element, the identity of [`JoinSemiLattice::join`].
    fn bottom() -> Self;

    /// Computes the join (least upper bound) of two lattice elements.
    #[must_use]
    fn join(&self, other: &Self) -> Self;

    /// Returns `true` if this is the top element.
    fn is_top(&self) -> bool;
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Bit-flag union of the runtime types a value may have.
    pub struct IrType: u16 {
        /// A value that is not present, such as a missing argument.
        const MISSING = 0x0001;
        /// The `undefined` value.
        const UNDEFINED = 0x0002;
        /// The `null` value.
        const NULL = 0x0004;
        /// A boolean.
        const BOOL = 0x0008;
        /// A signed 32-bit integer.
        const SINT32 = 0x0010;
        /// An unsigned 32-bit integer.
        const UINT32 = 0x0020;
        /// A double precision number.
        const DOUBLE = 0x0040;
        /// A string.
        const STRING = 0x0080;
        /// Any object, including functions and arrays.
        const OBJECT = 0x0100;
        /// Any numeric representation.
        const NUMBER = Self::SINT32.bits() | Self::UINT32.bits() | Self::DOUBLE.bits();
    }
}

impl IrType {
    /// The bottom element: nothing is known about the value yet.
    pub const UNKNOWN: IrType = IrType::empty();

    /// Returns true if nothing is known about the value.
    #[must_use]
    pub fn is_unknown(self) -> bool {
        self.is_empty()
    }

    /// Returns true if the value is known and only ever numeric.
    #[must_use]
    pub fn is_number(self) -> bool {
        !self.is_empty() && IrType::NUMBER.contains(self)
    }

    /// Collapses the joined type of a phi's operands into a single representation.
    ///
    /// Any object, `undefined` or `null` operand forces a boxed object; otherwise any
    /// numeric operand widens the phi to a double. Remaining types are kept as is.
    #[must_use]
    pub fn collapse_phi(self) -> IrType {
        if self.intersects(IrType::OBJECT | IrType::UNDEFINED | IrType::NULL) {
            IrType::OBJECT
        } else if self.intersects(IrType::NUMBER) {
            IrType::DOUBLE
        } else {
            self
        }
    }
}

impl JoinSemiLattice for IrType {
    fn bottom() -> Self {
        IrType::UNKNOWN
    }

    fn join(&self, other: &Self) -> Self {
        *self | *other
    }

    fn is_top(&self) -> bool {
        *self == IrType::all()
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unknown() {
            return f.write_str("unknown");
        }

        let names = [
            (IrType::MISSING, "missing"),
            (IrType::UNDEFINED, "undefined"),
            (IrType::NULL, "null"),
            (IrType::BOOL, "bool"),
            (IrType::SINT32, "int"),
            (IrType::UINT32, "uint"),
            (IrType::DOUBLE, "double"),
            (IrType::STRING, "string"),
            (IrType::OBJECT, "object"),
        ];

        let mut first = true;
        for (flag, name) in names {
            if self.contains(flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}
