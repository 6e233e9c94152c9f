//! Binary operators usable inside expression operands.

use std::fmt;

/// Arithmetic operator of an expression operand such as `(.A + 1)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    /// `^`, exponentiation.
    Pow,
    /// `\`, division rounded toward negative infinity.
    FloorDiv,
}

impl BinaryOp {
    pub const fn as_symbol(self) -> char {
        match self {
            BinaryOp::Add => '+',
            BinaryOp::Sub => '-',
            BinaryOp::Mul => '*',
            BinaryOp::Div => '/',
            BinaryOp::Rem => '%',
            BinaryOp::Pow => '^',
            BinaryOp::FloorDiv => '\\',
        }
    }

    pub const fn from_symbol(symbol: char) -> Option<Self> {
        Some(match symbol {
            '+' => BinaryOp::Add,
            '-' => BinaryOp::Sub,
            '*' => BinaryOp::Mul,
            '/' => BinaryOp::Div,
            '%' => BinaryOp::Rem,
            '^' => BinaryOp::Pow,
            '\\' => BinaryOp::FloorDiv,
            _ => return None,
        })
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_round_trip() {
        for op in [
            BinaryOp::Add,
            BinaryOp::Sub,
            BinaryOp::Mul,
            BinaryOp::Div,
            BinaryOp::Rem,
            BinaryOp::Pow,
            BinaryOp::FloorDiv,
        ] {
            assert_eq!(BinaryOp::from_symbol(op.as_symbol()), Some(op));
        }
        assert_eq!(BinaryOp::from_symbol('&'), None);
    }
}
