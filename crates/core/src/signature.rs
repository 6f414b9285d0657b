use std::fmt;

use crate::instruction::KeyedMask;
use crate::symbols::{OperandKind, Symbol, SymbolId, SymbolTable, ValueClass};

/// One operand's contribution to a mangled op name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgTag {
    Register(ValueClass),
    Constant(ValueClass),
    Address,
    Key { integer: bool, constant: bool },
}

impl ArgTag {
    pub fn of(symbol: &Symbol, is_key: bool) -> Self {
        if is_key {
            return ArgTag::Key {
                integer: symbol.class == ValueClass::Integer,
                constant: symbol.is_constant(),
            };
        }
        match symbol.kind {
            OperandKind::AddressSymbol => ArgTag::Address,
            OperandKind::Constant => ArgTag::Constant(symbol.class),
            OperandKind::Variable | OperandKind::PhysicalRegister(_) => {
                ArgTag::Register(symbol.class)
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ArgTag::Register(class) => class.tag(),
            ArgTag::Constant(ValueClass::Integer) | ArgTag::Address => "ic",
            ArgTag::Constant(ValueClass::Float) => "nc",
            ArgTag::Constant(ValueClass::String) => "sc",
            ArgTag::Constant(ValueClass::Aggregate) => "pc",
            ArgTag::Key {
                integer: false,
                constant: false,
            } => "k",
            ArgTag::Key {
                integer: false,
                constant: true,
            } => "kc",
            ArgTag::Key {
                integer: true,
                constant: false,
            } => "ki",
            ArgTag::Key {
                integer: true,
                constant: true,
            } => "kic",
        }
    }
}

/// Ordered operand tags of one instruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Signature {
    tags: Vec<ArgTag>,
}

impl Signature {
    pub fn new(tags: Vec<ArgTag>) -> Self {
        Self { tags }
    }

    pub fn of(symbols: &SymbolTable, operands: &[SymbolId], keyed: KeyedMask) -> Self {
        let tags = operands
            .iter()
            .enumerate()
            .map(|(position, id)| ArgTag::of(symbols.get(*id), keyed.is_key_position(position)))
            .collect();
        Self { tags }
    }

    pub fn tags(&self) -> &[ArgTag] {
        &self.tags
    }

    /// Catalog key: `mnemonic` followed by `_tag` per operand.
    pub fn mangle(&self, mnemonic: &str) -> String {
        imcc_ops::full_name(mnemonic, self.tags.iter().map(|tag| tag.as_str()))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (index, tag) in self.tags.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            f.write_str(tag.as_str())?;
        }
        f.write_str(")")
    }
}
