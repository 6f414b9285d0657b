use std::fmt;

use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use thiserror::Error;

/// Register set of an operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ValueClass {
    Integer,
    Float,
    String,
    Aggregate,
}

impl ValueClass {
    /// Tag used in mangled op names.
    pub fn tag(self) -> &'static str {
        match self {
            ValueClass::Integer => "i",
            ValueClass::Float => "n",
            ValueClass::String => "s",
            ValueClass::Aggregate => "p",
        }
    }

    pub fn register_prefix(self) -> char {
        match self {
            ValueClass::Integer => 'I',
            ValueClass::Float => 'N',
            ValueClass::String => 'S',
            ValueClass::Aggregate => 'P',
        }
    }

    pub fn from_register_prefix(prefix: char) -> Option<Self> {
        match prefix {
            'I' => Some(ValueClass::Integer),
            'N' => Some(ValueClass::Float),
            'S' => Some(ValueClass::String),
            'P' => Some(ValueClass::Aggregate),
            _ => None,
        }
    }

    /// Maps `.local` type names.
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "int" => Some(ValueClass::Integer),
            "float" | "num" => Some(ValueClass::Float),
            "string" => Some(ValueClass::String),
            "pmc" => Some(ValueClass::Aggregate),
            _ => None,
        }
    }
}

impl fmt::Display for ValueClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueClass::Integer => "integer",
            ValueClass::Float => "float",
            ValueClass::String => "string",
            ValueClass::Aggregate => "aggregate",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SymbolId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OperandKind {
    Variable,
    Constant,
    AddressSymbol,
    PhysicalRegister(u8),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Symbol {
    pub name: String,
    pub class: ValueClass,
    pub kind: OperandKind,
}

impl Symbol {
    /// Operand text as it appears in a listing.
    pub fn display_text(&self) -> String {
        match self.kind {
            OperandKind::Constant if self.class == ValueClass::String => {
                let escaped: String = self.name.chars().flat_map(char::escape_default).collect();
                format!("\"{escaped}\"")
            }
            OperandKind::PhysicalRegister(index) => {
                format!("{}{}", self.class.register_prefix(), index)
            }
            _ => self.name.clone(),
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.kind, OperandKind::Constant | OperandKind::AddressSymbol)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymbolError {
    #[error("'{name}' is already defined")]
    Redefined { name: String },
    #[error("'{name}' is declared as {existing}, but used as {requested}")]
    ClassConflict {
        name: String,
        existing: ValueClass,
        requested: ValueClass,
    },
    #[error("'{name}' is not a {expected}")]
    KindConflict { name: String, expected: &'static str },
}

/// Hands out temporary names that are unused in a symbol table.
#[derive(Debug, Clone, Default)]
pub struct NameAllocator {
    next: u32,
}

impl NameAllocator {
    pub fn next_unused(&mut self, class: ValueClass, table: &SymbolTable) -> String {
        loop {
            self.next += 1;
            let name = format!("${}{}", class.register_prefix(), self.next);
            if !table.is_taken(&name) {
                return name;
            }
        }
    }
}

/// Arena of every operand in a unit.
///
/// Variables, physical registers and labels share one name index. Constants are interned
/// per text and class; composite keys are never interned.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    names: IndexMap<String, SymbolId>,
    constants: FxHashMap<(String, ValueClass), SymbolId>,
    defined_labels: FxHashSet<SymbolId>,
}

impl SymbolTable {
    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0 as usize]
    }

    pub fn class(&self, id: SymbolId) -> ValueClass {
        self.get(id).class
    }

    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.names.get(name).copied()
    }

    pub fn is_taken(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SymbolId, &Symbol)> {
        self.symbols
            .iter()
            .enumerate()
            .map(|(index, symbol)| (SymbolId(index as u32), symbol))
    }

    /// `.local` declaration: a second declaration of the name is an error.
    pub fn declare(&mut self, name: &str, class: ValueClass) -> Result<SymbolId, SymbolError> {
        if self.is_taken(name) {
            return Err(SymbolError::Redefined {
                name: name.to_string(),
            });
        }
        Ok(self.push_named(name.to_string(), class, OperandKind::Variable))
    }

    /// Returns the variable for `name`, creating it on first mention.
    pub fn variable(&mut self, name: &str, class: ValueClass) -> Result<SymbolId, SymbolError> {
        match self.lookup(name) {
            Some(id) => self.expect_value(id, class),
            None => Ok(self.push_named(name.to_string(), class, OperandKind::Variable)),
        }
    }

    pub fn physical(&mut self, class: ValueClass, index: u8) -> Result<SymbolId, SymbolError> {
        let name = format!("{}{}", class.register_prefix(), index);
        match self.lookup(&name) {
            Some(id) => self.expect_value(id, class),
            None => Ok(self.push_named(name, class, OperandKind::PhysicalRegister(index))),
        }
    }

    pub fn constant(&mut self, text: &str, class: ValueClass) -> SymbolId {
        let key = (text.to_string(), class);
        if let Some(id) = self.constants.get(&key) {
            return *id;
        }
        let id = self.push(Symbol {
            name: text.to_string(),
            class,
            kind: OperandKind::Constant,
        });
        self.constants.insert(key, id);
        id
    }

    /// Add-or-reuse: branch targets may mention a label any number of times.
    pub fn address(&mut self, name: &str) -> Result<SymbolId, SymbolError> {
        match self.lookup(name) {
            Some(id) if self.get(id).kind == OperandKind::AddressSymbol => Ok(id),
            Some(_) => Err(SymbolError::KindConflict {
                name: name.to_string(),
                expected: "label",
            }),
            None => Ok(self.push_named(
                name.to_string(),
                ValueClass::Integer,
                OperandKind::AddressSymbol,
            )),
        }
    }

    /// Add-unique: a label or subroutine may be defined once. A forward reference made
    /// through [`SymbolTable::address`] is adopted by its definition.
    pub fn define_label(&mut self, name: &str) -> Result<SymbolId, SymbolError> {
        let id = self.address(name)?;
        if !self.defined_labels.insert(id) {
            return Err(SymbolError::Redefined {
                name: name.to_string(),
            });
        }
        Ok(id)
    }

    pub fn is_defined_label(&self, id: SymbolId) -> bool {
        self.defined_labels.contains(&id)
    }

    /// Labels that were referenced but never defined, in first-mention order.
    pub fn undefined_labels(&self) -> impl Iterator<Item = &str> {
        self.names.iter().filter_map(|(name, id)| {
            let undefined = self.get(*id).kind == OperandKind::AddressSymbol
                && !self.defined_labels.contains(id);
            undefined.then_some(name.as_str())
        })
    }

    /// Drops every symbol created at or after index `len`, with its name, interned
    /// constant and label entries.
    pub(crate) fn truncate(&mut self, len: usize) {
        if len >= self.symbols.len() {
            return;
        }
        self.symbols.truncate(len);
        self.names.retain(|_, id| (id.0 as usize) < len);
        self.constants.retain(|_, id| (id.0 as usize) < len);
        self.defined_labels.retain(|id| (id.0 as usize) < len);
    }

    pub fn temporary(&mut self, names: &mut NameAllocator, class: ValueClass) -> SymbolId {
        let name = names.next_unused(class, self);
        self.push_named(name, class, OperandKind::Variable)
    }

    fn composite_key(&mut self, parts: &[SymbolId]) -> SymbolId {
        let name = parts
            .iter()
            .map(|part| self.get(*part).display_text())
            .collect::<Vec<_>>()
            .join(";");
        let all_constant = parts.iter().all(|part| self.get(*part).is_constant());
        let kind = if all_constant {
            OperandKind::Constant
        } else {
            OperandKind::Variable
        };
        self.push(Symbol {
            name,
            class: ValueClass::Aggregate,
            kind,
        })
    }

    fn expect_value(&self, id: SymbolId, class: ValueClass) -> Result<SymbolId, SymbolError> {
        let symbol = self.get(id);
        if symbol.kind == OperandKind::AddressSymbol {
            return Err(SymbolError::KindConflict {
                name: symbol.name.clone(),
                expected: "register or variable",
            });
        }
        if symbol.class != class {
            return Err(SymbolError::ClassConflict {
                name: symbol.name.clone(),
                existing: symbol.class,
                requested: class,
            });
        }
        Ok(id)
    }

    fn push_named(&mut self, name: String, class: ValueClass, kind: OperandKind) -> SymbolId {
        let id = self.push(Symbol {
            name: name.clone(),
            class,
            kind,
        });
        self.names.insert(name, id);
        id
    }

    fn push(&mut self, symbol: Symbol) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(symbol);
        id
    }
}

/// Nested index keys collected left to right: `a[k1][k2]` holds `[k1, k2]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyChain {
    keys: Vec<SymbolId>,
}

impl KeyChain {
    pub fn new(first: SymbolId) -> Self {
        Self { keys: vec![first] }
    }

    pub fn push(&mut self, key: SymbolId) {
        self.keys.push(key);
    }

    /// Folds the chain into the single key operand attached to an instruction.
    pub fn collapse(self, table: &mut SymbolTable) -> SymbolId {
        match self.keys.as_slice() {
            [single] => *single,
            parts => table.composite_key(parts),
        }
    }
}
