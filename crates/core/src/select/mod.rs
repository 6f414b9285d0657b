//! Instruction selection: turns a mnemonic plus an operand list into catalog-resolved
//! [`Instruction`]s appended to the current unit.

use imcc_ops::{OpInfo, OpcodeCatalog};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{ConfigError, SelectorConfig};
use crate::instruction::{
    DirectionMask, InsnId, Instruction, KeyedMask, StructuralKind, operand_format,
};
use crate::signature::Signature;
use crate::symbols::{NameAllocator, SymbolError, SymbolId, SymbolTable, ValueClass};
use crate::unit::Unit;

mod indexed;
mod multi_key;

#[cfg(test)]
mod tests;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectError {
    #[error("no opcode '{full_name}' for '{mnemonic}' with operands {signature}")]
    UnresolvedOpcode {
        mnemonic: String,
        signature: Signature,
        full_name: String,
    },
    #[error("cannot store a {value} through a {container} indexed by a {key}")]
    UnsupportedIndexedAssignment {
        container: ValueClass,
        key: ValueClass,
        value: ValueClass,
    },
    #[error("'{name}' is {class}, only aggregates can be indexed")]
    IllegalKeyedOperand { name: String, class: ValueClass },
    #[error("too many operands, at most {max} are allowed")]
    ArityExceeded { max: usize },
    #[error("unknown aggregate type '{name}'")]
    UnknownAggregateType { name: String },
    #[error(transparent)]
    Symbol(#[from] SymbolError),
}

/// Operands of the instruction being assembled. Handed to [`Selector::resolve`] by value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    operands: Vec<SymbolId>,
    keyed: KeyedMask,
    max_arity: usize,
}

impl BuildContext {
    pub fn new(max_arity: usize) -> Self {
        Self {
            operands: Vec::with_capacity(max_arity),
            keyed: KeyedMask::EMPTY,
            max_arity,
        }
    }

    pub fn clear(&mut self) {
        self.operands.clear();
        self.keyed = KeyedMask::EMPTY;
    }

    pub fn append(&mut self, operand: SymbolId) -> Result<(), SelectError> {
        if self.operands.len() >= self.max_arity {
            return Err(SelectError::ArityExceeded {
                max: self.max_arity,
            });
        }
        self.operands.push(operand);
        Ok(())
    }

    /// Appends `container[key]` as two operands and marks the container keyed.
    pub fn append_keyed(&mut self, container: SymbolId, key: SymbolId) -> Result<(), SelectError> {
        let position = self.operands.len();
        self.append(container)?;
        self.append(key)?;
        self.set_keyed(position);
        Ok(())
    }

    pub fn set_keyed(&mut self, position: usize) {
        self.keyed.insert(position);
    }

    pub fn operands(&self) -> &[SymbolId] {
        &self.operands
    }

    pub fn arity(&self) -> usize {
        self.operands.len()
    }

    pub fn keyed(&self) -> KeyedMask {
        self.keyed
    }
}

pub struct Selector<'a, C: OpcodeCatalog + ?Sized> {
    catalog: &'a C,
    config: SelectorConfig,
    symbols: SymbolTable,
    names: NameAllocator,
    instructions: Vec<Instruction>,
}

impl<'a, C: OpcodeCatalog + ?Sized> Selector<'a, C> {
    /// Fails when `config` does not pass [`SelectorConfig::validate`].
    pub fn new(catalog: &'a C, config: SelectorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            catalog,
            config,
            symbols: SymbolTable::default(),
            names: NameAllocator::default(),
            instructions: Vec::new(),
        })
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn symbols_mut(&mut self) -> &mut SymbolTable {
        &mut self.symbols
    }

    /// A fresh, empty context sized for this selector's arity limit.
    pub fn context(&self) -> BuildContext {
        BuildContext::new(self.config.max_arity)
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn instruction(&self, id: InsnId) -> &Instruction {
        &self.instructions[id.0 as usize]
    }

    /// Resolves `mnemonic` over the context's operands and appends the result. Two or more
    /// keyed containers expand into a group of single-key steps; the returned handle is
    /// the first instruction of that group.
    pub fn resolve(
        &mut self,
        mnemonic: &str,
        context: BuildContext,
    ) -> Result<InsnId, SelectError> {
        let result = if context.keyed().count() >= 2 {
            self.lower_multi_key(mnemonic, &context)
        } else {
            self.build(mnemonic, context.operands(), context.keyed())
                .map(|instruction| self.emit(instruction))
        };
        result.inspect_err(|error| warn!(mnemonic, %error, "instruction selection failed"))
    }

    /// Defines a label at the current position.
    pub fn label(&mut self, name: &str) -> Result<InsnId, SelectError> {
        let symbol = self.symbols.define_label(name)?;
        Ok(self.emit(Instruction::label(name, symbol)))
    }

    /// Integer constant holding the catalog id of an aggregate type.
    pub fn aggregate_type(&mut self, name: &str) -> Result<SymbolId, SelectError> {
        let id = self
            .catalog
            .aggregate_type(name)
            .ok_or_else(|| SelectError::UnknownAggregateType {
                name: name.to_string(),
            })?;
        Ok(self.symbols.constant(&id.to_string(), ValueClass::Integer))
    }

    pub fn finish(self) -> Unit {
        Unit::new(self.symbols, self.instructions)
    }

    fn lookup(&self, mnemonic: &str, signature: Signature) -> Result<&OpInfo, SelectError> {
        let full_name = signature.mangle(mnemonic);
        match self.catalog.lookup(&full_name) {
            Some(info) => Ok(info),
            None => Err(SelectError::UnresolvedOpcode {
                mnemonic: mnemonic.to_string(),
                signature,
                full_name,
            }),
        }
    }

    pub(crate) fn check_keyed(
        &self,
        operands: &[SymbolId],
        keyed: KeyedMask,
    ) -> Result<(), SelectError> {
        for position in keyed.positions() {
            assert!(
                position + 1 < operands.len(),
                "keyed operand at position {position} has no key"
            );
            let container = self.symbols.get(operands[position]);
            if container.class != ValueClass::Aggregate {
                return Err(SelectError::IllegalKeyedOperand {
                    name: container.display_text(),
                    class: container.class,
                });
            }
        }
        Ok(())
    }

    /// Builds a single-key (or unkeyed) instruction without appending it.
    pub(crate) fn build(
        &self,
        mnemonic: &str,
        operands: &[SymbolId],
        keyed: KeyedMask,
    ) -> Result<Instruction, SelectError> {
        debug_assert!(keyed.count() < 2, "multi-key operands reached the builder");
        self.check_keyed(operands, keyed)?;

        let signature = Signature::of(&self.symbols, operands, keyed);
        let info = self.lookup(mnemonic, signature)?;
        let kind = self.classify(info, mnemonic, operands);

        Ok(Instruction {
            mnemonic: mnemonic.to_string(),
            full_name: info.full_name.clone(),
            opcode: Some(info.opcode),
            operands: operands.to_vec(),
            format: operand_format(operands.len(), info.operand_count(), keyed),
            directions: DirectionMask::from_dirs(&info.dirs),
            keyed,
            kind,
        })
    }

    pub(crate) fn emit(&mut self, instruction: Instruction) -> InsnId {
        let id = InsnId(self.instructions.len() as u32);
        debug!(
            text = %instruction.render(&self.symbols),
            full_name = %instruction.full_name,
            "emit"
        );
        self.instructions.push(instruction);
        id
    }

    fn classify(&self, info: &OpInfo, mnemonic: &str, operands: &[SymbolId]) -> StructuralKind {
        if info.jump && !matches!(mnemonic, "bsr" | "ret") {
            if let Some(target_arg) = operands.len().checked_sub(1) {
                return StructuralKind::Branch {
                    target_arg,
                    unconditional: mnemonic == "branch",
                };
            }
            return StructuralKind::Plain;
        }

        match (mnemonic, operands) {
            ("set", [dest, source])
                if self.symbols.class(*dest) == ValueClass::Aggregate
                    && self.symbols.class(*source) == ValueClass::Aggregate =>
            {
                StructuralKind::RegisterAlias
            }
            ("set_addr", _) => StructuralKind::AddressTaking { target_arg: 1 },
            _ => StructuralKind::Plain,
        }
    }
}
