use imcc_ops::OpcodeCatalog;

use crate::instruction::InsnId;
use crate::symbols::{SymbolId, ValueClass};

use super::{SelectError, Selector};

impl<C: OpcodeCatalog + ?Sized> Selector<'_, C> {
    /// `dest = container[key]`. A string indexed by an integer reads one character
    /// through `substr`; everything else is a keyed `set` on an aggregate.
    pub fn indexed_fetch(
        &mut self,
        dest: SymbolId,
        container: SymbolId,
        key: SymbolId,
    ) -> Result<InsnId, SelectError> {
        let classes = (
            self.symbols.class(dest),
            self.symbols.class(container),
            self.symbols.class(key),
        );

        let mut context = self.context();
        if classes == (ValueClass::String, ValueClass::String, ValueClass::Integer) {
            let one = self.symbols.constant("1", ValueClass::Integer);
            context.append(dest)?;
            context.append(container)?;
            context.append(key)?;
            context.append(one)?;
            return self.resolve("substr", context);
        }

        context.append(dest)?;
        context.append_keyed(container, key)?;
        self.resolve("set", context)
    }

    /// `container[key] = value`. A string indexed by an integer has one character
    /// replaced in place; an aggregate gets a keyed `set`.
    pub fn indexed_store(
        &mut self,
        container: SymbolId,
        key: SymbolId,
        value: SymbolId,
    ) -> Result<InsnId, SelectError> {
        let classes = (
            self.symbols.class(container),
            self.symbols.class(key),
            self.symbols.class(value),
        );

        let mut context = self.context();
        match classes {
            (ValueClass::String, ValueClass::Integer, ValueClass::String) => {
                let one = self.symbols.constant("1", ValueClass::Integer);
                context.append(container)?;
                context.append(key)?;
                context.append(one)?;
                context.append(value)?;
                self.resolve("substr", context)
            }
            (ValueClass::Aggregate, _, _) => {
                context.append_keyed(container, key)?;
                context.append(value)?;
                self.resolve("set", context)
            }
            (container, key, value) => {
                let error = SelectError::UnsupportedIndexedAssignment {
                    container,
                    key,
                    value,
                };
                tracing::warn!(%error, "indexed store rejected");
                Err(error)
            }
        }
    }
}
