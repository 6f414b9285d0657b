use imcc_ops::OpcodeCatalog;
use tracing::debug;

use crate::instruction::{InsnId, Instruction, KeyedMask};
use crate::symbols::{SymbolId, ValueClass};

use super::{BuildContext, SelectError, Selector};

/// One logical operand: a plain operand, or a keyed container with its key.
#[derive(Debug, Clone, Copy)]
enum Slot {
    Plain(SymbolId),
    Keyed { container: SymbolId, key: SymbolId },
}

fn slots(context: &BuildContext) -> Vec<Slot> {
    let operands = context.operands();
    let keyed = context.keyed();
    let mut slots = Vec::with_capacity(operands.len());
    let mut position = 0;
    while position < operands.len() {
        if keyed.contains(position) {
            slots.push(Slot::Keyed {
                container: operands[position],
                key: operands[position + 1],
            });
            position += 2;
        } else {
            slots.push(Slot::Plain(operands[position]));
            position += 1;
        }
    }
    slots
}

impl<C: OpcodeCatalog + ?Sized> Selector<'_, C> {
    /// Rewrites an operation over several keyed containers into single-key steps:
    /// every slot after the first is copied into a fresh aggregate temporary, the
    /// destination temporary is prepared, the operation runs over the temporaries and
    /// the destination is written back last. Emits `slots + 2` instructions.
    pub(super) fn lower_multi_key(
        &mut self,
        mnemonic: &str,
        context: &BuildContext,
    ) -> Result<InsnId, SelectError> {
        let keyed = context.keyed();
        assert!(
            keyed.count() >= 2,
            "multi-key lowering needs at least two keyed operands"
        );
        self.check_keyed(context.operands(), keyed)?;

        let mark = self.symbols.len();
        let names = self.names.clone();
        let slots = slots(context);
        let mut temps = Vec::with_capacity(slots.len());
        for _ in &slots {
            temps.push(self.symbols.temporary(&mut self.names, ValueClass::Aggregate));
        }

        // Build the whole group first so a failure leaves nothing emitted.
        let group = match self.build_group(mnemonic, &slots, &temps) {
            Ok(group) => group,
            Err(error) => {
                self.symbols.truncate(mark);
                self.names = names;
                return Err(error);
            }
        };

        let temp_names = temps
            .iter()
            .map(|temp| self.symbols.get(*temp).name.as_str())
            .collect::<Vec<_>>();
        debug!(
            mnemonic,
            temporaries = ?temp_names,
            steps = group.len(),
            "expanding multi-key operation"
        );

        let first = InsnId(self.instructions.len() as u32);
        for insn in group {
            self.emit(insn);
        }
        Ok(first)
    }

    /// Reads, prepare, operation, write-back, in emission order.
    fn build_group(
        &mut self,
        mnemonic: &str,
        slots: &[Slot],
        temps: &[SymbolId],
    ) -> Result<Vec<Instruction>, SelectError> {
        let operation = self.build(mnemonic, temps, KeyedMask::EMPTY)?;
        let write_back = self.store_slot(slots[0], temps[0])?;
        let mut group = Vec::with_capacity(slots.len() + 2);
        for (slot, temp) in slots.iter().zip(temps).skip(1) {
            group.push(self.load_slot(*slot, *temp)?);
        }
        let prepare = if operation.directions.reads(0) {
            self.load_slot(slots[0], temps[0])?
        } else {
            let init_type = self.config.init_type.clone();
            let type_id = self.aggregate_type(&init_type)?;
            self.build("new", &[temps[0], type_id], KeyedMask::EMPTY)?
        };
        group.push(prepare);
        group.push(operation);
        group.push(write_back);
        Ok(group)
    }

    /// `set temp, container[key]` or `set temp, operand`.
    fn load_slot(&self, slot: Slot, temp: SymbolId) -> Result<Instruction, SelectError> {
        match slot {
            Slot::Keyed { container, key } => {
                self.build("set", &[temp, container, key], KeyedMask::single(1))
            }
            Slot::Plain(operand) => self.build("set", &[temp, operand], KeyedMask::EMPTY),
        }
    }

    /// `set container[key], temp` or `set operand, temp`.
    fn store_slot(&self, slot: Slot, temp: SymbolId) -> Result<Instruction, SelectError> {
        match slot {
            Slot::Keyed { container, key } => {
                self.build("set", &[container, key, temp], KeyedMask::single(0))
            }
            Slot::Plain(operand) => self.build("set", &[operand, temp], KeyedMask::EMPTY),
        }
    }
}
