use serde::Serialize;

use crate::instruction::{InsnId, Instruction, StructuralKind};
use crate::symbols::SymbolTable;

/// Selected instructions of one compilation unit, in emission order.
#[derive(Debug, Clone)]
pub struct Unit {
    symbols: SymbolTable,
    instructions: Vec<Instruction>,
}

/// Flat, serializable view of one instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstructionRecord {
    pub text: String,
    pub full_name: String,
    pub opcode: Option<u32>,
    pub kind: StructuralKind,
    pub keyed: Vec<usize>,
    pub ins: Vec<usize>,
    pub outs: Vec<usize>,
    pub in_outs: Vec<usize>,
}

impl Unit {
    pub fn new(symbols: SymbolTable, instructions: Vec<Instruction>) -> Self {
        Self {
            symbols,
            instructions,
        }
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn get(&self, id: InsnId) -> Option<&Instruction> {
        self.instructions.get(id.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn render(&self, instruction: &Instruction) -> String {
        instruction.render(&self.symbols)
    }

    /// Labels at column 0, instructions indented by four spaces.
    pub fn listing(&self) -> String {
        let mut out = String::new();
        for instruction in &self.instructions {
            if !instruction.is_label() {
                out.push_str("    ");
            }
            out.push_str(&self.render(instruction));
            out.push('\n');
        }
        out
    }

    pub fn records(&self) -> Vec<InstructionRecord> {
        self.instructions
            .iter()
            .map(|instruction| InstructionRecord {
                text: self.render(instruction),
                full_name: instruction.full_name.clone(),
                opcode: instruction.opcode,
                kind: instruction.kind,
                keyed: instruction.keyed.positions().collect(),
                ins: instruction.directions.ins().collect(),
                outs: instruction.directions.outs().collect(),
                in_outs: instruction.directions.in_outs().collect(),
            })
            .collect()
    }
}
