use imcc_ops::ArgDir;
use serde::Serialize;

use crate::symbols::{SymbolId, SymbolTable};

/// Handle of an instruction inside a [`crate::unit::Unit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct InsnId(pub u32);

/// Operand positions that are keyed containers. The key of a container at position `i`
/// sits at `i + 1`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct KeyedMask(u16);

impl KeyedMask {
    pub const EMPTY: KeyedMask = KeyedMask(0);

    pub fn single(position: usize) -> Self {
        Self::EMPTY.with(position)
    }

    pub fn with(mut self, position: usize) -> Self {
        self.insert(position);
        self
    }

    pub fn insert(&mut self, position: usize) {
        assert!(position < 16, "keyed position {position} out of range");
        self.0 |= 1 << position;
    }

    pub fn contains(self, position: usize) -> bool {
        position < 16 && self.0 & (1 << position) != 0
    }

    pub fn count(self) -> u32 {
        self.0.count_ones()
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn positions(self) -> impl Iterator<Item = usize> {
        (0..16).filter(move |position| self.contains(*position))
    }

    /// True when `position` holds the key of the container just before it.
    pub fn is_key_position(self, position: usize) -> bool {
        position > 0 && self.contains(position - 1)
    }
}

/// Per-operand read/write bits. An in-out operand sets its IN bit and the in-out bit,
/// but not the OUT bit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DirectionMask {
    ins: u16,
    outs: u16,
    in_outs: u16,
}

impl DirectionMask {
    pub fn from_dirs(dirs: &[ArgDir]) -> Self {
        let mut mask = Self::default();
        for (position, dir) in dirs.iter().enumerate().take(16) {
            let bit = 1 << position;
            if dir.reads() {
                mask.ins |= bit;
            }
            if dir.writes() {
                if dir.reads() {
                    mask.in_outs |= bit;
                } else {
                    mask.outs |= bit;
                }
            }
        }
        mask
    }

    pub fn reads(self, position: usize) -> bool {
        position < 16 && self.ins & (1 << position) != 0
    }

    pub fn writes(self, position: usize) -> bool {
        position < 16 && self.outs & (1 << position) != 0
    }

    pub fn in_out(self, position: usize) -> bool {
        position < 16 && self.in_outs & (1 << position) != 0
    }

    pub fn ins(self) -> impl Iterator<Item = usize> {
        (0..16).filter(move |position| self.reads(*position))
    }

    pub fn outs(self) -> impl Iterator<Item = usize> {
        (0..16).filter(move |position| self.writes(*position))
    }

    pub fn in_outs(self) -> impl Iterator<Item = usize> {
        (0..16).filter(move |position| self.in_out(*position))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StructuralKind {
    Plain,
    Label,
    Branch {
        target_arg: usize,
        unconditional: bool,
    },
    AddressTaking {
        target_arg: usize,
    },
    RegisterAlias,
}

/// A resolved instruction. Built once by the selector and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub mnemonic: String,
    pub full_name: String,
    /// `None` for label definitions.
    pub opcode: Option<u32>,
    pub operands: Vec<SymbolId>,
    /// Operand template, e.g. `{}, {}[{}]`.
    pub format: String,
    pub directions: DirectionMask,
    pub keyed: KeyedMask,
    pub kind: StructuralKind,
}

impl Instruction {
    pub fn label(name: &str, symbol: SymbolId) -> Self {
        Self {
            mnemonic: name.to_string(),
            full_name: name.to_string(),
            opcode: None,
            operands: vec![symbol],
            format: String::new(),
            directions: DirectionMask::default(),
            keyed: KeyedMask::EMPTY,
            kind: StructuralKind::Label,
        }
    }

    pub fn is_label(&self) -> bool {
        self.kind == StructuralKind::Label
    }

    /// Operand of a branch or address-taking instruction that names the target label.
    pub fn target(&self) -> Option<SymbolId> {
        match self.kind {
            StructuralKind::Branch { target_arg, .. }
            | StructuralKind::AddressTaking { target_arg } => {
                self.operands.get(target_arg).copied()
            }
            _ => None,
        }
    }

    /// Text form: `name:` for labels, otherwise `mnemonic operands`.
    pub fn render(&self, symbols: &SymbolTable) -> String {
        if self.is_label() {
            return format!("{}:", self.mnemonic);
        }

        let mut operands = self.operands.iter();
        let mut text = String::with_capacity(self.mnemonic.len() + self.format.len() + 16);
        text.push_str(&self.mnemonic);
        if self.format.is_empty() {
            return text;
        }
        text.push(' ');

        let mut pieces = self.format.split("{}").peekable();
        while let Some(piece) = pieces.next() {
            text.push_str(piece);
            if pieces.peek().is_some()
                && let Some(operand) = operands.next()
            {
                text.push_str(&symbols.get(*operand).display_text());
            }
        }
        text
    }
}

/// Builds the operand template for `operand_count` flat operands: a keyed container
/// consumes its key as `{}[{}]`. Positions past `catalog_count` are dropped.
pub fn operand_format(operand_count: usize, catalog_count: usize, keyed: KeyedMask) -> String {
    let limit = operand_count.min(catalog_count);
    let mut parts = Vec::new();
    let mut position = 0;
    while position < limit {
        if keyed.contains(position) {
            parts.push("{}[{}]");
            position += 2;
        } else {
            parts.push("{}");
            position += 1;
        }
    }
    parts.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::ValueClass;

    #[test]
    fn keyed_mask_tracks_positions() {
        let mask = KeyedMask::single(0).with(2);
        assert_eq!(mask.count(), 2);
        assert!(mask.contains(2));
        assert!(!mask.contains(1));
        assert!(mask.is_key_position(1));
        assert!(mask.is_key_position(3));
        assert!(!mask.is_key_position(0));
        assert_eq!(mask.positions().collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn in_out_sets_in_and_in_out_bits() {
        let mask = DirectionMask::from_dirs(&[ArgDir::InOut, ArgDir::In, ArgDir::Out]);
        assert!(mask.reads(0));
        assert!(mask.in_out(0));
        assert!(!mask.writes(0));
        assert!(mask.reads(1));
        assert!(mask.writes(2));
        assert_eq!(mask.ins().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(mask.outs().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn format_brackets_keyed_containers() {
        assert_eq!(operand_format(3, 3, KeyedMask::single(1)), "{}, {}[{}]");
        assert_eq!(operand_format(3, 3, KeyedMask::single(0)), "{}[{}], {}");
        assert_eq!(operand_format(2, 2, KeyedMask::EMPTY), "{}, {}");
        assert_eq!(operand_format(0, 0, KeyedMask::EMPTY), "");
    }

    #[test]
    fn format_drops_positions_past_catalog_count() {
        assert_eq!(operand_format(3, 2, KeyedMask::EMPTY), "{}, {}");
    }

    #[test]
    fn renders_label_and_operands() {
        let mut symbols = SymbolTable::default();
        let dest = symbols
            .variable("$P1", ValueClass::Aggregate)
            .expect("dest");
        let container = symbols
            .variable("$P2", ValueClass::Aggregate)
            .expect("container");
        let key = symbols.constant("k", ValueClass::String);
        let insn = Instruction {
            mnemonic: "set".to_string(),
            full_name: "set_p_p_kc".to_string(),
            opcode: Some(0),
            operands: vec![dest, container, key],
            format: operand_format(3, 3, KeyedMask::single(1)),
            directions: DirectionMask::from_dirs(&[ArgDir::Out, ArgDir::In, ArgDir::In]),
            keyed: KeyedMask::single(1),
            kind: StructuralKind::Plain,
        };
        assert_eq!(insn.render(&symbols), "set $P1, $P2[\"k\"]");

        let label = symbols.define_label("loop").expect("label");
        assert_eq!(Instruction::label("loop", label).render(&symbols), "loop:");
    }
}
