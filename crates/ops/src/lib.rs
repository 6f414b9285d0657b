use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod table;

use table::{
    AGGREGATE_TYPES, ARITH_FORMS, ARITH_MNEMONICS, COMPARE_FORMS, COMPARE_MNEMONICS, CORE_OPS,
    INTEGER_FORMS, INTEGER_MNEMONICS, POW_FORMS,
};

/// Operand direction as reported by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArgDir {
    In,
    Out,
    InOut,
}

impl ArgDir {
    pub fn reads(self) -> bool {
        matches!(self, ArgDir::In | ArgDir::InOut)
    }

    pub fn writes(self) -> bool {
        matches!(self, ArgDir::Out | ArgDir::InOut)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpDescriptor {
    pub mnemonic: &'static str,
    pub args: &'static [(&'static str, ArgDir)],
    pub jump: bool,
}

/// A resolved catalog entry, keyed by its mangled name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpInfo {
    pub opcode: u32,
    pub mnemonic: String,
    pub full_name: String,
    pub dirs: Vec<ArgDir>,
    pub jump: bool,
}

impl OpInfo {
    pub fn operand_count(&self) -> usize {
        self.dirs.len()
    }
}

/// Lookup service consumed by instruction selection.
pub trait OpcodeCatalog {
    fn lookup(&self, full_name: &str) -> Option<&OpInfo>;

    /// Numeric id of a named aggregate type, used by `new`.
    fn aggregate_type(&self, name: &str) -> Option<i64>;
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("op '{name}' is already defined in the catalog")]
    DuplicateOp { name: String },
    #[error("aggregate type '{name}' is already defined in the catalog")]
    DuplicateType { name: String },
    #[error("op '{mnemonic}' uses unknown operand tag '{tag}'")]
    InvalidTag { mnemonic: String, tag: String },
    #[error("invalid catalog file: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

/// Catalog extension file, merged over the built-in table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CatalogFile {
    pub ops: Vec<OpEntry>,
    pub aggregate_types: Vec<AggregateTypeEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpEntry {
    pub mnemonic: String,
    #[serde(default)]
    pub args: Vec<ArgSpec>,
    #[serde(default)]
    pub jump: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArgSpec {
    pub tag: String,
    pub dir: ArgDir,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AggregateTypeEntry {
    pub name: String,
    pub id: i64,
}

impl CatalogFile {
    pub fn from_ron(text: &str) -> Result<Self, CatalogError> {
        Ok(ron::from_str(text)?)
    }
}

const VALID_TAGS: [&str; 11] = ["i", "ic", "n", "nc", "s", "sc", "p", "k", "kc", "ki", "kic"];

pub fn is_valid_tag(tag: &str) -> bool {
    VALID_TAGS.contains(&tag)
}

/// Joins a mnemonic and operand tags into the catalog key, e.g. `add_i_i_ic`.
pub fn full_name<'a>(mnemonic: &str, tags: impl IntoIterator<Item = &'a str>) -> String {
    let mut name = mnemonic.to_string();
    for tag in tags {
        name.push('_');
        name.push_str(tag);
    }
    name
}

/// Built-in core op table, optionally extended from a [`CatalogFile`].
#[derive(Debug, Clone)]
pub struct CoreOps {
    ops: IndexMap<String, OpInfo>,
    aggregate_types: FxHashMap<String, i64>,
}

impl Default for CoreOps {
    fn default() -> Self {
        Self::new()
    }
}

impl CoreOps {
    pub fn new() -> Self {
        let mut catalog = Self {
            ops: IndexMap::new(),
            aggregate_types: FxHashMap::default(),
        };

        for descriptor in CORE_OPS {
            catalog.insert_builtin(descriptor.mnemonic, descriptor.args, descriptor.jump);
        }
        for mnemonic in ARITH_MNEMONICS {
            for args in ARITH_FORMS {
                catalog.insert_builtin(mnemonic, args, false);
            }
        }
        for mnemonic in INTEGER_MNEMONICS {
            for args in INTEGER_FORMS {
                catalog.insert_builtin(mnemonic, args, false);
            }
        }
        for args in POW_FORMS {
            catalog.insert_builtin("pow", args, false);
        }
        for mnemonic in COMPARE_MNEMONICS {
            for args in COMPARE_FORMS {
                catalog.insert_builtin(mnemonic, args, true);
            }
        }
        for (name, id) in AGGREGATE_TYPES {
            catalog.aggregate_types.insert(name.to_string(), id);
        }

        catalog
    }

    pub fn with_extensions(file: CatalogFile) -> Result<Self, CatalogError> {
        let mut catalog = Self::new();
        catalog.extend(file)?;
        Ok(catalog)
    }

    pub fn extend(&mut self, file: CatalogFile) -> Result<(), CatalogError> {
        for entry in file.ops {
            if let Some(bad) = entry.args.iter().find(|arg| !is_valid_tag(&arg.tag)) {
                return Err(CatalogError::InvalidTag {
                    mnemonic: entry.mnemonic.clone(),
                    tag: bad.tag.clone(),
                });
            }
            let name = full_name(&entry.mnemonic, entry.args.iter().map(|arg| arg.tag.as_str()));
            if self.ops.contains_key(&name) {
                return Err(CatalogError::DuplicateOp { name });
            }
            let dirs = entry.args.iter().map(|arg| arg.dir).collect();
            self.insert(entry.mnemonic, name, dirs, entry.jump);
        }

        for ty in file.aggregate_types {
            if self.aggregate_types.contains_key(&ty.name) {
                return Err(CatalogError::DuplicateType { name: ty.name });
            }
            self.aggregate_types.insert(ty.name, ty.id);
        }

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OpInfo> {
        self.ops.values()
    }

    pub fn by_mnemonic<'a>(&'a self, mnemonic: &'a str) -> impl Iterator<Item = &'a OpInfo> {
        self.ops
            .values()
            .filter(move |info| info.mnemonic == mnemonic)
    }

    /// Known aggregate types, ordered by id.
    pub fn aggregate_types(&self) -> Vec<(&str, i64)> {
        let mut types = self
            .aggregate_types
            .iter()
            .map(|(name, id)| (name.as_str(), *id))
            .collect::<Vec<_>>();
        types.sort_by_key(|(name, id)| (*id, *name));
        types
    }

    fn insert_builtin(&mut self, mnemonic: &str, args: &[(&str, ArgDir)], jump: bool) {
        let name = full_name(mnemonic, args.iter().map(|(tag, _)| *tag));
        debug_assert!(
            !self.ops.contains_key(&name),
            "duplicate built-in op {name}"
        );
        let dirs = args.iter().map(|(_, dir)| *dir).collect();
        self.insert(mnemonic.to_string(), name, dirs, jump);
    }

    fn insert(&mut self, mnemonic: String, name: String, dirs: Vec<ArgDir>, jump: bool) {
        let opcode = self.ops.len() as u32;
        self.ops.insert(
            name.clone(),
            OpInfo {
                opcode,
                mnemonic,
                full_name: name,
                dirs,
                jump,
            },
        );
    }
}

impl OpcodeCatalog for CoreOps {
    fn lookup(&self, full_name: &str) -> Option<&OpInfo> {
        self.ops.get(full_name)
    }

    fn aggregate_type(&self, name: &str) -> Option<i64> {
        self.aggregate_types.get(name).copied()
    }
}
