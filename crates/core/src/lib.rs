pub mod ast;
pub mod config;
pub mod diag;
pub mod driver;
pub mod instruction;
pub mod lexer;
pub mod lower;
pub mod parser;
pub mod select;
pub mod signature;
pub mod span;
pub mod symbols;
pub mod unit;

pub use config::{ConfigError, SelectorConfig};
pub use driver::{
    CompileError, CompileOutput, CompileRenderOptions, compile_source, compile_source_with,
};
pub use instruction::{InsnId, Instruction, KeyedMask, StructuralKind};
pub use select::{BuildContext, SelectError, Selector};
pub use unit::{InstructionRecord, Unit};
