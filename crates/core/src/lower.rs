use imcc_ops::OpcodeCatalog;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::ast::{Atom, Condition, File, Operand, Stmt, Value};
use crate::diag::Diagnostic;
use crate::select::{BuildContext, SelectError, Selector};
use crate::span::{Span, Spanned};
use crate::symbols::{KeyChain, OperandKind, SymbolError, SymbolId, ValueClass};
use crate::unit::Unit;

#[derive(Debug)]
pub struct LowerOutput {
    pub unit: Unit,
    pub warnings: Vec<Diagnostic>,
}

/// Runs every statement of `file` through `selector`. Selection stops at the first failing
/// statement; undefined labels are reported together once the file is done.
pub fn lower<C: OpcodeCatalog + ?Sized>(
    file: &File,
    selector: Selector<'_, C>,
) -> Result<LowerOutput, Vec<Diagnostic>> {
    debug!(statements = file.statements.len(), "lowering unit");
    let mut lowerer = Lowerer {
        selector,
        open_sub: None,
        label_refs: FxHashMap::default(),
    };
    for stmt in &file.statements {
        lowerer
            .statement(stmt)
            .map_err(|diagnostic| vec![diagnostic])?;
    }
    lowerer.finish()
}

struct Lowerer<'a, C: OpcodeCatalog + ?Sized> {
    selector: Selector<'a, C>,
    open_sub: Option<(String, Span)>,
    /// First mention of every label, for undefined-label errors.
    label_refs: FxHashMap<SymbolId, Span>,
}

impl<C: OpcodeCatalog + ?Sized> Lowerer<'_, C> {
    fn statement(&mut self, stmt: &Spanned<Stmt>) -> Result<(), Diagnostic> {
        let span = stmt.span;
        match &stmt.node {
            Stmt::Sub(name) => {
                if let Some((open, open_span)) = &self.open_sub {
                    return Err(Diagnostic::error(
                        span,
                        format!("'.sub {name}' starts inside '.sub {open}'"),
                    )
                    .with_label(*open_span, "still open")
                    .with_help("close the previous subroutine with '.end'"));
                }
                self.selector
                    .label(name)
                    .map_err(|error| select_diagnostic(span, error))?;
                self.open_sub = Some((name.clone(), span));
            }
            Stmt::EndSub => {
                if self.open_sub.take().is_none() {
                    return Err(Diagnostic::error(span, "'.end' without an open '.sub'"));
                }
            }
            Stmt::Local { type_name, name } => {
                let class = ValueClass::from_type_name(type_name).ok_or_else(|| {
                    Diagnostic::error(span, format!("unknown type '{type_name}'"))
                        .with_help("expected one of int, float, num, string, pmc")
                })?;
                self.selector
                    .symbols_mut()
                    .declare(name, class)
                    .map_err(|error| select_diagnostic(span, error.into()))?;
            }
            Stmt::Label(name) => {
                self.selector
                    .label(name)
                    .map_err(|error| select_diagnostic(span, error))?;
            }
            Stmt::Instruction { mnemonic, operands } => {
                let operands = operands.iter().collect::<Vec<_>>();
                self.operation(span, mnemonic, &operands)?;
            }
            Stmt::Assign { target, value } => self.assign(span, target, value)?,
            Stmt::Goto(label) => self.jump(span, "branch", label)?,
            Stmt::Call(label) => self.jump(span, "bsr", label)?,
            Stmt::If {
                negate,
                cond,
                label,
            } => {
                let mut context = self.selector.context();
                let mnemonic = match cond {
                    Condition::Truth(operand) => {
                        self.append(&mut context, operand)?;
                        if *negate { "unless" } else { "if" }
                    }
                    // `unless a < b` branches on the inverse relation.
                    Condition::Compare { op, lhs, rhs } => {
                        self.append(&mut context, lhs)?;
                        self.append(&mut context, rhs)?;
                        let op = if *negate { op.inverse() } else { *op };
                        op.mnemonic()
                    }
                };
                let target = self.label_ref(label, span)?;
                context
                    .append(target)
                    .map_err(|error| select_diagnostic(span, error))?;
                self.resolve(span, mnemonic, context)?;
            }
        }
        Ok(())
    }

    fn assign(
        &mut self,
        span: Span,
        target: &Spanned<Operand>,
        value: &Value,
    ) -> Result<(), Diagnostic> {
        match value {
            Value::Operand(source) => {
                match (target.node.keys.is_empty(), source.node.keys.is_empty()) {
                    (false, true) => {
                        let container = self.atom(&target.node.base, target.span)?;
                        let key = self.key(&target.node.keys)?;
                        let value = self.atom(&source.node.base, source.span)?;
                        self.selector
                            .indexed_store(container, key, value)
                            .map_err(|error| select_diagnostic(span, error))?;
                    }
                    (true, false) => {
                        let dest = self.atom(&target.node.base, target.span)?;
                        let container = self.atom(&source.node.base, source.span)?;
                        let key = self.key(&source.node.keys)?;
                        self.selector
                            .indexed_fetch(dest, container, key)
                            .map_err(|error| select_diagnostic(span, error))?;
                    }
                    _ => self.operation(span, "set", &[target, source])?,
                }
            }
            Value::Binary { op, lhs, rhs } => {
                self.operation(span, op.mnemonic(), &[target, lhs, rhs])?
            }
            Value::Unary { op, operand } => {
                self.operation(span, op.mnemonic(), &[target, operand])?
            }
            Value::Addr(label) => {
                let mut context = self.selector.context();
                self.append(&mut context, target)?;
                let address = self.label_ref(label, span)?;
                context
                    .append(address)
                    .map_err(|error| select_diagnostic(span, error))?;
                self.resolve(span, "set_addr", context)?;
            }
            Value::Defined(operand) => self.operation(span, "defined", &[target, operand])?,
            Value::Clone(operand) => self.operation(span, "clone", &[target, operand])?,
            Value::New(ty) => {
                let type_id = match &ty.node {
                    Atom::TypeMacro(name) | Atom::Ident(name) => self
                        .selector
                        .aggregate_type(name)
                        .map_err(|error| select_diagnostic(ty.span, error))?,
                    _ => return Err(Diagnostic::error(ty.span, "expected an aggregate type")),
                };
                let mut context = self.selector.context();
                self.append(&mut context, target)?;
                context
                    .append(type_id)
                    .map_err(|error| select_diagnostic(span, error))?;
                self.resolve(span, "new", context)?;
            }
        }
        Ok(())
    }

    fn jump(&mut self, span: Span, mnemonic: &str, label: &str) -> Result<(), Diagnostic> {
        let target = self.label_ref(label, span)?;
        let mut context = self.selector.context();
        context
            .append(target)
            .map_err(|error| select_diagnostic(span, error))?;
        self.resolve(span, mnemonic, context)
    }

    /// `mnemonic operand, operand, ...`
    fn operation(
        &mut self,
        span: Span,
        mnemonic: &str,
        operands: &[&Spanned<Operand>],
    ) -> Result<(), Diagnostic> {
        let mut context = self.selector.context();
        for operand in operands {
            self.append(&mut context, operand)?;
        }
        self.resolve(span, mnemonic, context)
    }

    fn resolve(
        &mut self,
        span: Span,
        mnemonic: &str,
        context: BuildContext,
    ) -> Result<(), Diagnostic> {
        self.selector
            .resolve(mnemonic, context)
            .map(|_| ())
            .map_err(|error| select_diagnostic(span, error))
    }

    fn append(
        &mut self,
        context: &mut BuildContext,
        operand: &Spanned<Operand>,
    ) -> Result<(), Diagnostic> {
        let base = self.atom(&operand.node.base, operand.span)?;
        let appended = if operand.node.keys.is_empty() {
            context.append(base)
        } else {
            let key = self.key(&operand.node.keys)?;
            context.append_keyed(base, key)
        };
        appended.map_err(|error| select_diagnostic(operand.span, error))
    }

    /// Collapses `[a][b]` into the single composite key `a;b`.
    fn key(&mut self, keys: &[Spanned<Atom>]) -> Result<SymbolId, Diagnostic> {
        let mut parts = keys.iter();
        let Some(first) = parts.next() else {
            unreachable!("key() called without keys");
        };
        let mut chain = KeyChain::new(self.atom(&first.node, first.span)?);
        for part in parts {
            chain.push(self.atom(&part.node, part.span)?);
        }
        Ok(chain.collapse(self.selector.symbols_mut()))
    }

    fn atom(&mut self, atom: &Atom, span: Span) -> Result<SymbolId, Diagnostic> {
        let symbols = self.selector.symbols_mut();
        let id = match atom {
            Atom::Int(value) => symbols.constant(&value.to_string(), ValueClass::Integer),
            Atom::Float(text) => symbols.constant(text, ValueClass::Float),
            Atom::Str(text) => symbols.constant(text, ValueClass::String),
            Atom::Register(name) => {
                let class = name
                    .chars()
                    .nth(1)
                    .and_then(ValueClass::from_register_prefix)
                    .ok_or_else(|| Diagnostic::error(span, format!("bad register '{name}'")))?;
                symbols
                    .variable(name, class)
                    .map_err(|error| select_diagnostic(span, error.into()))?
            }
            Atom::TypeMacro(name) => self
                .selector
                .aggregate_type(name)
                .map_err(|error| select_diagnostic(span, error))?,
            Atom::Ident(name) => self.ident(name, span)?,
        };
        Ok(id)
    }

    /// A declared name, a physical register such as `I3`, or else a label.
    fn ident(&mut self, name: &str, span: Span) -> Result<SymbolId, Diagnostic> {
        let symbols = self.selector.symbols_mut();
        if let Some(id) = symbols.lookup(name)
            && symbols.get(id).kind != OperandKind::AddressSymbol
        {
            return Ok(id);
        }
        if let Some((class, index)) = physical_register(name) {
            return symbols
                .physical(class, index)
                .map_err(|error| select_diagnostic(span, error.into()));
        }
        self.label_ref(name, span)
    }

    fn label_ref(&mut self, name: &str, span: Span) -> Result<SymbolId, Diagnostic> {
        let id = self
            .selector
            .symbols_mut()
            .address(name)
            .map_err(|error| select_diagnostic(span, error.into()))?;
        self.label_refs.entry(id).or_insert(span);
        Ok(id)
    }

    fn finish(self) -> Result<LowerOutput, Vec<Diagnostic>> {
        let mut warnings = Vec::new();
        if let Some((name, span)) = &self.open_sub {
            warnings.push(
                Diagnostic::warning(*span, format!("'.sub {name}' is never closed"))
                    .with_help("add '.end' after its last instruction"),
            );
        }

        let symbols = self.selector.symbols();
        let undefined = symbols
            .undefined_labels()
            .filter_map(|name| {
                let id = symbols.lookup(name)?;
                let span = self.label_refs.get(&id).copied()?;
                let message = format!("label '{name}' is never defined");
                let help = format!("define it with '{name}:' or declare it with '.local'");
                Some(Diagnostic::error(span, message).with_help(help))
            })
            .collect::<Vec<_>>();
        if !undefined.is_empty() {
            return Err(undefined);
        }

        Ok(LowerOutput {
            unit: self.selector.finish(),
            warnings,
        })
    }
}

/// `I3`, `N0`, `S12`, `P31`: a machine register named without the `$` sigil.
fn physical_register(name: &str) -> Option<(ValueClass, u8)> {
    let mut chars = name.chars();
    let class = ValueClass::from_register_prefix(chars.next()?)?;
    let digits = chars.as_str();
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    Some((class, digits.parse().ok()?))
}

fn select_diagnostic(span: Span, error: SelectError) -> Diagnostic {
    let diagnostic = Diagnostic::error(span, error.to_string());
    match &error {
        SelectError::UnresolvedOpcode { mnemonic, .. } => diagnostic.with_help(format!(
            "`imcc ops {mnemonic}` lists the operand forms the catalog accepts"
        )),
        SelectError::UnsupportedIndexedAssignment { .. } => diagnostic.with_help(
            "index a pmc, or store a string into a string indexed by an integer",
        ),
        SelectError::IllegalKeyedOperand { .. } => {
            diagnostic.with_help("declare the container with '.local pmc'")
        }
        SelectError::ArityExceeded { .. } => {
            diagnostic.with_note("a key counts as an operand of its own")
        }
        SelectError::UnknownAggregateType { .. } => {
            diagnostic.with_help("`imcc ops --types` lists the known aggregate types")
        }
        SelectError::Symbol(SymbolError::ClassConflict { .. }) => {
            diagnostic.with_help("each name keeps the type it was first used with")
        }
        SelectError::Symbol(_) => diagnostic,
    }
}
