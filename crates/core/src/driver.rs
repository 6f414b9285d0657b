use imcc_ops::{CoreOps, OpcodeCatalog};
use thiserror::Error;
use tracing::info;

use crate::config::SelectorConfig;
use crate::diag::{Diagnostic, render_diagnostics_with_color};
use crate::lower::lower;
use crate::parser::parse;
use crate::select::Selector;
use crate::span::SourceMap;
use crate::unit::Unit;

#[derive(Debug)]
pub struct CompileOutput {
    pub unit: Unit,
    pub listing: String,
    pub warnings: Vec<Diagnostic>,
    /// `warnings` rendered against the source, empty when there are none.
    pub rendered_warnings: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CompileRenderOptions {
    pub color: bool,
}

#[derive(Debug, Error)]
#[error("compilation failed")]
pub struct CompileError {
    pub diagnostics: Vec<Diagnostic>,
    pub rendered: String,
}

/// Compiles against the built-in catalog with the default selector settings.
pub fn compile_source(source_name: &str, source_text: &str) -> Result<CompileOutput, CompileError> {
    compile_source_with(
        source_name,
        source_text,
        &CoreOps::new(),
        &SelectorConfig::default(),
        CompileRenderOptions::default(),
    )
}

pub fn compile_source_with<C: OpcodeCatalog + ?Sized>(
    source_name: &str,
    source_text: &str,
    catalog: &C,
    config: &SelectorConfig,
    options: CompileRenderOptions,
) -> Result<CompileOutput, CompileError> {
    let selector = Selector::new(catalog, config.clone()).map_err(|error| CompileError {
        diagnostics: Vec::new(),
        rendered: error.to_string(),
    })?;

    let mut source_map = SourceMap::default();
    let source_id = source_map.add_source(source_name, source_text);

    let ast = parse(source_id, source_text)
        .map_err(|diagnostics| fail_with_rendered(&source_map, diagnostics, options))?;

    let lowered = lower(&ast, selector)
        .map_err(|diagnostics| fail_with_rendered(&source_map, diagnostics, options))?;

    info!(
        source = source_name,
        instructions = lowered.unit.len(),
        symbols = lowered.unit.symbols().len(),
        "selected unit"
    );

    let rendered_warnings = if lowered.warnings.is_empty() {
        String::new()
    } else {
        render_diagnostics_with_color(&source_map, &lowered.warnings, options.color)
    };
    Ok(CompileOutput {
        listing: lowered.unit.listing(),
        unit: lowered.unit,
        warnings: lowered.warnings,
        rendered_warnings,
    })
}

fn fail_with_rendered(
    source_map: &SourceMap,
    diagnostics: Vec<Diagnostic>,
    options: CompileRenderOptions,
) -> CompileError {
    let rendered = render_diagnostics_with_color(source_map, &diagnostics, options.color);
    CompileError {
        diagnostics,
        rendered,
    }
}
