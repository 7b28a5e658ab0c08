//! The driver.
//!
//! Iterates the work queue of compiling members until the database
//! reports none remain: constructors first, then static constructors,
//! interface implementations and the entry point, then methods in a
//! drain/close-macros/re-drain loop, since closing macros may enqueue
//! further members. Errors accumulate in the database and never abort
//! the run.

use std::panic::{catch_unwind, AssertUnwindSafe};

use quill_ast::{Expr, FuncArgOptimization, Id, Literal, Statement, Transformer, TypeDef};
use quill_metadata::{
    panic_message, Compilation, CompilingKind, CompilingMember, GeneratorRequest, GeneratorResult,
    GeneratorSpec, Member, Node, Optimizations, TranslationError,
};
use rustc_hash::FxHashMap;

use crate::optimize::{self, BodyKind};
use crate::translate::Translator;

/// Settings of a driver run.
#[derive(Debug, Clone)]
pub struct CompilerOptions {
    /// Check compiled bodies for forms the writer cannot emit
    pub verify_output: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            verify_output: cfg!(debug_assertions),
        }
    }
}

/// Translate every compiling member of the database.
pub fn compile(comp: &mut Compilation, options: &CompilerOptions) {
    for cm in comp.take_compiling_constructors() {
        translate_compiling_member(comp, options, cm, Vec::new());
    }
    for cm in comp.take_compiling_static_constructors() {
        translate_compiling_member(comp, options, cm, Vec::new());
    }
    for cm in comp.take_compiling_implementations() {
        translate_compiling_member(comp, options, cm, Vec::new());
    }
    if let Some(ep) = comp.take_entry_point() {
        translate_entry_point(comp, options, ep);
    }
    loop {
        while let Some(cm) = comp.take_next_compiling_method() {
            translate_compiling_member(comp, options, cm, Vec::new());
        }
        comp.close_macros();
        if !comp.has_compiling_methods() {
            break;
        }
    }
}

/// Translate one member and store the result. `in_progress` carries the
/// members whose translation is currently on the stack, for inline-cycle
/// detection; the member's own node is pushed here.
pub(crate) fn translate_compiling_member(
    comp: &mut Compilation,
    options: &CompilerOptions,
    cm: CompilingMember,
    mut in_progress: Vec<Node>,
) {
    let node = cm.node();
    in_progress.push(node.clone());
    let full_name = cm.full_name();
    let CompilingMember {
        ty,
        kind,
        member,
        opts,
        body,
        generator,
    } = cm;
    let body = match &generator {
        Some(spec) => generate_body(comp, spec, &ty, &full_name),
        None => body,
    };
    let is_inline = member.is_inline();
    let shaped = shaped_param_map(&opts, &body);
    let self_address = comp.class_address(&ty);
    comp.begin_translating(node.clone(), member.clone(), opts.clone());
    let mut tr = Translator::new(comp, options, node.clone())
        .with_inline(is_inline)
        .with_self_address(self_address)
        .with_shaped_params(shaped)
        .with_in_progress(in_progress);
    let translated = tr.transform_expr(body);
    let delayed = tr.has_delayed_transform();
    comp.end_translating(&node);
    if comp.is_failed(&node) {
        // an inline cycle surfaced during translation; the body is dropped
        return;
    }
    let body_kind = if is_inline {
        BodyKind::Inline
    } else {
        match &kind {
            CompilingKind::Constructor(_) | CompilingKind::StaticConstructor(_) => {
                BodyKind::Constructor
            }
            _ => BodyKind::Method,
        }
    };
    let optimized = optimize::optimize_body(translated, body_kind);
    if options.verify_output && !delayed {
        for form in optimize::invalid_forms(&optimized, is_inline) {
            comp.add_error(
                None,
                TranslationError::SourceError(format!(
                    "Invalid form after translation of {}: {}",
                    full_name, form
                )),
            );
        }
    }
    // a delayed inline must be re-translated at every resolved call site
    let member = if delayed && is_inline {
        Member::NotCompiledInline
    } else {
        member
    };
    match kind {
        CompilingKind::Method(m) => comp.add_compiled_method(ty, m, member, opts, optimized),
        CompilingKind::Constructor(c) => {
            comp.add_compiled_constructor(ty, c, member, opts, optimized)
        }
        CompilingKind::StaticConstructor(addr) => {
            comp.add_compiled_static_constructor(ty, addr, optimized)
        }
        CompilingKind::Implementation(i, m) => {
            comp.add_compiled_implementation(ty, i, m, member, opts, optimized)
        }
    }
}

fn translate_entry_point(comp: &mut Compilation, options: &CompilerOptions, stmt: Statement) {
    let mut tr = Translator::new(comp, options, Node::EntryPoint);
    let translated = tr.transform_statement(stmt);
    let optimized = optimize::optimize_statement(translated);
    comp.set_compiled_entry_point(optimized);
}

/// Ask the member's generator for its body.
fn generate_body(
    comp: &mut Compilation,
    spec: &GeneratorSpec,
    ty: &TypeDef,
    name: &str,
) -> Expr {
    let result = match comp.generator_instance(&spec.generator) {
        Some(instance) => {
            let request = GeneratorRequest {
                ty,
                name,
                parameter: spec.parameter.as_deref(),
            };
            match catch_unwind(AssertUnwindSafe(|| instance.generate(request))) {
                Ok(r) => r,
                Err(payload) => GeneratorResult::Error(panic_message(payload)),
            }
        }
        None => GeneratorResult::Error("Generator instance not found".into()),
    };
    match result {
        GeneratorResult::Expr(e) => e,
        GeneratorResult::Source(source) => Expr::Verbatim(source),
        GeneratorResult::Text(text) => Expr::Value(Literal::String(text)),
        GeneratorResult::Error(message) => {
            comp.add_error(
                None,
                TranslationError::GeneratorError {
                    name: spec.generator.to_string(),
                    message,
                },
            );
            Expr::error_placeholder()
        }
    }
}

/// Map the member's own parameters to their declared shapes.
fn shaped_param_map(
    opts: &Optimizations,
    body: &Expr,
) -> FxHashMap<Id, FuncArgOptimization> {
    let mut map = FxHashMap::default();
    if let (Some(shapes), Expr::Function { params, .. }) = (&opts.func_args, body.strip_span()) {
        for (p, s) in params.iter().zip(shapes) {
            if !matches!(s, FuncArgOptimization::NotOptimized) {
                map.insert(p.clone(), *s);
            }
        }
    }
    map
}
