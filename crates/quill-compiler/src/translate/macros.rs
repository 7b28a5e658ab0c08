//! The macro host.
//!
//! Invokes user-supplied macro instances behind a panic boundary and
//! interprets their result protocol recursively. Fallback results
//! dispatch to the member's fallback compilation kind; unresolved type
//! arguments inside an inline body set the delayed-transform marker and
//! keep the original node for per-call-site resolution.

use std::panic::{catch_unwind, AssertUnwindSafe};

use quill_ast::{Expr, Transformer, Type, TypeDef};
use quill_metadata::{
    panic_message, MacroCall, MacroCtor, MacroResult, Member, Optimizations, TranslationError,
};

use super::call::MacroOriginal;
use super::Translator;

impl Translator<'_> {
    pub(super) fn macro_invoke(
        &mut self,
        macro_type: TypeDef,
        parameter: Option<String>,
        fallback: Option<Member>,
        opts: Optimizations,
        body: Option<Expr>,
        original: MacroOriginal,
    ) -> Expr {
        if !self.comp.use_local_macros() {
            self.warning(format!(
                "The macro {} is not available in this context",
                macro_type
            ));
            return self.macro_fallback(macro_type, fallback, opts, body, original);
        }
        let is_inline = self.current_is_inline;
        let result = match self.comp.macro_instance(&macro_type) {
            Some(instance) => {
                let invocation = match &original {
                    MacroOriginal::Call {
                        this,
                        ty,
                        method,
                        args,
                        ..
                    } => {
                        let call = MacroCall {
                            this: this.as_ref(),
                            ty,
                            method,
                            args,
                            parameter: parameter.as_deref(),
                            is_inline,
                        };
                        catch_unwind(AssertUnwindSafe(|| instance.translate_call(call)))
                    }
                    MacroOriginal::Ctor { ty, ctor, args } => {
                        let ctor = MacroCtor {
                            ty,
                            ctor,
                            args,
                            parameter: parameter.as_deref(),
                            is_inline,
                        };
                        catch_unwind(AssertUnwindSafe(|| instance.translate_ctor(ctor)))
                    }
                };
                match invocation {
                    Ok(r) => r,
                    Err(payload) => MacroResult::Error(panic_message(payload)),
                }
            }
            None => MacroResult::Error("Macro instance not found".into()),
        };
        self.interpret_macro_result(result, macro_type, fallback, opts, body, original)
    }

    fn interpret_macro_result(
        &mut self,
        result: MacroResult,
        macro_type: TypeDef,
        fallback: Option<Member>,
        opts: Optimizations,
        body: Option<Expr>,
        original: MacroOriginal,
    ) -> Expr {
        match result {
            MacroResult::Ok(e) => self.transform_expr(e),
            MacroResult::Warning(message, inner) => {
                self.warning(message);
                self.interpret_macro_result(*inner, macro_type, fallback, opts, body, original)
            }
            MacroResult::Error(message) => self.error(TranslationError::MacroError {
                name: macro_type.to_string(),
                message,
            }),
            MacroResult::Dependencies(nodes, inner) => {
                for n in nodes {
                    self.comp.add_dependency(self.current_node.clone(), n);
                }
                self.interpret_macro_result(*inner, macro_type, fallback, opts, body, original)
            }
            MacroResult::Fallback => {
                self.macro_fallback(macro_type, fallback, opts, body, original)
            }
            MacroResult::NeedsResolvedTypeArg(t) => {
                if self.current_is_inline {
                    self.has_delayed_transform = true;
                    return original.into_expr();
                }
                if matches!(t, Type::Param(_)) {
                    // the entry-point name is kept as-is for the ctor path
                    self.source_error(format!(
                        "Macro {} requires a resolved type argument in TranslateCall. \
                         You can get one by marking the member inline.",
                        macro_type
                    ))
                } else {
                    self.source_error(format!(
                        "Macro {} reported an unresolved type argument in TranslateCall \
                         for a type that is not a type parameter: {}",
                        macro_type, t
                    ))
                }
            }
        }
    }

    fn macro_fallback(
        &mut self,
        macro_type: TypeDef,
        fallback: Option<Member>,
        opts: Optimizations,
        body: Option<Expr>,
        original: MacroOriginal,
    ) -> Expr {
        let Some(member) = fallback else {
            return self.error(TranslationError::MacroError {
                name: macro_type.to_string(),
                message: "No fallback is available for this macro".into(),
            });
        };
        match original {
            MacroOriginal::Call {
                this,
                ty,
                method,
                args,
                base_call,
            } => self.compile_call(member, opts, body, this, ty, method, args, base_call),
            MacroOriginal::Ctor { ty, ctor, args } => {
                self.compile_ctor(member, opts, body, ty, ctor, args)
            }
        }
    }
}

impl MacroOriginal {
    /// Rebuild the untranslated node for later, resolved, re-translation.
    fn into_expr(self) -> Expr {
        match self {
            MacroOriginal::Call {
                this,
                ty,
                method,
                args,
                base_call,
            } => {
                let this = if base_call {
                    Some(Box::new(Expr::Base))
                } else {
                    this.map(Box::new)
                };
                Expr::Call {
                    this,
                    ty,
                    method,
                    args,
                }
            }
            MacroOriginal::Ctor { ty, ctor, args } => Expr::Ctor { ty, ctor, args },
        }
    }
}
