//! The compilation database.
//!
//! `Compilation` is the single shared capability object every translator
//! instance works against: it answers member lookups, owns the work queue
//! of members awaiting translation, receives compiled results and
//! diagnostics, and carries the dependency graph and plug-in registry.

use std::panic::{catch_unwind, AssertUnwindSafe};

use quill_ast::{Address, ConstructorDef, Expr, MethodDef, Span, Statement, Type, TypeDef};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::custom::CustomTypeInfo;
use crate::error::{Diagnostic, TranslationError, Warning};
use crate::graph::{DependencyGraph, Node};
use crate::macros::{panic_message, Generator, Macro};
use crate::member::{Member, Optimizations};

/// A compiled member as stored in the class tables.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledMemberInfo {
    pub member: Member,
    pub opts: Optimizations,
    /// The translated body; `None` for members declared without one
    /// (interface methods, externally provided members)
    pub body: Option<Expr>,
}

/// Everything known about a class.
#[derive(Debug, Clone, Default)]
pub struct ClassInfo {
    /// Global address of the class value, if it has one
    pub address: Option<Address>,
    pub base_class: Option<TypeDef>,
    /// Address of the static-constructor trigger function
    pub static_constructor: Option<Address>,
    pub has_prototype: bool,
    pub methods: FxHashMap<MethodDef, CompiledMemberInfo>,
    pub constructors: FxHashMap<ConstructorDef, CompiledMemberInfo>,
    pub implementations: FxHashMap<(TypeDef, MethodDef), CompiledMemberInfo>,
    pub fields: FxHashMap<String, FieldInfo>,
    pub static_constructor_body: Option<Expr>,
}

/// An interface: abstract methods and their JavaScript names.
#[derive(Debug, Clone, Default)]
pub struct InterfaceInfo {
    pub methods: FxHashMap<MethodDef, String>,
}

/// How a field is stored on its object.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// A plain property of the given name
    Instance(String),
    /// A global at the given address
    Static(Address),
    /// A property holding an optional value
    Optional(String),
    /// A positional slot
    Indexed(usize),
    /// Backed by getter/setter methods
    Property {
        getter: Option<MethodDef>,
        setter: Option<MethodDef>,
    },
}

/// A field's storage kind and mutability.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    pub kind: FieldKind,
    pub readonly: bool,
}

/// Failure modes of a member lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupError {
    TypeNotFound(TypeDef),
    MemberNotFound(TypeDef, String),
    /// The member failed compilation earlier; the error is already
    /// reported, callers substitute the placeholder silently
    Failed,
}

/// Result of a method lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodLookup {
    Compiled {
        member: Member,
        opts: Optimizations,
        body: Option<Expr>,
    },
    /// Still on the work queue; inline members are compiled on demand
    Compiling {
        member: Member,
        opts: Optimizations,
    },
    CustomTypeMember(CustomTypeInfo),
    Error(LookupError),
}

/// Result of a constructor lookup; same shapes as for methods.
pub type ConstructorLookup = MethodLookup;

/// Result of a field lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldLookup {
    Instance { name: String, readonly: bool },
    Static(Address),
    Optional(String),
    Indexed(usize),
    Property {
        getter: Option<MethodDef>,
        setter: Option<MethodDef>,
    },
    /// The type's shape is compiler-synthesized; fields are resolved
    /// against the custom-type descriptor
    CustomTypeField(CustomTypeInfo),
    Error(LookupError),
}

/// Class address or custom-type shape of a definition.
#[derive(Debug, Clone, PartialEq)]
pub enum AddressOrCustomType {
    Address(Address),
    CustomType(CustomTypeInfo),
}

/// Which slot of its type a compiling member occupies.
#[derive(Debug, Clone, PartialEq)]
pub enum CompilingKind {
    Method(MethodDef),
    Constructor(ConstructorDef),
    StaticConstructor(Address),
    Implementation(TypeDef, MethodDef),
}

/// Names a generator plug-in producing a member body on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorSpec {
    pub generator: TypeDef,
    pub parameter: Option<String>,
}

/// A member queued for translation.
#[derive(Debug, Clone)]
pub struct CompilingMember {
    pub ty: TypeDef,
    pub kind: CompilingKind,
    /// The compilation kind the member will be stored under
    pub member: Member,
    pub opts: Optimizations,
    pub body: Expr,
    pub generator: Option<GeneratorSpec>,
}

impl CompilingMember {
    pub fn method(ty: TypeDef, method: MethodDef, member: Member, body: Expr) -> Self {
        Self {
            ty,
            kind: CompilingKind::Method(method),
            member,
            opts: Optimizations::default(),
            body,
            generator: None,
        }
    }

    pub fn constructor(ty: TypeDef, ctor: ConstructorDef, member: Member, body: Expr) -> Self {
        Self {
            ty,
            kind: CompilingKind::Constructor(ctor),
            member,
            opts: Optimizations::default(),
            body,
            generator: None,
        }
    }

    pub fn static_constructor(ty: TypeDef, address: Address, body: Expr) -> Self {
        Self {
            member: Member::Static(address.clone()),
            ty,
            kind: CompilingKind::StaticConstructor(address),
            opts: Optimizations::default(),
            body,
            generator: None,
        }
    }

    pub fn implementation(
        ty: TypeDef,
        interface: TypeDef,
        method: MethodDef,
        member: Member,
        body: Expr,
    ) -> Self {
        Self {
            ty,
            kind: CompilingKind::Implementation(interface, method),
            member,
            opts: Optimizations::default(),
            body,
            generator: None,
        }
    }

    pub fn with_opts(mut self, opts: Optimizations) -> Self {
        self.opts = opts;
        self
    }

    pub fn with_generator(mut self, spec: GeneratorSpec) -> Self {
        self.generator = Some(spec);
        self
    }

    /// The graph-node identity of this member.
    pub fn node(&self) -> Node {
        match &self.kind {
            CompilingKind::Method(m) => Node::Method(self.ty.clone(), m.clone()),
            CompilingKind::Constructor(c) => Node::Constructor(self.ty.clone(), c.clone()),
            CompilingKind::StaticConstructor(_) => Node::Type(self.ty.clone()),
            CompilingKind::Implementation(i, m) => {
                Node::Implementation(self.ty.clone(), i.clone(), m.clone())
            }
        }
    }

    /// Display name used in diagnostics.
    pub fn full_name(&self) -> String {
        match &self.kind {
            CompilingKind::Method(m) => format!("{}.{}", self.ty, m),
            CompilingKind::Constructor(c) => format!("{}{}", self.ty, c),
            CompilingKind::StaticConstructor(_) => format!("{}..cctor", self.ty),
            CompilingKind::Implementation(i, m) => format!("{} for {}.{}", self.ty, i, m),
        }
    }
}

/// The shared compilation database.
pub struct Compilation {
    classes: FxHashMap<TypeDef, ClassInfo>,
    interfaces: FxHashMap<TypeDef, InterfaceInfo>,
    custom_types: FxHashMap<TypeDef, CustomTypeInfo>,
    proxies: FxHashMap<TypeDef, TypeDef>,
    compiling: Vec<CompilingMember>,
    /// Members whose translation is currently on the stack; lookups see
    /// them as still compiling
    translating: FxHashMap<Node, (Member, Optimizations)>,
    failed: FxHashSet<Node>,
    errors: Vec<Diagnostic>,
    warnings: Vec<Warning>,
    graph: Option<DependencyGraph>,
    macros: FxHashMap<TypeDef, Box<dyn Macro>>,
    generators: FxHashMap<TypeDef, Box<dyn Generator>>,
    entry_point: Option<Statement>,
    compiled_entry_point: Option<Statement>,
    use_local_macros: bool,
}

impl Default for Compilation {
    fn default() -> Self {
        Self::new()
    }
}

impl Compilation {
    pub fn new() -> Self {
        Self {
            classes: FxHashMap::default(),
            interfaces: FxHashMap::default(),
            custom_types: FxHashMap::default(),
            proxies: FxHashMap::default(),
            compiling: Vec::new(),
            translating: FxHashMap::default(),
            failed: FxHashSet::default(),
            errors: Vec::new(),
            warnings: Vec::new(),
            graph: Some(DependencyGraph::new()),
            macros: FxHashMap::default(),
            generators: FxHashMap::default(),
            entry_point: None,
            compiled_entry_point: None,
            use_local_macros: true,
        }
    }

    // ------------------------------------------------------------------
    // Population (front-end surface)
    // ------------------------------------------------------------------

    pub fn add_class(&mut self, ty: TypeDef, info: ClassInfo) {
        self.classes.insert(ty, info);
    }

    pub fn add_interface(&mut self, ty: TypeDef, info: InterfaceInfo) {
        self.interfaces.insert(ty, info);
    }

    pub fn add_custom_type(&mut self, ty: TypeDef, info: CustomTypeInfo) {
        self.custom_types.insert(ty, info);
    }

    /// Redirect lookups on `ty` to `proxy`.
    pub fn add_proxy(&mut self, ty: TypeDef, proxy: TypeDef) {
        self.proxies.insert(ty, proxy);
    }

    pub fn add_compiling(&mut self, member: CompilingMember) {
        self.compiling.push(member);
    }

    pub fn set_entry_point(&mut self, stmt: Statement) {
        self.entry_point = Some(stmt);
    }

    /// Disable or enable dependency-edge recording.
    pub fn set_graph_enabled(&mut self, enabled: bool) {
        if enabled && self.graph.is_none() {
            self.graph = Some(DependencyGraph::new());
        } else if !enabled {
            self.graph = None;
        }
    }

    pub fn set_use_local_macros(&mut self, value: bool) {
        self.use_local_macros = value;
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    fn resolve_proxy<'a>(&'a self, ty: &'a TypeDef) -> &'a TypeDef {
        self.proxies.get(ty).unwrap_or(ty)
    }

    /// The proxy a definition is redirected to, if any.
    pub fn find_proxied(&self, ty: &TypeDef) -> Option<TypeDef> {
        self.proxies.get(ty).cloned()
    }

    pub fn has_type(&self, ty: &TypeDef) -> bool {
        let ty = self.resolve_proxy(ty);
        self.classes.contains_key(ty)
            || self.interfaces.contains_key(ty)
            || self.custom_types.contains_key(ty)
    }

    pub fn is_interface(&self, ty: &TypeDef) -> bool {
        self.interfaces.contains_key(self.resolve_proxy(ty))
    }

    pub fn try_lookup_class_info(&self, ty: &TypeDef) -> Option<&ClassInfo> {
        self.classes.get(self.resolve_proxy(ty))
    }

    pub fn class_address(&self, ty: &TypeDef) -> Option<Address> {
        self.try_lookup_class_info(ty)?.address.clone()
    }

    pub fn try_lookup_static_constructor_address(&self, ty: &TypeDef) -> Option<Address> {
        self.try_lookup_class_info(ty)?.static_constructor.clone()
    }

    pub fn get_custom_type(&self, ty: &TypeDef) -> Option<CustomTypeInfo> {
        self.custom_types.get(self.resolve_proxy(ty)).cloned()
    }

    pub fn try_lookup_class_address_or_custom_type(
        &self,
        ty: &TypeDef,
    ) -> Option<AddressOrCustomType> {
        if let Some(addr) = self.class_address(ty) {
            return Some(AddressOrCustomType::Address(addr));
        }
        self.get_custom_type(ty).map(AddressOrCustomType::CustomType)
    }

    /// Every method visible on a definition: compiled, queued and
    /// interface-declared.
    pub fn get_methods(&self, ty: &TypeDef) -> Vec<MethodDef> {
        let ty = self.resolve_proxy(ty);
        let mut out = Vec::new();
        if let Some(cls) = self.classes.get(ty) {
            out.extend(cls.methods.keys().cloned());
        }
        if let Some(ifc) = self.interfaces.get(ty) {
            out.extend(ifc.methods.keys().cloned());
        }
        out.extend(self.compiling.iter().filter_map(|m| {
            if &m.ty == ty {
                match &m.kind {
                    CompilingKind::Method(md) => Some(md.clone()),
                    _ => None,
                }
            } else {
                None
            }
        }));
        out
    }

    pub fn method_exists_in_metadata(&self, ty: &TypeDef, method: &MethodDef) -> bool {
        let ty = self.resolve_proxy(ty);
        if let Some(cls) = self.classes.get(ty) {
            if cls.methods.contains_key(method) {
                return true;
            }
        }
        if let Some(ifc) = self.interfaces.get(ty) {
            if ifc.methods.contains_key(method) {
                return true;
            }
        }
        self.compiling.iter().any(|m| {
            &m.ty == ty && matches!(&m.kind, CompilingKind::Method(md) if md == method)
        })
    }

    pub fn constructor_exists_in_metadata(&self, ty: &TypeDef, ctor: &ConstructorDef) -> bool {
        let ty = self.resolve_proxy(ty);
        if let Some(cls) = self.classes.get(ty) {
            if cls.constructors.contains_key(ctor) {
                return true;
            }
        }
        self.compiling.iter().any(|m| {
            &m.ty == ty && matches!(&m.kind, CompilingKind::Constructor(cd) if cd == ctor)
        })
    }

    /// The synthesized constructor of a record type.
    pub fn try_get_record_constructor(&self, ty: &TypeDef) -> Option<ConstructorDef> {
        match self.get_custom_type(ty)? {
            CustomTypeInfo::Record(fields) => {
                Some(ConstructorDef::new(vec![Type::Dynamic; fields.len()]))
            }
            _ => None,
        }
    }

    pub fn lookup_method(&self, ty: &TypeDef, method: &MethodDef) -> MethodLookup {
        let ty = self.resolve_proxy(ty);
        if let Some(cls) = self.classes.get(ty) {
            if let Some(info) = cls.methods.get(method) {
                return MethodLookup::Compiled {
                    member: info.member.clone(),
                    opts: info.opts.clone(),
                    body: info.body.clone(),
                };
            }
        }
        if let Some(ifc) = self.interfaces.get(ty) {
            if let Some(name) = ifc.methods.get(method) {
                return MethodLookup::Compiled {
                    member: Member::Instance(name.clone()),
                    opts: Optimizations::default(),
                    body: None,
                };
            }
        }
        if let Some(cm) = self.compiling.iter().find(|m| {
            &m.ty == ty && matches!(&m.kind, CompilingKind::Method(md) if md == method)
        }) {
            return MethodLookup::Compiling {
                member: cm.member.clone(),
                opts: cm.opts.clone(),
            };
        }
        if self.failed.contains(&Node::Method(ty.clone(), method.clone())) {
            return MethodLookup::Error(LookupError::Failed);
        }
        if let Some((member, opts)) = self
            .translating
            .get(&Node::Method(ty.clone(), method.clone()))
        {
            return MethodLookup::Compiling {
                member: member.clone(),
                opts: opts.clone(),
            };
        }
        if let Some(ct) = self.custom_types.get(ty) {
            return MethodLookup::CustomTypeMember(ct.clone());
        }
        if self.classes.contains_key(ty) || self.interfaces.contains_key(ty) {
            MethodLookup::Error(LookupError::MemberNotFound(ty.clone(), method.to_string()))
        } else {
            MethodLookup::Error(LookupError::TypeNotFound(ty.clone()))
        }
    }

    pub fn lookup_constructor(&self, ty: &TypeDef, ctor: &ConstructorDef) -> ConstructorLookup {
        let ty = self.resolve_proxy(ty);
        if let Some(cls) = self.classes.get(ty) {
            if let Some(info) = cls.constructors.get(ctor) {
                return MethodLookup::Compiled {
                    member: info.member.clone(),
                    opts: info.opts.clone(),
                    body: info.body.clone(),
                };
            }
        }
        if let Some(cm) = self.compiling.iter().find(|m| {
            &m.ty == ty && matches!(&m.kind, CompilingKind::Constructor(cd) if cd == ctor)
        }) {
            return MethodLookup::Compiling {
                member: cm.member.clone(),
                opts: cm.opts.clone(),
            };
        }
        if self
            .failed
            .contains(&Node::Constructor(ty.clone(), ctor.clone()))
        {
            return MethodLookup::Error(LookupError::Failed);
        }
        if let Some((member, opts)) = self
            .translating
            .get(&Node::Constructor(ty.clone(), ctor.clone()))
        {
            return MethodLookup::Compiling {
                member: member.clone(),
                opts: opts.clone(),
            };
        }
        if let Some(ct) = self.custom_types.get(ty) {
            return MethodLookup::CustomTypeMember(ct.clone());
        }
        if self.classes.contains_key(ty) {
            MethodLookup::Error(LookupError::MemberNotFound(ty.clone(), ctor.to_string()))
        } else {
            MethodLookup::Error(LookupError::TypeNotFound(ty.clone()))
        }
    }

    pub fn lookup_field(&self, ty: &TypeDef, field: &str) -> FieldLookup {
        let ty = self.resolve_proxy(ty);
        if let Some(cls) = self.classes.get(ty) {
            if let Some(info) = cls.fields.get(field) {
                return match &info.kind {
                    FieldKind::Instance(name) => FieldLookup::Instance {
                        name: name.clone(),
                        readonly: info.readonly,
                    },
                    FieldKind::Static(addr) => FieldLookup::Static(addr.clone()),
                    FieldKind::Optional(name) => FieldLookup::Optional(name.clone()),
                    FieldKind::Indexed(i) => FieldLookup::Indexed(*i),
                    FieldKind::Property { getter, setter } => FieldLookup::Property {
                        getter: getter.clone(),
                        setter: setter.clone(),
                    },
                };
            }
        }
        if let Some(ct) = self.custom_types.get(ty) {
            return FieldLookup::CustomTypeField(ct.clone());
        }
        if self.classes.contains_key(ty) {
            FieldLookup::Error(LookupError::MemberNotFound(ty.clone(), field.to_string()))
        } else {
            FieldLookup::Error(LookupError::TypeNotFound(ty.clone()))
        }
    }

    // ------------------------------------------------------------------
    // Work queue
    // ------------------------------------------------------------------

    pub fn take_compiling_constructors(&mut self) -> Vec<CompilingMember> {
        self.take_compiling(|m| matches!(m.kind, CompilingKind::Constructor(_)))
    }

    pub fn take_compiling_static_constructors(&mut self) -> Vec<CompilingMember> {
        self.take_compiling(|m| matches!(m.kind, CompilingKind::StaticConstructor(_)))
    }

    pub fn take_compiling_implementations(&mut self) -> Vec<CompilingMember> {
        self.take_compiling(|m| matches!(m.kind, CompilingKind::Implementation(_, _)))
    }

    fn take_compiling(&mut self, pred: impl Fn(&CompilingMember) -> bool) -> Vec<CompilingMember> {
        let (take, keep) = std::mem::take(&mut self.compiling)
            .into_iter()
            .partition(|m| pred(m));
        self.compiling = keep;
        take
    }

    pub fn has_compiling_methods(&self) -> bool {
        self.compiling
            .iter()
            .any(|m| matches!(m.kind, CompilingKind::Method(_)))
    }

    pub fn take_next_compiling_method(&mut self) -> Option<CompilingMember> {
        let idx = self
            .compiling
            .iter()
            .position(|m| matches!(m.kind, CompilingKind::Method(_)))?;
        Some(self.compiling.remove(idx))
    }

    /// Pull a specific queued method, for on-demand inline compilation.
    pub fn take_compiling_method(
        &mut self,
        ty: &TypeDef,
        method: &MethodDef,
    ) -> Option<CompilingMember> {
        let ty = self.resolve_proxy(ty).clone();
        let idx = self.compiling.iter().position(|m| {
            m.ty == ty && matches!(&m.kind, CompilingKind::Method(md) if md == method)
        })?;
        Some(self.compiling.remove(idx))
    }

    /// Pull a specific queued constructor, for on-demand inline compilation.
    pub fn take_compiling_constructor(
        &mut self,
        ty: &TypeDef,
        ctor: &ConstructorDef,
    ) -> Option<CompilingMember> {
        let ty = self.resolve_proxy(ty).clone();
        let idx = self.compiling.iter().position(|m| {
            m.ty == ty && matches!(&m.kind, CompilingKind::Constructor(cd) if cd == ctor)
        })?;
        Some(self.compiling.remove(idx))
    }

    pub fn take_entry_point(&mut self) -> Option<Statement> {
        self.entry_point.take()
    }

    // ------------------------------------------------------------------
    // Compiled results
    // ------------------------------------------------------------------

    fn class_entry(&mut self, ty: &TypeDef) -> &mut ClassInfo {
        let ty = self.resolve_proxy(ty).clone();
        self.classes.entry(ty).or_default()
    }

    pub fn add_compiled_method(
        &mut self,
        ty: TypeDef,
        method: MethodDef,
        member: Member,
        opts: Optimizations,
        body: Expr,
    ) {
        self.class_entry(&ty).methods.insert(
            method,
            CompiledMemberInfo {
                member,
                opts,
                body: Some(body),
            },
        );
    }

    pub fn add_compiled_constructor(
        &mut self,
        ty: TypeDef,
        ctor: ConstructorDef,
        member: Member,
        opts: Optimizations,
        body: Expr,
    ) {
        self.class_entry(&ty).constructors.insert(
            ctor,
            CompiledMemberInfo {
                member,
                opts,
                body: Some(body),
            },
        );
    }

    pub fn add_compiled_implementation(
        &mut self,
        ty: TypeDef,
        interface: TypeDef,
        method: MethodDef,
        member: Member,
        opts: Optimizations,
        body: Expr,
    ) {
        self.class_entry(&ty).implementations.insert(
            (interface, method),
            CompiledMemberInfo {
                member,
                opts,
                body: Some(body),
            },
        );
    }

    pub fn add_compiled_static_constructor(&mut self, ty: TypeDef, address: Address, body: Expr) {
        let cls = self.class_entry(&ty);
        cls.static_constructor = Some(address);
        cls.static_constructor_body = Some(body);
    }

    pub fn set_compiled_entry_point(&mut self, stmt: Statement) {
        self.compiled_entry_point = Some(stmt);
    }

    pub fn compiled_entry_point(&self) -> Option<&Statement> {
        self.compiled_entry_point.as_ref()
    }

    /// Mark a member's translation as in progress on the stack.
    pub fn begin_translating(&mut self, node: Node, member: Member, opts: Optimizations) {
        self.translating.insert(node, (member, opts));
    }

    pub fn end_translating(&mut self, node: &Node) {
        self.translating.remove(node);
    }

    pub fn failed_compiled_method(&mut self, ty: TypeDef, method: MethodDef) {
        self.failed.insert(Node::Method(ty, method));
    }

    pub fn failed_compiled_constructor(&mut self, ty: TypeDef, ctor: ConstructorDef) {
        self.failed.insert(Node::Constructor(ty, ctor));
    }

    pub fn mark_failed(&mut self, node: Node) {
        self.failed.insert(node);
    }

    pub fn is_failed(&self, node: &Node) -> bool {
        self.failed.contains(node)
    }

    // ------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------

    pub fn add_error(&mut self, span: Option<Span>, error: TranslationError) {
        self.errors.push(Diagnostic { span, error });
    }

    pub fn add_warning(&mut self, span: Option<Span>, message: impl Into<String>) {
        self.warnings.push(Warning {
            span,
            message: message.into(),
        });
    }

    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    // ------------------------------------------------------------------
    // Dependency graph
    // ------------------------------------------------------------------

    pub fn has_graph(&self) -> bool {
        self.graph.is_some()
    }

    pub fn add_dependency(&mut self, from: Node, to: Node) {
        if let Some(g) = &mut self.graph {
            g.add_edge(from, to);
        }
    }

    pub fn graph(&self) -> Option<&DependencyGraph> {
        self.graph.as_ref()
    }

    // ------------------------------------------------------------------
    // Plug-ins
    // ------------------------------------------------------------------

    pub fn register_macro(&mut self, ty: TypeDef, instance: Box<dyn Macro>) {
        self.macros.insert(ty, instance);
    }

    pub fn register_generator(&mut self, ty: TypeDef, instance: Box<dyn Generator>) {
        self.generators.insert(ty, instance);
    }

    pub fn use_local_macros(&self) -> bool {
        self.use_local_macros
    }

    pub fn macro_instance(&mut self, ty: &TypeDef) -> Option<&mut (dyn Macro + 'static)> {
        self.macros.get_mut(ty).map(|b| b.as_mut())
    }

    pub fn generator_instance(&mut self, ty: &TypeDef) -> Option<&mut (dyn Generator + 'static)> {
        self.generators.get_mut(ty).map(|b| b.as_mut())
    }

    /// Give every macro a chance to enqueue additional members.
    pub fn close_macros(&mut self) {
        let names: Vec<TypeDef> = self.macros.keys().cloned().collect();
        let mut queued = Vec::new();
        for name in names {
            let m = self.macros.get_mut(&name).expect("macro disappeared");
            match catch_unwind(AssertUnwindSafe(|| m.close())) {
                Ok(members) => queued.extend(members),
                Err(payload) => {
                    let message = panic_message(payload);
                    self.add_error(
                        None,
                        TranslationError::MacroError {
                            name: name.to_string(),
                            message,
                        },
                    );
                }
            }
        }
        self.compiling.extend(queued);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_ast::known;

    fn ty(name: &str) -> TypeDef {
        TypeDef::new("test", name)
    }

    fn method(name: &str) -> MethodDef {
        MethodDef::new(name, vec![], Type::Void)
    }

    #[test]
    fn test_lookup_precedence_compiled_over_compiling() {
        let mut comp = Compilation::new();
        let t = ty("T");
        let m = method("f");
        comp.add_compiling(CompilingMember::method(
            t.clone(),
            m.clone(),
            Member::Inline,
            Expr::Hole(0),
        ));
        assert!(matches!(
            comp.lookup_method(&t, &m),
            MethodLookup::Compiling { .. }
        ));
        comp.add_compiled_method(
            t.clone(),
            m.clone(),
            Member::Static(Address::global(["T", "f"])),
            Optimizations::default(),
            Expr::Undefined,
        );
        assert!(matches!(
            comp.lookup_method(&t, &m),
            MethodLookup::Compiled { .. }
        ));
    }

    #[test]
    fn test_lookup_unknown_type_and_member() {
        let mut comp = Compilation::new();
        let t = ty("T");
        assert!(matches!(
            comp.lookup_method(&t, &method("f")),
            MethodLookup::Error(LookupError::TypeNotFound(_))
        ));
        comp.add_class(t.clone(), ClassInfo::default());
        assert!(matches!(
            comp.lookup_method(&t, &method("f")),
            MethodLookup::Error(LookupError::MemberNotFound(_, _))
        ));
    }

    #[test]
    fn test_failed_member_lookup() {
        let mut comp = Compilation::new();
        let t = ty("T");
        let m = method("f");
        comp.failed_compiled_method(t.clone(), m.clone());
        assert!(matches!(
            comp.lookup_method(&t, &m),
            MethodLookup::Error(LookupError::Failed)
        ));
    }

    #[test]
    fn test_proxy_redirects_lookup() {
        let mut comp = Compilation::new();
        let orig = known::string();
        let proxy = ty("StringProxy");
        comp.add_proxy(orig.clone(), proxy.clone());
        let m = method("get_Length");
        comp.add_compiled_method(
            proxy.clone(),
            m.clone(),
            Member::Instance("length".into()),
            Optimizations::default(),
            Expr::Undefined,
        );
        assert!(matches!(
            comp.lookup_method(&orig, &m),
            MethodLookup::Compiled { .. }
        ));
    }

    #[test]
    fn test_queue_drains_by_kind() {
        let mut comp = Compilation::new();
        let t = ty("T");
        comp.add_compiling(CompilingMember::method(
            t.clone(),
            method("f"),
            Member::Static(Address::global(["T", "f"])),
            Expr::Undefined,
        ));
        comp.add_compiling(CompilingMember::constructor(
            t.clone(),
            ConstructorDef::new(vec![]),
            Member::Constructor(Address::global(["T"])),
            Expr::Undefined,
        ));
        let ctors = comp.take_compiling_constructors();
        assert_eq!(ctors.len(), 1);
        assert!(comp.has_compiling_methods());
        assert!(comp.take_next_compiling_method().is_some());
        assert!(!comp.has_compiling_methods());
    }

    #[test]
    fn test_interface_method_lookup() {
        let mut comp = Compilation::new();
        let i = ty("IThing");
        let m = method("Do");
        let mut info = InterfaceInfo::default();
        info.methods.insert(m.clone(), "do".into());
        comp.add_interface(i.clone(), info);
        match comp.lookup_method(&i, &m) {
            MethodLookup::Compiled { member, .. } => {
                assert_eq!(member, Member::Instance("do".into()))
            }
            other => panic!("unexpected lookup: {:?}", other),
        }
        assert!(comp.is_interface(&i));
    }
}
