//! Union, record, erased-union and delegate lowering.

mod common;

use common::*;
use quill_ast::{
    known, BinaryOperator, Expr, Id, Literal, Purity, Type, UnaryOperator,
};
use quill_metadata::{
    Compilation, CustomTypeInfo, ErasedUnionCase, RecordFieldInfo, UnionCaseInfo, UnionCaseKind,
    UnionInfo,
};

/// `U = A of int | B`
fn two_case_union(comp: &mut Compilation) -> quill_ast::TypeDef {
    let u = ty("U");
    comp.add_custom_type(
        u.clone(),
        CustomTypeInfo::Union(UnionInfo {
            cases: vec![
                UnionCaseInfo {
                    name: "A".into(),
                    kind: UnionCaseKind::Normal(vec!["Item".into()]),
                },
                UnionCaseInfo {
                    name: "B".into(),
                    kind: UnionCaseKind::Singleton,
                },
            ],
        }),
    );
    class_at(comp, &u, &["U"]);
    u
}

#[test]
fn test_union_case_construction() {
    let mut comp = Compilation::new();
    let u = two_case_union(&mut comp);
    let out = translate(
        &mut comp,
        Expr::NewUnionCase {
            ty: plain(u.clone()),
            case: "A".into(),
            args: vec![Expr::int(7)],
        },
    );
    let Expr::CopyCtor { ty: case_ty, object } = out else {
        panic!("expected copy-ctor, got {:?}", out);
    };
    assert_eq!(case_ty.name, "U+A");
    assert_eq!(
        *object,
        Expr::Object(vec![
            ("$".into(), Expr::int(0)),
            ("$0".into(), Expr::int(7)),
        ])
    );
}

#[test]
fn test_union_tag_and_field_access() {
    let mut comp = Compilation::new();
    let u = two_case_union(&mut comp);
    let v = Id::named("v");

    let tag = translate(
        &mut comp,
        Expr::UnionCaseTag {
            expr: Box::new(Expr::Var(v.clone())),
            ty: plain(u.clone()),
        },
    );
    assert_eq!(tag, Expr::item(Expr::Var(v.clone()), "$", Purity::Pure));

    let get = translate(
        &mut comp,
        Expr::UnionCaseGet {
            expr: Box::new(Expr::Var(v.clone())),
            ty: plain(u.clone()),
            case: "A".into(),
            field: "Item".into(),
        },
    );
    assert_eq!(get, Expr::item(Expr::Var(v.clone()), "$0", Purity::Pure));

    let test = translate(
        &mut comp,
        Expr::UnionCaseTest {
            expr: Box::new(Expr::Var(v.clone())),
            ty: plain(u),
            case: "A".into(),
        },
    );
    assert_eq!(
        test,
        Expr::binary(
            Expr::item(Expr::Var(v), "$", Purity::Pure),
            BinaryOperator::Eq,
            Expr::int(0)
        )
    );
}

#[test]
fn test_singleton_case_uses_shared_instance() {
    let mut comp = Compilation::new();
    let u = two_case_union(&mut comp);
    let out = translate(
        &mut comp,
        Expr::NewUnionCase {
            ty: plain(u),
            case: "B".into(),
            args: vec![],
        },
    );
    assert_eq!(out, Expr::item(Expr::global(["U"]), "B", Purity::Pure));
}

#[test]
fn test_null_pair_union_flattens() {
    let mut comp = Compilation::new();
    let o = ty("Opt");
    comp.add_custom_type(
        o.clone(),
        CustomTypeInfo::Union(UnionInfo {
            cases: vec![
                UnionCaseInfo {
                    name: "None".into(),
                    kind: UnionCaseKind::Constant(Literal::Null),
                },
                UnionCaseInfo {
                    name: "Some".into(),
                    kind: UnionCaseKind::Normal(vec!["Value".into()]),
                },
            ],
        }),
    );

    let none = translate(
        &mut comp,
        Expr::NewUnionCase {
            ty: plain(o.clone()),
            case: "None".into(),
            args: vec![],
        },
    );
    assert_eq!(none, Expr::Value(Literal::Null));

    let some = translate(
        &mut comp,
        Expr::NewUnionCase {
            ty: plain(o.clone()),
            case: "Some".into(),
            args: vec![Expr::int(1)],
        },
    );
    // no tag field on a null-pair union; the prototype wiring is kept
    // for the writer
    let Expr::CopyCtor { object, .. } = some else {
        panic!("expected copy-ctor, got {:?}", some);
    };
    assert_eq!(*object, Expr::Object(vec![("$0".into(), Expr::int(1))]));

    let v = Id::named("v");
    let test = translate(
        &mut comp,
        Expr::UnionCaseTest {
            expr: Box::new(Expr::Var(v.clone())),
            ty: plain(o),
            case: "Some".into(),
        },
    );
    assert_eq!(
        test,
        Expr::binary(
            Expr::Var(v),
            BinaryOperator::StrictNotEq,
            Expr::Value(Literal::Null)
        )
    );
}

#[test]
fn test_erased_union_tag_by_type_inspection() {
    let mut comp = Compilation::new();
    let c = ty("StringOrNumber");
    comp.add_custom_type(
        c.clone(),
        CustomTypeInfo::ErasedUnion(vec![
            ErasedUnionCase {
                name: "Choice1".into(),
                ty: Type::concrete(known::string()),
            },
            ErasedUnionCase {
                name: "Choice2".into(),
                ty: Type::concrete(TypeDefExt::double()),
            },
        ]),
    );
    let v = Id::named("v");
    let out = translate(
        &mut comp,
        Expr::UnionCaseTag {
            expr: Box::new(Expr::Var(v.clone())),
            ty: plain(c),
        },
    );
    assert_eq!(
        out,
        Expr::conditional(
            Expr::binary(
                Expr::unary(UnaryOperator::TypeOf, Expr::Var(v)),
                BinaryOperator::Eq,
                Expr::str("string")
            ),
            Expr::int(0),
            Expr::int(1),
        )
    );
}

#[test]
fn test_erased_union_case_test_is_a_type_test() {
    let mut comp = Compilation::new();
    let c = ty("StringOrNumber");
    comp.add_custom_type(
        c.clone(),
        CustomTypeInfo::ErasedUnion(vec![
            ErasedUnionCase {
                name: "Choice1".into(),
                ty: Type::concrete(known::string()),
            },
            ErasedUnionCase {
                name: "Choice2".into(),
                ty: Type::concrete(TypeDefExt::double()),
            },
        ]),
    );
    let v = Id::named("v");
    let out = translate(
        &mut comp,
        Expr::UnionCaseTest {
            expr: Box::new(Expr::Var(v.clone())),
            ty: plain(c),
            case: "Choice2".into(),
        },
    );
    assert_eq!(
        out,
        Expr::binary(
            Expr::unary(UnaryOperator::TypeOf, Expr::Var(v)),
            BinaryOperator::Eq,
            Expr::str("number")
        )
    );
}

#[test]
fn test_optional_tag_tests_undefined() {
    let mut comp = Compilation::new();
    let opt = known::optional();
    comp.add_custom_type(
        opt.clone(),
        CustomTypeInfo::ErasedUnion(vec![
            ErasedUnionCase {
                name: "None".into(),
                ty: Type::Void,
            },
            ErasedUnionCase {
                name: "Some".into(),
                ty: Type::Param(0),
            },
        ]),
    );
    let v = Id::named("v");
    let out = translate(
        &mut comp,
        Expr::UnionCaseTag {
            expr: Box::new(Expr::Var(v.clone())),
            ty: plain(opt),
        },
    );
    assert_eq!(
        out,
        Expr::conditional(
            Expr::binary(Expr::Var(v), BinaryOperator::StrictEq, Expr::Undefined),
            Expr::int(0),
            Expr::int(1),
        )
    );
}

#[test]
fn test_record_construction_elides_empty_optionals() {
    let mut comp = Compilation::new();
    let r = ty("R");
    comp.add_custom_type(
        r.clone(),
        CustomTypeInfo::Record(vec![
            RecordFieldInfo::new("A", "A"),
            RecordFieldInfo {
                optional: true,
                ..RecordFieldInfo::new("B", "B")
            },
        ]),
    );
    let out = translate(
        &mut comp,
        Expr::NewRecord {
            ty: plain(r),
            args: vec![Expr::int(1), Expr::Undefined],
        },
    );
    let Expr::Application { target, args, .. } = out else {
        panic!("expected runtime call, got {:?}", out);
    };
    assert_eq!(*target, Expr::global(["Runtime", "DeleteEmptyFields"]));
    assert_eq!(args[1], Expr::NewArray(vec![Expr::str("B")]));
    let Expr::Object(fields) = &args[0] else {
        panic!("expected object, got {:?}", args[0]);
    };
    assert_eq!(fields[0], ("A".to_string(), Expr::int(1)));
    // the optional slot keeps undefined as-is and unwraps present values
    assert_eq!(fields[1].0, "B");
    assert!(matches!(fields[1].1, Expr::Conditional { .. }));
}

#[test]
fn test_record_accessors_through_custom_type() {
    let mut comp = Compilation::new();
    let r = ty("R");
    comp.add_custom_type(
        r.clone(),
        CustomTypeInfo::Record(vec![RecordFieldInfo::new("Name", "name")]),
    );
    let v = Id::named("r");
    let out = translate(
        &mut comp,
        Expr::Call {
            this: Some(Box::new(Expr::Var(v.clone()))),
            ty: plain(r),
            method: plain(method("get_Name", 0)),
            args: vec![],
        },
    );
    assert_eq!(out, Expr::item(Expr::Var(v), "name", Purity::Pure));
}

#[test]
fn test_exception_type_check_uses_error_prototype() {
    let mut comp = Compilation::new();
    let v = Id::named("x");
    let out = translate(
        &mut comp,
        Expr::TypeCheck {
            expr: Box::new(Expr::Var(v.clone())),
            ty: Type::concrete(known::exception()),
        },
    );
    assert_eq!(
        out,
        Expr::binary(
            Expr::Var(v),
            BinaryOperator::InstanceOf,
            Expr::global(["Error"])
        )
    );
}

#[test]
fn test_type_parameter_test_outside_inline_is_an_error() {
    let mut comp = Compilation::new();
    let out = translate(
        &mut comp,
        Expr::TypeCheck {
            expr: Box::new(Expr::Undefined),
            ty: Type::Param(0),
        },
    );
    assert_eq!(out, Expr::error_placeholder());
    assert!(comp.has_errors());
}

#[test]
fn test_array_type_test_is_rejected_with_hint() {
    let mut comp = Compilation::new();
    let out = translate(
        &mut comp,
        Expr::TypeCheck {
            expr: Box::new(Expr::Undefined),
            ty: Type::Array(Box::new(Type::Dynamic), 1),
        },
    );
    assert_eq!(out, Expr::error_placeholder());
    assert!(comp.errors().iter().any(|d| match &d.error {
        quill_metadata::TranslationError::SourceError(m) => m.contains("System.Array"),
        _ => false,
    }));
}

#[test]
fn test_disposable_check_tests_member_presence() {
    let mut comp = Compilation::new();
    let v = Id::named("x");
    let out = translate(
        &mut comp,
        Expr::TypeCheck {
            expr: Box::new(Expr::Var(v.clone())),
            ty: Type::concrete(known::disposable()),
        },
    );
    assert_eq!(
        out,
        Expr::binary(Expr::str("Dispose"), BinaryOperator::In, Expr::Var(v))
    );
}

#[test]
fn test_instance_delegate_binds_prototype_method() {
    let mut comp = Compilation::new();
    let a = ty("A");
    class_at(&mut comp, &a, &["A"]);
    let m = method("M", 1);
    instance_method(&mut comp, &a, &m, "m");

    let obj = Id::named("obj");
    let out = translate(
        &mut comp,
        Expr::NewDelegate {
            this: Some(Box::new(Expr::Var(obj.clone()))),
            ty: plain(a),
            method: plain(m),
        },
    );
    let proto = Expr::item(Expr::global(["A"]), "prototype", Purity::Pure);
    assert_eq!(
        out,
        Expr::apply(
            Expr::global(["Runtime", "BindDelegate"]),
            vec![Expr::item(proto, "m", Purity::Pure), Expr::Var(obj)],
        )
    );
}

#[test]
fn test_delegate_combine_and_equality() {
    let mut comp = Compilation::new();
    let d = ty("D");
    comp.add_custom_type(
        d.clone(),
        CustomTypeInfo::Delegate(quill_metadata::DelegateInfo {
            params: vec![Type::Dynamic],
            returns: Type::Void,
        }),
    );
    let a = Id::named("a");
    let b = Id::named("b");
    let out = translate(
        &mut comp,
        Expr::Call {
            this: None,
            ty: plain(d.clone()),
            method: plain(method("op_Addition", 2)),
            args: vec![Expr::Var(a.clone()), Expr::Var(b.clone())],
        },
    );
    assert_eq!(
        out,
        Expr::apply(
            Expr::global(["Runtime", "CombineDelegates"]),
            vec![Expr::NewArray(vec![Expr::Var(a.clone()), Expr::Var(b.clone())])],
        )
    );
    let out = translate(
        &mut comp,
        Expr::Call {
            this: None,
            ty: plain(d),
            method: plain(method("op_Equality", 2)),
            args: vec![Expr::Var(a.clone()), Expr::Var(b.clone())],
        },
    );
    assert_eq!(
        out,
        Expr::Application {
            target: Box::new(Expr::global(["Runtime", "DelegateEqual"])),
            args: vec![Expr::Var(a), Expr::Var(b)],
            purity: Purity::Pure,
        }
    );
}

/// Local helper for a numeric definition.
struct TypeDefExt;

impl TypeDefExt {
    fn double() -> quill_ast::TypeDef {
        quill_ast::TypeDef::new("netstandard", "System.Double")
    }
}
