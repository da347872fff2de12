#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use crate::definition::parse_label;
use crate::error::SourceLocation;
use crate::types::{NoTypes, TypeRegistry};
use pretty_assertions::assert_eq;

const TYPES: &str = r#"
types:
  Server:
    methods:
      GetUser: { params: ["&Context", "i64"], results: ["User", "Error"] }
      CreateUser: { params: ["&Context", "CreateUserForm"], results: ["User", "Error"] }
      Search: { params: ["&Request"], results: ["Vec<User>", "bool"] }
      ShowSlug: { params: ["Slug"], results: ["Page"] }
      ShowOwner: { params: ["User"], results: ["Page"] }
      Count: { params: ["i64"], results: ["i64"] }
  User: { capabilities: [status] }
  Slug: { capabilities: [text_decode, text_encode] }
  NotFound: { capabilities: [error, status] }
  CreateUserForm:
    fields:
      - { name: name, type: String, form: Name }
      - { name: age, type: i64, form: Age }
      - { name: tags, type: "Vec<String>" }
  BadForm:
    fields:
      - { name: owner, type: User }
functions:
  lookup_user: { path: "crate::users::lookup", params: ["String"], results: ["User", "NotFound"] }
"#;

fn definition(label: &str) -> EndpointDefinition {
    parse_label(label, SourceLocation::programmatic())
        .unwrap()
        .unwrap()
}

fn registry() -> TypeRegistry {
    TypeRegistry::from_yaml_str(TYPES).unwrap()
}

#[test]
fn test_synthesizes_without_host_types() {
    let mut def = definition("GET /user/{id} GetUser(ctx, id)");
    let mut resolver = Resolver::new(&NoTypes, None);
    resolver.resolve(&mut def).unwrap();

    let resolved = def.resolved.as_ref().unwrap();
    assert_eq!(resolved.kind, CallKind::Synthesized);
    assert_eq!(
        resolved.args,
        vec![
            ArgBinding::Context,
            ArgBinding::PathParam {
                name: "id".into(),
                ty: HostType::String
            }
        ]
    );
    assert_eq!(def.param_types, vec![("id".to_string(), HostType::String)]);

    let interface = resolver.finish();
    let sig = interface.get("GetUser").unwrap();
    assert_eq!(sig.rust_params(), "ctx: &Context, id: String");
    assert_eq!(sig.result, ResultShape::Single(HostType::Any));
}

#[test]
fn test_bound_method_types_path_params() {
    let types = registry();
    let mut def = definition("GET /user/{id} GetUser(ctx, id)");
    let mut resolver = Resolver::new(&types, Some("Server"));
    resolver.resolve(&mut def).unwrap();

    let resolved = def.resolved.as_ref().unwrap();
    assert_eq!(resolved.kind, CallKind::Method);
    assert!(resolved.value_has_status);
    assert!(!resolved.error_has_status);
    assert_eq!(
        def.param_types,
        vec![(
            "id".to_string(),
            HostType::Int {
                signed: true,
                bits: Some(64)
            }
        )]
    );
    assert!(resolver.finish().get("GetUser").is_some());
}

#[test]
fn test_free_functions_stay_out_of_the_interface() {
    let types = registry();
    let mut def = definition("GET /user/{name} Profile(ctx, lookup_user(name))");
    let mut resolver = Resolver::new(&types, Some("Server"));
    resolver.resolve(&mut def).unwrap();

    let resolved = def.resolved.as_ref().unwrap();
    let ArgBinding::Call(inner) = &resolved.args[1] else {
        panic!("expected nested call");
    };
    assert_eq!(
        inner.kind,
        CallKind::Function {
            path: "crate::users::lookup".into()
        }
    );
    assert!(inner.error_has_status);

    // The synthesized outer call takes the nested result type.
    assert_eq!(
        resolved.signature.params[1].ty,
        HostType::Named("User".into())
    );
    assert_eq!(resolved.nested().len(), 1);

    let interface = resolver.finish();
    let names: Vec<_> = interface.methods().map(|(name, _)| name).collect();
    assert_eq!(names, vec!["Profile"]);
}

#[test]
fn test_form_struct_binding() {
    let types = registry();
    let mut def = definition("POST /user 201 CreateUser(ctx, form)");
    Resolver::new(&types, Some("Server"))
        .resolve(&mut def)
        .unwrap();

    let resolved = def.resolved.unwrap();
    let ArgBinding::FormStruct { type_name, fields } = &resolved.args[1] else {
        panic!("expected form struct, got {:?}", resolved.args[1]);
    };
    assert_eq!(type_name, "CreateUserForm");
    assert_eq!(
        fields,
        &vec![
            FormField {
                name: "name".into(),
                form_name: "Name".into(),
                ty: HostType::String,
                many: false
            },
            FormField {
                name: "age".into(),
                form_name: "Age".into(),
                ty: HostType::Int {
                    signed: true,
                    bits: Some(64)
                },
                many: false
            },
            FormField {
                name: "tags".into(),
                form_name: "tags".into(),
                ty: HostType::String,
                many: true
            },
        ]
    );
}

#[test]
fn test_flag_result_and_custom_decoders() {
    let types = registry();
    let mut resolver = Resolver::new(&types, Some("Server"));

    let mut search = definition("GET /search Search(request)");
    resolver.resolve(&mut search).unwrap();
    assert!(matches!(
        search.resolved.unwrap().signature.result,
        ResultShape::WithFlag(_)
    ));

    let mut slug = definition("GET /p/{slug} ShowSlug(slug)");
    resolver.resolve(&mut slug).unwrap();
    assert_eq!(slug.param_type("slug"), HostType::Named("Slug".into()));
}

#[test]
fn test_argument_count_mismatch_reports_both_calls() {
    let types = registry();
    let mut def = definition("GET /user/{id} GetUser(id)");
    let err = Resolver::new(&types, Some("Server"))
        .resolve(&mut def)
        .unwrap_err();
    assert_eq!(
        err,
        ResolveError::ArgumentCount {
            expected: "GetUser(&Context, i64)".into(),
            actual: "GetUser(id)".into(),
        }
    );
}

#[test]
fn test_argument_type_errors() {
    let types = registry();
    let mut resolver = Resolver::new(&types, Some("Server"));

    let mut def = definition("GET /user/{id} GetUser(request, id)");
    assert!(matches!(
        resolver.resolve(&mut def),
        Err(ResolveError::ArgumentType { index: 0, .. })
    ));

    let mut def = definition("GET /owner/{id} ShowOwner(id)");
    assert_eq!(
        resolver.resolve(&mut def).unwrap_err(),
        ResolveError::UnsupportedParamType {
            name: "id".into(),
            ty: HostType::Named("User".into())
        }
    );

    let mut def = definition("POST /bad Search(form)");
    assert_eq!(
        resolver.resolve(&mut def).unwrap_err(),
        ResolveError::FormType {
            ty: HostType::Request
        }
    );
}

#[test]
fn test_conflicting_param_types() {
    let types = registry();
    let mut def = definition("GET /p/{slug} Both(ShowSlug(slug), Count(slug))");
    let err = Resolver::new(&types, Some("Server"))
        .resolve(&mut def)
        .unwrap_err();
    assert!(matches!(err, ResolveError::ConflictingParamType { ref name, .. } if name == "slug"));
}

#[test]
fn test_conflicting_synthesized_signatures() {
    let mut resolver = Resolver::new(&NoTypes, None);
    let mut first = definition("GET /a Page(ctx)");
    let mut second = definition("GET /b Page(request)");
    let mut third = definition("GET /c/{id} Page(id)");
    let mut same = definition("GET /d Page(ctx)");
    resolver.resolve(&mut first).unwrap();
    resolver.resolve(&mut same).unwrap();
    assert!(matches!(
        resolver.resolve(&mut second),
        Err(ResolveError::ConflictingSignature { .. })
    ));
    assert!(resolver.resolve(&mut third).is_err());
}

#[test]
fn test_nested_result_must_match_parameter() {
    let types = registry();
    let mut def = definition("GET /user/{id} GetUser(ctx, Lookup(id))");
    let err = Resolver::new(&types, Some("Server"))
        .resolve(&mut def)
        .unwrap_err();
    assert!(matches!(
        err,
        ResolveError::ArgumentType {
            index: 1,
            found: HostType::Any,
            ..
        }
    ));
}

#[test]
fn test_unsupported_form_fields() {
    let types = TypeRegistry::from_yaml_str(&TYPES.replace(
        "      Count: { params: [\"i64\"], results: [\"i64\"] }",
        "      Count: { params: [\"i64\"], results: [\"i64\"] }\n      Bad: { params: [\"BadForm\"], results: [\"Page\"] }",
    ))
    .unwrap();
    let mut def = definition("POST /bad Bad(form)");
    assert!(matches!(
        Resolver::new(&types, Some("Server")).resolve(&mut def),
        Err(ResolveError::UnsupportedFieldType { .. })
    ));
}

#[test]
fn test_resolve_definitions_collects_issues() {
    let types = registry();
    let mut defs = vec![
        definition("GET /user/{id} GetUser(id)"),
        definition("GET /ok Home()"),
        definition("GET /owner/{id} ShowOwner(id)"),
    ];
    let err = resolve_definitions(&mut defs, &types, Some("Server")).unwrap_err();
    assert_eq!(err.issues().len(), 2);
}

#[test]
fn test_definitions_without_calls_default_to_strings() {
    let mut defs = vec![definition("GET /static/{file...}")];
    let interface = resolve_definitions(&mut defs, &NoTypes, None).unwrap();
    assert!(interface.is_empty());
    assert_eq!(defs[0].param_types, vec![("file".to_string(), HostType::String)]);
    assert!(defs[0].resolved.is_none());
}
