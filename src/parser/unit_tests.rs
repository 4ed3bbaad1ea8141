use super::api::Rule;
use super::api::ScriptParser;
use super::ast::{Literal, Statement};

use pest::consumes_to;
use pest::parses_to;
use pest::Parser;

#[test]
fn test_define_without_value() {
    parses_to! {
        parser: ScriptParser,
        input: "define A.B;",
        rule: Rule::define_statement,
        tokens: [
            define_statement(0, 11, [
                namespace_path(7, 10)
            ])
        ]
    };
}

#[test]
fn test_define_with_number() {
    parses_to! {
        parser: ScriptParser,
        input: "define A.x = 4;",
        rule: Rule::define_statement,
        tokens: [
            define_statement(0, 15, [
                namespace_path(7, 10),
                number_literal(13, 14)
            ])
        ]
    };
}

#[test]
fn test_require_mixes_resource_paths_and_namespaces() {
    parses_to! {
        parser: ScriptParser,
        input: "require a/b.js, C { }",
        rule: Rule::require_statement,
        tokens: [
            require_statement(0, 21, [
                requirement_list(8, 17, [
                    resource_path(8, 14),
                    namespace_path(16, 17)
                ]),
                block(18, 21)
            ])
        ]
    };
}

#[test]
fn test_log_statement() {
    parses_to! {
        parser: ScriptParser,
        input: "log \"hi\";",
        rule: Rule::log_statement,
        tokens: [
            log_statement(0, 9, [
                string_literal(4, 8, [
                    string_inner(5, 7)
                ])
            ])
        ]
    };
}

#[test]
fn test_dotted_name_is_not_a_resource_path() {
    assert!(ScriptParser::parse(Rule::resource_path, "com.acme.Car").is_err());
    assert!(ScriptParser::parse(Rule::resource_path, "vendor/jquery.min.js").is_ok());
}

#[test]
fn test_missing_semicolon_is_rejected() {
    assert!(ScriptParser::parse_to_script("define A.B").is_err());
    assert!(ScriptParser::parse_to_script("define ;").is_err());
}

#[test]
fn test_script_to_ast() {
    let source = r#"
        // the car module
        define com.acme.Car;
        define com.acme.Car.name = "Car \"X\"";
        define com.acme.Car.enabled = false;
        /* deferred part */
        require com.acme.Vehicle, vendor/jquery.js {
            log "vehicle ready";
            define com.acme.Car.Wheel = null;
        }
    "#;
    let script = ScriptParser::parse_to_script(source).unwrap();
    assert_eq!(script.body.len(), 4);
    assert_eq!(
        script.body[0],
        Statement::Define {
            path: "com.acme.Car".to_string(),
            value: None
        }
    );
    assert_eq!(
        script.body[1],
        Statement::Define {
            path: "com.acme.Car.name".to_string(),
            value: Some(Literal::Str("Car \"X\"".to_string()))
        }
    );
    assert_eq!(
        script.body[2],
        Statement::Define {
            path: "com.acme.Car.enabled".to_string(),
            value: Some(Literal::Bool(false))
        }
    );
    match &script.body[3] {
        Statement::Require { requires, body } => {
            assert_eq!(requires, &vec!["com.acme.Vehicle", "vendor/jquery.js"]);
            assert_eq!(body.len(), 2);
            assert_eq!(body[0], Statement::Log("vehicle ready".to_string()));
        }
        other => panic!("expected require, got {:?}", other),
    }
    assert_eq!(
        script.required_names(),
        vec!["com.acme.Vehicle", "vendor/jquery.js"]
    );
}

#[test]
fn test_nested_requires_are_collected() {
    let source = "require A { require B.C { define D; } }";
    let script = ScriptParser::parse_to_script(source).unwrap();
    assert_eq!(script.required_names(), vec!["A", "B.C"]);
}

#[test]
fn test_negative_number_literal() {
    let script = ScriptParser::parse_to_script("define A.n = -2.5;").unwrap();
    assert_eq!(
        script.body[0],
        Statement::Define {
            path: "A.n".to_string(),
            value: Some(Literal::Number(-2.5))
        }
    );
}

#[test]
fn test_token_tree_rendering() {
    let tree = super::parse_to_token_tree("define A;").unwrap();
    let lines: Vec<&str> = tree.lines().collect();
    assert_eq!(lines[0], "script 0..9");
    assert_eq!(lines[1], "  define_statement 0..9");
    assert_eq!(lines[2], "    namespace_path 7..8 \"A\"");
    assert!(super::parse_to_token_tree("define").is_err());
}
