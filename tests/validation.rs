mod common;

use common::{accounts, bound_dataset, column, dataset, interpreter};
use rstest::rstest;
use vtl_core::compiler::ast::{
    assign, binary, check, check_datapoint, check_hierarchy, define_datapoint_ruleset, define_hierarchical_ruleset, dp_rule,
    filter, hr_rule, ident, lit,
};
use vtl_core::expression::BinaryOp;
use vtl_core::validation::{OutputMode, RulesetKind, Sign, ValidationMode};
use vtl_core::{Component, ScalarType, Value, VtlError};

fn debit_ruleset() -> vtl_core::Statement {
    define_datapoint_ruleset(
        "dpr1",
        RulesetKind::Variable,
        &[("Id_3", None), ("Me_1", None)],
        vec![dp_rule(Some("debit_positive"), binary(BinaryOp::Ge, ident("Me_1"), lit(0i64)), Some("Bad debit"), Some(1))
            .when(binary(BinaryOp::Eq, ident("Id_3"), lit("DEBIT")))],
    )
}

#[test]
fn test_check_datapoint_reports_bad_debit() {
    let mut vtl = interpreter("memory");
    vtl.set("DS_1", accounts());
    vtl.run(&[debit_ruleset(), assign("DS_r", check_datapoint(ident("DS_1"), "dpr1", OutputMode::Invalid))]).unwrap();

    let result = bound_dataset(&vtl, "DS_r");
    let names: Vec<&str> = result.structure().names().collect();
    assert_eq!(names, vec!["Id_1", "Id_2", "Id_3", "ruleid", "Me_1", "errorcode", "errorlevel"]);
    assert_eq!(result.row_count(), 1);
    assert_eq!(column(result, "Id_3"), vec![Value::from("DEBIT")]);
    assert_eq!(column(result, "Me_1"), vec![Value::Integer(-2)]);
    assert_eq!(column(result, "ruleid"), vec![Value::from("debit_positive")]);
    assert_eq!(column(result, "errorcode"), vec![Value::from("Bad debit")]);
    assert_eq!(column(result, "errorlevel"), vec![Value::Integer(1)]);
}

#[test]
fn test_check_datapoint_all_mode_row_count() {
    let mut vtl = interpreter("memory");
    vtl.set("DS_1", accounts());
    let two_rules = define_datapoint_ruleset(
        "dpr2",
        RulesetKind::Variable,
        &[("Me_1", Some("m"))],
        vec![
            dp_rule(None, binary(BinaryOp::Ge, ident("m"), lit(0i64)), None, None),
            dp_rule(None, binary(BinaryOp::Lt, ident("m"), lit(100i64)), None, None),
        ],
    );
    vtl.run(&[
        two_rules,
        assign("all", check_datapoint(ident("DS_1"), "dpr2", OutputMode::All)),
        assign("invalid", check_datapoint(ident("DS_1"), "dpr2", OutputMode::Invalid)),
    ])
    .unwrap();

    let all = bound_dataset(&vtl, "all");
    assert_eq!(all.row_count(), 2 * 2);
    let failures = column(all, "bool_var").iter().filter(|v| **v == Value::Boolean(false)).count();
    assert_eq!(bound_dataset(&vtl, "invalid").row_count(), failures);
    assert_eq!(failures, 1);
}

#[test]
fn test_check_hierarchy_always_zero() {
    let mut vtl = interpreter("memory");
    vtl.set(
        "DS_1",
        dataset(
            vec![
                Component::identifier("Id_1", ScalarType::String),
                Component::identifier("Id_2", ScalarType::String),
                Component::measure("Me_1", ScalarType::Integer),
            ],
            vec![
                vec!["2010".into(), "B".into(), 11i64.into()],
                vec!["2010".into(), "C".into(), 0i64.into()],
                vec!["2010".into(), "G".into(), 19i64.into()],
            ],
        ),
    );
    let ruleset = define_hierarchical_ruleset(
        "hr1",
        RulesetKind::Variable,
        Some("Id_2"),
        vec![hr_rule(Some("R070"), "G", BinaryOp::Eq, &[(Sign::Plus, "B"), (Sign::Plus, "C")])],
    );
    vtl.run(&[
        ruleset,
        assign("DS_r", check_hierarchy(ident("DS_1"), "hr1", None, ValidationMode::AlwaysZero, OutputMode::All)),
    ])
    .unwrap();

    let result = bound_dataset(&vtl, "DS_r");
    assert!(!result.structure().contains("Id_2"));
    assert_eq!(column(result, "ruleid"), vec![Value::from("R070")]);
    assert_eq!(column(result, "imbalance"), vec![Value::Integer(8)]);
    assert_eq!(column(result, "bool_var"), vec![Value::Boolean(false)]);
}

#[test]
fn test_check_hierarchy_requires_monomeasure() {
    let mut vtl = interpreter("memory");
    vtl.set("DS_2", common::measures());
    let ruleset = define_hierarchical_ruleset(
        "hr1",
        RulesetKind::Variable,
        Some("Id_1"),
        vec![hr_rule(None, "A", BinaryOp::Eq, &[(Sign::Plus, "B")])],
    );
    vtl.execute(&ruleset).unwrap();
    let err = vtl
        .execute(&assign("r", check_hierarchy(ident("DS_2"), "hr1", None, ValidationMode::NonNull, OutputMode::Invalid)))
        .unwrap_err();
    assert!(err.to_string().contains("is not monomeasure"), "{}", err);
}

#[rstest]
#[case(true)]
#[case(false)]
fn test_check_invalid_is_failing_subset(#[case] invalid: bool) {
    let mut vtl = interpreter("memory");
    vtl.set("DS_1", accounts());
    let condition = binary(BinaryOp::Ge, ident("DS_1"), lit(0i64));
    vtl.run(&[
        assign("all", check(condition.clone(), Some(lit("negative")), Some(lit(2i64)), Some(ident("DS_1")), false)),
        assign("checked", check(condition, Some(lit("negative")), Some(lit(2i64)), Some(ident("DS_1")), invalid)),
        assign("failing", filter(ident("all"), binary(BinaryOp::Eq, ident("bool_var"), lit(false)))),
    ])
    .unwrap();

    let checked = bound_dataset(&vtl, "checked");
    let expected = if invalid { bound_dataset(&vtl, "failing") } else { bound_dataset(&vtl, "all") };
    assert_eq!(checked, expected);
    assert_eq!(column(bound_dataset(&vtl, "failing"), "errorcode"), vec![Value::from("negative")]);
    assert_eq!(column(bound_dataset(&vtl, "all"), "errorcode"), vec![Value::Null, Value::from("negative")]);
}

#[test]
fn test_check_condition_must_be_boolean() {
    let mut vtl = interpreter("memory");
    vtl.set("DS_1", accounts());
    let err = vtl.execute(&assign("r", check(ident("DS_1"), None, None, None, true).at(2, 5))).unwrap_err();
    match err {
        VtlError::Compile(e) => assert_eq!(e.position, vtl_core::compiler::ast::Position::new(2, 5)),
        other => panic!("unexpected error {}", other),
    }
}

#[test]
fn test_datapoint_alias_collides_with_component() {
    let mut vtl = interpreter("memory");
    vtl.set("DS_1", accounts());
    let ruleset = define_datapoint_ruleset(
        "dpr_alias",
        RulesetKind::Variable,
        &[("Me_1", Some("Id_3"))],
        vec![dp_rule(None, binary(BinaryOp::Ge, ident("Id_3"), lit(0i64)), None, None)],
    );
    vtl.execute(&ruleset).unwrap();
    let err = vtl.execute(&assign("r", check_datapoint(ident("DS_1"), "dpr_alias", OutputMode::All))).unwrap_err();
    match err {
        VtlError::Compile(e) => assert_eq!(e.kind, vtl_core::CompileErrorKind::NameCollision("Id_3".into())),
        other => panic!("unexpected error {}", other),
    }
}

/// `A = J + K + L` through `M <= G`, over one group where H and U are
/// present but null and most right-hand codes are missing.
fn hr_fixture(vtl: &mut vtl_core::Interpreter) {
    let rows: Vec<(&str, Option<i64>)> = vec![
        ("A", Some(5)),
        ("B", Some(11)),
        ("C", Some(0)),
        ("G", Some(19)),
        ("H", None),
        ("I", Some(14)),
        ("M", Some(2)),
        ("N", Some(5)),
        ("O", Some(4)),
        ("P", Some(7)),
        ("Q", Some(-7)),
        ("S", Some(3)),
        ("T", Some(9)),
        ("U", None),
        ("V", Some(6)),
    ];
    vtl.set(
        "DS_1",
        dataset(
            vec![
                Component::identifier("Id_1", ScalarType::String),
                Component::identifier("Id_2", ScalarType::String),
                Component::measure("Me_1", ScalarType::Integer),
            ],
            rows.into_iter().map(|(code, v)| vec![Value::from("2010"), Value::from(code), Value::from(v)]).collect(),
        ),
    );
    let plus = |codes: &[&'static str]| codes.iter().map(|c| (Sign::Plus, *c)).collect::<Vec<_>>();
    let rules = vec![
        hr_rule(Some("R010"), "A", BinaryOp::Eq, &plus(&["J", "K", "L"])).with_errors(None, Some(5)),
        hr_rule(Some("R020"), "B", BinaryOp::Eq, &plus(&["M", "N", "O"])).with_errors(None, Some(5)),
        hr_rule(Some("R030"), "C", BinaryOp::Eq, &plus(&["P", "Q"])).with_errors(Some("XX"), Some(5)),
        hr_rule(Some("R040"), "D", BinaryOp::Eq, &plus(&["R", "S"])).with_errors(None, Some(1)),
        hr_rule(Some("R050"), "E", BinaryOp::Eq, &plus(&["T", "U", "V"])).with_errors(None, Some(0)),
        hr_rule(Some("R060"), "F", BinaryOp::Eq, &plus(&["Y", "W", "Z"])).with_errors(None, Some(7)),
        hr_rule(Some("R070"), "G", BinaryOp::Eq, &plus(&["B", "C"])),
        hr_rule(Some("R080"), "H", BinaryOp::Eq, &plus(&["D", "E"])).with_errors(None, Some(0)),
        hr_rule(Some("R090"), "I", BinaryOp::Eq, &plus(&["D", "G"])).with_errors(Some("YY"), Some(0)),
        hr_rule(Some("R100"), "M", BinaryOp::Ge, &plus(&["N"])).with_errors(None, Some(5)),
        hr_rule(Some("R110"), "M", BinaryOp::Le, &plus(&["G"])).with_errors(None, Some(5)),
    ];
    vtl.execute(&define_hierarchical_ruleset("HR_1", RulesetKind::Variable, Some("Id_2"), rules)).unwrap();
}

type Expected = (&'static str, Option<bool>, Option<i64>, Option<&'static str>, Option<i64>);

const FAIL_R010: Expected = ("R010", Some(false), Some(5), None, Some(5));
const PASS_R020: Expected = ("R020", Some(true), Some(0), None, None);
const PASS_R030: Expected = ("R030", Some(true), Some(0), None, None);
const FAIL_R040: Expected = ("R040", Some(false), Some(-3), None, Some(1));
const PASS_R060: Expected = ("R060", Some(true), Some(0), None, None);
const FAIL_R070: Expected = ("R070", Some(false), Some(8), None, None);
const FAIL_R090: Expected = ("R090", Some(false), Some(-5), Some("YY"), Some(0));
const FAIL_R100: Expected = ("R100", Some(false), Some(-3), None, Some(5));
const PASS_R110: Expected = ("R110", Some(true), Some(-17), None, None);

const fn null_row(id: &'static str) -> Expected {
    (id, None, None, None, None)
}

#[rstest]
#[case(ValidationMode::NonNull, vec![PASS_R020, PASS_R030, FAIL_R070, FAIL_R100, PASS_R110])]
#[case(
    ValidationMode::NonZero,
    vec![FAIL_R010, PASS_R020, PASS_R030, FAIL_R040, null_row("R050"), FAIL_R070, null_row("R080"), FAIL_R090, FAIL_R100, PASS_R110]
)]
#[case(
    ValidationMode::PartialNull,
    vec![null_row("R010"), PASS_R020, PASS_R030, null_row("R040"), null_row("R050"), FAIL_R070, null_row("R090"), FAIL_R100, PASS_R110]
)]
#[case(
    ValidationMode::PartialZero,
    vec![FAIL_R010, PASS_R020, PASS_R030, FAIL_R040, null_row("R050"), FAIL_R070, FAIL_R090, FAIL_R100, PASS_R110]
)]
#[case(
    ValidationMode::AlwaysNull,
    vec![
        null_row("R010"), PASS_R020, PASS_R030, null_row("R040"), null_row("R050"), null_row("R060"), FAIL_R070,
        null_row("R080"), null_row("R090"), FAIL_R100, PASS_R110,
    ]
)]
#[case(
    ValidationMode::AlwaysZero,
    vec![
        FAIL_R010, PASS_R020, PASS_R030, FAIL_R040, null_row("R050"), PASS_R060, FAIL_R070, null_row("R080"),
        FAIL_R090, FAIL_R100, PASS_R110,
    ]
)]
fn test_check_hierarchy_mode_table(#[case] mode: ValidationMode, #[case] expected: Vec<Expected>) {
    let mut vtl = interpreter("memory");
    hr_fixture(&mut vtl);
    vtl.execute(&assign("DS_r", check_hierarchy(ident("DS_1"), "HR_1", Some("Id_2"), mode, OutputMode::All))).unwrap();

    let result = bound_dataset(&vtl, "DS_r");
    let names: Vec<&str> = result.structure().names().collect();
    assert_eq!(names, vec!["Id_1", "ruleid", "bool_var", "imbalance", "errorcode", "errorlevel"]);
    let rows: Vec<Vec<Value>> = result.sorted_rows().into_iter().map(|r| r.into_values()).collect();
    let expected: Vec<Vec<Value>> = expected
        .into_iter()
        .map(|(id, ok, imbalance, code, level)| {
            vec![Value::from("2010"), Value::from(id), Value::from(ok), Value::from(imbalance), Value::from(code), Value::from(level)]
        })
        .collect();
    assert_eq!(rows, expected);
}
