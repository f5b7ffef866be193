//! Band-maths expression parsing and evaluation

use ru_l3bin::errors::BinningError;
use ru_l3bin::expr::{identifiers, CompiledExpression};

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn eval(source: &str, vars: &[&str], values: &[f64]) -> f64 {
    CompiledExpression::compile(source, &names(vars))
        .unwrap_or_else(|e| panic!("{source}: {e}"))
        .evaluate(values)
}

#[test]
fn test_arithmetic_precedence() {
    let vars = ["a", "b"];
    let values = [1.0, 3.0];
    assert_eq!(eval("a + b * 2", &vars, &values), 7.0);
    assert_eq!(eval("(a + b) * 2", &vars, &values), 8.0);
    assert_eq!(eval("b - a - 1", &vars, &values), 1.0);
    assert_eq!(eval("b / a / 2", &vars, &values), 1.5);
    assert_eq!(eval("-a * b", &vars, &values), -3.0);
    assert_eq!(eval("b - -a", &vars, &values), 4.0);
    assert_eq!(eval("2.5e1 + .5", &vars, &values), 25.5);
}

#[test]
fn test_comparisons_and_logic() {
    let vars = ["chl", "qa"];
    assert_eq!(eval("chl > 0 && qa == 0", &vars, &[0.3, 0.0]), 1.0);
    assert_eq!(eval("chl > 0 && qa == 0", &vars, &[0.3, 2.0]), 0.0);
    assert_eq!(eval("chl > 1 || qa != 0", &vars, &[0.3, 2.0]), 1.0);
    assert_eq!(eval("chl >= 0.3 and qa <= 2", &vars, &[0.3, 2.0]), 1.0);
    assert_eq!(eval("not (chl < 0.3)", &vars, &[0.3, 2.0]), 1.0);
    assert_eq!(eval("!true || false", &vars, &[0.0, 0.0]), 0.0);
    // comparison binds tighter than logic, arithmetic tighter than comparison
    assert_eq!(eval("chl + 1 > qa && qa > 1", &vars, &[1.5, 2.0]), 1.0);
}

#[test]
fn test_functions() {
    let vars = ["a", "b"];
    let values = [-4.0, 9.0];
    assert_eq!(eval("abs(a)", &vars, &values), 4.0);
    assert_eq!(eval("sqrt(b)", &vars, &values), 3.0);
    assert_eq!(eval("min(a, b)", &vars, &values), -4.0);
    assert_eq!(eval("max(a, b)", &vars, &values), 9.0);
    assert!((eval("log(exp(2))", &vars, &values) - 2.0).abs() < 1e-12);
    assert!((eval("log10(b + 91)", &vars, &values) - 2.0).abs() < 1e-12);
    assert_eq!(eval("nan(a)", &vars, &[f64::NAN, 0.0]), 1.0);
    assert_eq!(eval("nan(a)", &vars, &values), 0.0);
}

#[test]
fn test_nan_handling() {
    let expr = CompiledExpression::compile("sst > 10", &names(&["sst"])).expect("compile");
    assert!(!expr.evaluate_bool(&[f64::NAN]));
    assert!(expr.evaluate_bool(&[11.0]));
    assert!(!expr.evaluate_bool(&[9.0]));

    let nan = CompiledExpression::compile("NaN", &[]).expect("compile");
    assert!(nan.evaluate(&[]).is_nan());
    assert!(!nan.evaluate_bool(&[]));

    let guarded = CompiledExpression::compile("!nan(sst) && sst > 10", &names(&["sst"])).expect("compile");
    assert!(!guarded.evaluate_bool(&[f64::NAN]));
}

#[test]
fn test_identifiers_in_first_use_order() {
    let ids = identifiers("chl > 0 && !nan(sst) && chl < max(sst, wind_speed_10m)").expect("parse");
    assert_eq!(ids, names(&["chl", "sst", "wind_speed_10m"]));

    // keywords and function names are not identifiers
    let ids = identifiers("true and not nan(x)").expect("parse");
    assert_eq!(ids, names(&["x"]));

    // keyword prefixes still make identifiers
    let ids = identifiers("notes + order + android").expect("parse");
    assert_eq!(ids, names(&["notes", "order", "android"]));
}

#[test]
fn test_compile_binds_by_position() {
    let expr = CompiledExpression::compile("b - a", &names(&["a", "b", "c"])).expect("compile");
    assert_eq!(expr.source(), "b - a");
    assert_eq!(expr.evaluate(&[1.0, 10.0, 100.0]), 9.0);
}

#[test]
fn test_errors() {
    let vars = names(&["a"]);
    for source in ["a +", "(a", "a b", "", "max(a)", "foo(a)", "c > 0", "a > > 1"] {
        match CompiledExpression::compile(source, &vars) {
            Err(BinningError::Expression { expression, .. }) => assert_eq!(expression, source),
            other => panic!("'{source}' should fail, got {other:?}"),
        }
    }
}

#[test]
fn test_unknown_identifier_message() {
    let err = CompiledExpression::compile("chl > 0", &names(&["sst"])).unwrap_err();
    assert!(err.to_string().contains("chl"), "{err}");
}
