use std::sync::LazyLock;

use pest::Parser;
use pest::error::{ErrorVariant, InputLocation};
use pest::iterators::Pair;
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest_derive::Parser as PestParser;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::kernel::context::Context;
use crate::kernel::values::{as_f64, loose_eq, pretty, type_name};

#[derive(Debug, Error)]
pub enum ConditionError {
    #[error("invalid condition syntax at column {col}: {detail}")]
    Syntax { col: usize, detail: String },
    #[error("undefined identifier: {0}")]
    UnresolvedIdentifier(String),
    #[error("base object '{0}' not found in context")]
    BaseNotFound(String),
    #[error("property '{0}' not found in context")]
    PropertyNotFound(String),
    #[error("type error: {0}")]
    TypeMismatch(String),
    #[error("invalid regular expression /{pattern}/: {detail}")]
    InvalidRegex { pattern: String, detail: String },
}

impl ConditionError {
    /// Missing names, as opposed to malformed or ill-typed conditions.
    pub fn is_unresolved(&self) -> bool {
        matches!(
            self,
            ConditionError::UnresolvedIdentifier(_)
                | ConditionError::BaseNotFound(_)
                | ConditionError::PropertyNotFound(_)
        )
    }
}

pub type CondResult<T> = Result<T, ConditionError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

#[derive(Debug, Clone)]
pub enum CondExpr {
    /// Two or more operands; chains stay flat.
    Or(Vec<CondExpr>),
    And(Vec<CondExpr>),
    Not(Box<CondExpr>),
    Cmp {
        lhs: Box<CondExpr>,
        op: CmpOp,
        rhs: Box<CondExpr>,
    },
    In(Box<CondExpr>, Box<CondExpr>),
    Contains(Box<CondExpr>, Box<CondExpr>),
    Matches(Box<CondExpr>, Regex),
    Present(Vec<String>),
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// One segment is a bare identifier, more is a property path.
    Path(Vec<String>),
}

impl CondExpr {
    fn join_or(self, rhs: CondExpr) -> CondExpr {
        match self {
            CondExpr::Or(mut terms) => {
                terms.push(rhs);
                CondExpr::Or(terms)
            }
            lhs => CondExpr::Or(vec![lhs, rhs]),
        }
    }

    fn join_and(self, rhs: CondExpr) -> CondExpr {
        match self {
            CondExpr::And(mut terms) => {
                terms.push(rhs);
                CondExpr::And(terms)
            }
            lhs => CondExpr::And(vec![lhs, rhs]),
        }
    }
}

// === Parsing ===

#[derive(PestParser)]
#[grammar = "src/grammar/condition.pest"]
struct ConditionGrammar;

/// Deepest parenthesis nesting accepted by [`parse_condition`].
pub const MAX_PAREN_DEPTH: usize = 64;

static PRATT: LazyLock<PrattParser<Rule>> = LazyLock::new(|| {
    PrattParser::new()
        .op(Op::infix(Rule::or_op, Assoc::Left))
        .op(Op::infix(Rule::and_op, Assoc::Left))
});

fn syntax(pos: usize, detail: impl Into<String>) -> ConditionError {
    ConditionError::Syntax {
        col: pos + 1,
        detail: detail.into(),
    }
}

/// Offset of the first `(` past [`MAX_PAREN_DEPTH`]. Strings, regex literals
/// and comments are skipped the way the grammar skips them.
fn too_deep(src: &str) -> Option<usize> {
    let bytes = src.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;
    while let Some(&b) = bytes.get(i) {
        match b {
            b'"' | b'/' => i = skip_literal(bytes, i, b),
            b'#' => {
                while bytes.get(i + 1).is_some_and(|c| *c != b'\n') {
                    i += 1;
                }
            }
            b'(' => {
                depth += 1;
                if depth > MAX_PAREN_DEPTH {
                    return Some(i);
                }
            }
            b')' => depth = depth.saturating_sub(1),
            _ => {}
        }
        i += 1;
    }
    None
}

/// Index of the `delim` closing the literal opened at `open`, or the end of
/// input when it never closes.
fn skip_literal(bytes: &[u8], open: usize, delim: u8) -> usize {
    let mut i = open + 1;
    while let Some(&b) = bytes.get(i) {
        match b {
            b'\\' => i += 2,
            b if b == delim => return i,
            _ => i += 1,
        }
    }
    bytes.len()
}

fn expected(rule: &Rule) -> &'static str {
    match rule {
        Rule::ident | Rule::path => "a property name",
        Rule::regex => "a /pattern/ literal",
        Rule::or_op | Rule::and_op => "'and' or 'or'",
        Rule::cmp_op | Rule::in_op | Rule::contains_op | Rule::matches_op => "an operator",
        Rule::EOI => "the end of the condition",
        _ => "a value",
    }
}

fn from_pest(err: pest::error::Error<Rule>) -> ConditionError {
    let pos = match err.location {
        InputLocation::Pos(p) | InputLocation::Span((p, _)) => p,
    };
    let detail = match &err.variant {
        ErrorVariant::ParsingError { positives, .. } => {
            let mut wanted: Vec<&str> = Vec::new();
            for label in positives.iter().map(expected) {
                if !wanted.contains(&label) {
                    wanted.push(label);
                }
            }
            match wanted.as_slice() {
                [] => "unexpected input".to_string(),
                labels => format!("expected {}", labels.join(" or ")),
            }
        }
        ErrorVariant::CustomError { message } => message.clone(),
    };
    syntax(pos, detail)
}

pub fn parse_condition(src: &str) -> CondResult<CondExpr> {
    if src.trim().is_empty() {
        return Err(syntax(src.len(), "empty condition"));
    }
    if let Some(pos) = too_deep(src) {
        return Err(syntax(
            pos,
            format!("nesting too deep (more than {MAX_PAREN_DEPTH} levels of parentheses)"),
        ));
    }
    let root = ConditionGrammar::parse(Rule::condition, src)
        .map_err(from_pest)?
        .next()
        .ok_or_else(|| syntax(0, "empty condition"))?;
    let expr = root
        .into_inner()
        .find(|p| p.as_rule() == Rule::expr)
        .ok_or_else(|| syntax(0, "empty condition"))?;
    build_expr(expr)
}

fn build_expr(expr: Pair<'_, Rule>) -> CondResult<CondExpr> {
    PRATT
        .map_primary(build_term)
        .map_infix(|lhs, op, rhs| {
            let (lhs, rhs) = (lhs?, rhs?);
            Ok(match op.as_rule() {
                Rule::and_op => lhs.join_and(rhs),
                _ => lhs.join_or(rhs),
            })
        })
        .parse(expr.into_inner())
}

/// A run of `not`s folds to one negation, or to two when even so the operand
/// is still checked to be boolean.
fn build_term(term: Pair<'_, Rule>) -> CondResult<CondExpr> {
    let pos = term.as_span().start();
    let mut negations = 0usize;
    let mut comparison = None;
    for part in term.into_inner() {
        match part.as_rule() {
            Rule::not_op => negations += 1,
            _ => comparison = Some(part),
        }
    }
    let expr = build_comparison(comparison.ok_or_else(|| syntax(pos, "expected a value"))?)?;
    Ok(match negations {
        0 => expr,
        n if n % 2 == 1 => CondExpr::Not(Box::new(expr)),
        _ => CondExpr::Not(Box::new(CondExpr::Not(Box::new(expr)))),
    })
}

fn build_comparison(pair: Pair<'_, Rule>) -> CondResult<CondExpr> {
    let pos = pair.as_span().start();
    let mut inner = pair.into_inner();
    let lhs = build_operand(inner.next().ok_or_else(|| syntax(pos, "expected a value"))?)?;
    let Some(op) = inner.next() else {
        return Ok(lhs);
    };
    let rhs = inner
        .next()
        .ok_or_else(|| syntax(op.as_span().end(), "expected a value"))?;
    let lhs = Box::new(lhs);
    Ok(match op.as_rule() {
        Rule::cmp_op => CondExpr::Cmp {
            lhs,
            op: cmp_op(op.as_str()),
            rhs: Box::new(build_operand(rhs)?),
        },
        Rule::in_op => CondExpr::In(lhs, Box::new(build_operand(rhs)?)),
        Rule::contains_op => CondExpr::Contains(lhs, Box::new(build_operand(rhs)?)),
        _ => CondExpr::Matches(lhs, compile_regex(rhs)?),
    })
}

fn cmp_op(text: &str) -> CmpOp {
    match text {
        "==" => CmpOp::Eq,
        "!=" => CmpOp::Ne,
        "<=" => CmpOp::Le,
        ">=" => CmpOp::Ge,
        "<" => CmpOp::Lt,
        _ => CmpOp::Gt,
    }
}

fn build_operand(pair: Pair<'_, Rule>) -> CondResult<CondExpr> {
    let pos = pair.as_span().start();
    match pair.as_rule() {
        Rule::group => {
            let expr = pair
                .into_inner()
                .next()
                .ok_or_else(|| syntax(pos, "expected a value"))?;
            build_expr(expr)
        }
        Rule::string => Ok(CondExpr::Str(body_text(pair))),
        Rule::number => {
            let raw = pair.as_str();
            parse_number(raw).ok_or_else(|| syntax(pos, format!("invalid number '{raw}'")))
        }
        Rule::boolean => Ok(CondExpr::Bool(pair.as_str() == "true")),
        Rule::present => {
            let path = pair
                .into_inner()
                .find(|p| p.as_rule() == Rule::path)
                .ok_or_else(|| syntax(pos, "'present' expects an identifier or property path"))?;
            Ok(CondExpr::Present(segments(path)))
        }
        _ => Ok(CondExpr::Path(segments(pair))),
    }
}

fn body_text(pair: Pair<'_, Rule>) -> String {
    pair.into_inner()
        .next()
        .map(|body| body.as_str().to_string())
        .unwrap_or_default()
}

fn segments(path: Pair<'_, Rule>) -> Vec<String> {
    path.into_inner()
        .filter(|p| p.as_rule() == Rule::ident)
        .map(|p| p.as_str().to_string())
        .collect()
}

/// `\/` inside the literal stands for a plain slash.
fn compile_regex(pair: Pair<'_, Rule>) -> CondResult<Regex> {
    let pattern = body_text(pair).replace("\\/", "/");
    Regex::new(&pattern).map_err(|e| ConditionError::InvalidRegex {
        pattern: pattern.clone(),
        detail: e.to_string(),
    })
}

fn parse_number(raw: &str) -> Option<CondExpr> {
    if raw.starts_with('-') || raw.contains('.') {
        raw.parse::<f64>().ok().map(CondExpr::Float)
    } else {
        raw.parse::<i64>().ok().map(CondExpr::Int)
    }
}

// === Evaluation ===

/// Parses and evaluates `src` against `ctx`. The whole condition must come
/// out boolean.
pub fn evaluate(src: &str, ctx: &Context) -> CondResult<bool> {
    let expr = parse_condition(src)?;
    let v = eval(&expr, ctx)?;
    want_bool(&v, "condition")
}

pub fn eval(expr: &CondExpr, ctx: &Context) -> CondResult<Value> {
    Ok(match expr {
        CondExpr::Bool(b) => Value::Bool(*b),
        CondExpr::Int(n) => Value::from(*n),
        CondExpr::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        CondExpr::Str(s) => Value::String(s.clone()),
        CondExpr::Path(segs) => lookup(ctx, segs)?.clone(),
        CondExpr::Present(segs) => Value::Bool(ctx.contains_path(&segs.join("."))),
        CondExpr::Or(terms) => Value::Bool(junction(terms, ctx, "or", true)?),
        CondExpr::And(terms) => Value::Bool(junction(terms, ctx, "and", false)?),
        CondExpr::Not(e) => Value::Bool(!want_bool(&eval(e, ctx)?, "operand of 'not'")?),
        CondExpr::Cmp { lhs, op, rhs } => {
            let l = eval(lhs, ctx)?;
            let r = eval(rhs, ctx)?;
            Value::Bool(compare(*op, &l, &r)?)
        }
        CondExpr::In(needle, hay) => {
            let n = eval(needle, ctx)?;
            let h = eval(hay, ctx)?;
            Value::Bool(member(&n, &h, "right operand of 'in'")?)
        }
        CondExpr::Contains(hay, needle) => {
            let h = eval(hay, ctx)?;
            let n = eval(needle, ctx)?;
            Value::Bool(member(&n, &h, "left operand of 'contains'")?)
        }
        CondExpr::Matches(subject, re) => {
            let s = eval(subject, ctx)?;
            Value::Bool(re.is_match(&pretty(&s)))
        }
    })
}

/// Evaluates left to right and stops at the first operand equal to `stop_on`.
fn junction(terms: &[CondExpr], ctx: &Context, op: &str, stop_on: bool) -> CondResult<bool> {
    for (i, term) in terms.iter().enumerate() {
        let side = if i == 0 { "left" } else { "right" };
        if want_bool(&eval(term, ctx)?, &format!("{side} operand of '{op}'"))? == stop_on {
            return Ok(stop_on);
        }
    }
    Ok(!stop_on)
}

fn want_bool(v: &Value, what: &str) -> CondResult<bool> {
    v.as_bool().ok_or_else(|| {
        ConditionError::TypeMismatch(format!("{what} must be a boolean, got {}", type_name(v)))
    })
}

fn lookup<'c>(ctx: &'c Context, segs: &[String]) -> CondResult<&'c Value> {
    let (root, props) = match segs.split_first() {
        Some(split) => split,
        None => return Err(ConditionError::UnresolvedIdentifier(String::new())),
    };
    let Some(mut cur) = ctx.get(root) else {
        return Err(if props.is_empty() {
            ConditionError::UnresolvedIdentifier(root.clone())
        } else {
            ConditionError::BaseNotFound(root.clone())
        });
    };
    let mut path = root.clone();
    for prop in props {
        path.push('.');
        path.push_str(prop);
        cur = cur
            .as_object()
            .and_then(|m| m.get(prop))
            .ok_or_else(|| ConditionError::PropertyNotFound(path.clone()))?;
    }
    Ok(cur)
}

fn compare(op: CmpOp, l: &Value, r: &Value) -> CondResult<bool> {
    match op {
        CmpOp::Eq => return Ok(loose_eq(l, r)),
        CmpOp::Ne => return Ok(!loose_eq(l, r)),
        _ => {}
    }
    let ord = match (l, r) {
        (Value::Number(_), Value::Number(_)) => {
            let (a, b) = (as_f64(l).unwrap_or(f64::NAN), as_f64(r).unwrap_or(f64::NAN));
            a.partial_cmp(&b)
        }
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => {
            return Err(ConditionError::TypeMismatch(format!(
                "cannot order {} and {}",
                type_name(l),
                type_name(r)
            )));
        }
    };
    let Some(ord) = ord else { return Ok(false) };
    Ok(match op {
        CmpOp::Lt => ord.is_lt(),
        CmpOp::Gt => ord.is_gt(),
        CmpOp::Le => ord.is_le(),
        CmpOp::Ge => ord.is_ge(),
        CmpOp::Eq => ord.is_eq(),
        CmpOp::Ne => ord.is_ne(),
    })
}

fn member(needle: &Value, hay: &Value, what: &str) -> CondResult<bool> {
    match hay {
        Value::String(s) => match needle {
            Value::String(n) => Ok(s.contains(n.as_str())),
            other => Err(ConditionError::TypeMismatch(format!(
                "substring test needs a string, got {}",
                type_name(other)
            ))),
        },
        Value::Array(items) => Ok(items.iter().any(|it| loose_eq(it, needle))),
        Value::Object(map) => Ok(needle.as_str().is_some_and(|k| map.contains_key(k))),
        other => Err(ConditionError::TypeMismatch(format!(
            "{what} must be a string, list or mapping, got {}",
            type_name(other)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(v: Value) -> Context {
        Context::from_json(v).unwrap()
    }

    fn eval_empty(src: &str) -> CondResult<bool> {
        evaluate(src, &Context::new())
    }

    #[test]
    fn literals_and_boolean_ops() -> CondResult<()> {
        assert!(eval_empty("true")?);
        assert!(!eval_empty("false")?);
        assert!(eval_empty("not false")?);
        assert!(eval_empty("true and not false")?);
        assert!(eval_empty("false or true")?);
        assert!(!eval_empty("not (true or false)")?);
        assert!(eval_empty("true && !false")?);
        Ok(())
    }

    #[test]
    fn and_binds_tighter_than_or() -> CondResult<()> {
        assert!(eval_empty("true or false and false")?);
        assert!(!eval_empty("(true or false) and false")?);
        Ok(())
    }

    #[test]
    fn comparisons() -> CondResult<()> {
        assert!(eval_empty("5 > 3")?);
        assert!(eval_empty("3 < 5")?);
        assert!(eval_empty("5 >= 5")?);
        assert!(eval_empty("4 <= 5")?);
        assert!(eval_empty("5 == 5.0")?);
        assert!(eval_empty("5 != 4")?);
        assert!(eval_empty("-1.5 < 0")?);
        assert!(eval_empty("\"abc\" < \"abd\"")?);
        assert!(!eval_empty("\"5\" == 5")?);
        Ok(())
    }

    #[test]
    fn numbers_pick_representation() -> CondResult<()> {
        assert!(matches!(parse_condition("42")?, CondExpr::Int(42)));
        assert!(matches!(parse_condition("-3")?, CondExpr::Float(f) if f == -3.0));
        assert!(matches!(parse_condition("2.5")?, CondExpr::Float(f) if f == 2.5));
        Ok(())
    }

    #[test]
    fn string_literals_are_verbatim() -> CondResult<()> {
        let c = ctx(json!({"s": "a\\\"b"}));
        assert!(evaluate(r#"s == "a\"b""#, &c)?);
        Ok(())
    }

    #[test]
    fn membership() -> CondResult<()> {
        let c = ctx(json!({"roles": ["admin", "user"], "title": "Dashboard", "m": {"k": 1}}));
        assert!(evaluate("\"admin\" in roles", &c)?);
        assert!(!evaluate("\"guest\" in roles", &c)?);
        assert!(evaluate("title contains \"board\"", &c)?);
        assert!(evaluate("\"Dash\" in title", &c)?);
        assert!(evaluate("\"k\" in m", &c)?);
        assert!(evaluate("roles contains \"user\"", &c)?);
        Ok(())
    }

    #[test]
    fn membership_type_errors() {
        let c = ctx(json!({"n": 5}));
        assert!(matches!(
            evaluate("1 in n", &c),
            Err(ConditionError::TypeMismatch(_))
        ));
        assert!(matches!(
            evaluate("n contains 1", &c),
            Err(ConditionError::TypeMismatch(_))
        ));
        assert!(matches!(
            eval_empty("5 in \"abc\""),
            Err(ConditionError::TypeMismatch(_))
        ));
    }

    #[test]
    fn regex_search() -> CondResult<()> {
        assert!(eval_empty(r#""123" matches /^\d+$/"#)?);
        assert!(eval_empty(r#""abc123def" matches /\d+/"#)?);
        assert!(!eval_empty(r#""abc" matches /^\d+$/"#)?);
        assert!(eval_empty(r#""a/b" matches /a\/b/"#)?);
        let c = ctx(json!({"count": 42}));
        assert!(evaluate(r#"count matches /^4/"#, &c)?);
        Ok(())
    }

    #[test]
    fn bad_regex_is_reported() {
        assert!(matches!(
            eval_empty(r#""x" matches /(/"#),
            Err(ConditionError::InvalidRegex { .. })
        ));
        assert!(matches!(
            eval_empty(r#""x" matches "x""#),
            Err(ConditionError::Syntax { .. })
        ));
    }

    #[test]
    fn presence_never_raises() -> CondResult<()> {
        let c = ctx(json!({"user": {"name": "A"}}));
        assert!(!evaluate("present user.email", &c)?);
        assert!(evaluate("present user.name", &c)?);
        assert!(evaluate("present user", &c)?);
        assert!(!evaluate("present nobody.home", &c)?);
        assert!(evaluate("not present user.email and present user", &c)?);
        Ok(())
    }

    #[test]
    fn property_access() -> CondResult<()> {
        let c = ctx(json!({"user": {"profile": {"age": 30}, "name": "A"}}));
        assert!(evaluate("user.profile.age == 30", &c)?);
        assert!(matches!(
            evaluate("ghost.name == 1", &c),
            Err(ConditionError::BaseNotFound(b)) if b == "ghost"
        ));
        assert!(matches!(
            evaluate("user.email == 1", &c),
            Err(ConditionError::PropertyNotFound(p)) if p == "user.email"
        ));
        assert!(matches!(
            evaluate("user.name.first == 1", &c),
            Err(ConditionError::PropertyNotFound(p)) if p == "user.name.first"
        ));
        Ok(())
    }

    #[test]
    fn unresolved_identifier_is_distinguishable() {
        let err = eval_empty("missing_var").unwrap_err();
        assert!(matches!(err, ConditionError::UnresolvedIdentifier(ref n) if n == "missing_var"));
        assert!(err.is_unresolved());
        assert!(!ConditionError::TypeMismatch("x".into()).is_unresolved());
    }

    #[test]
    fn bare_identifier_must_be_boolean() -> CondResult<()> {
        let c = ctx(json!({"flag": true, "name": "x"}));
        assert!(evaluate("flag", &c)?);
        assert!(!evaluate("not flag", &c)?);
        assert!(matches!(
            evaluate("name", &c),
            Err(ConditionError::TypeMismatch(_))
        ));
        assert!(matches!(
            evaluate("name and flag", &c),
            Err(ConditionError::TypeMismatch(_))
        ));
        Ok(())
    }

    #[test]
    fn short_circuit_skips_unresolved_right_side() -> CondResult<()> {
        assert!(eval_empty("true or missing")?);
        assert!(!eval_empty("false and missing")?);
        Ok(())
    }

    #[test]
    fn comments_and_whitespace() -> CondResult<()> {
        assert!(eval_empty("  5 >\n 3 # trailing note")?);
        Ok(())
    }

    #[test]
    fn deep_parentheses_are_rejected() -> CondResult<()> {
        let depth = 20_000;
        let src = format!("{}true{}", "(".repeat(depth), ")".repeat(depth));
        match eval_empty(&src) {
            Err(ConditionError::Syntax { col, detail }) => {
                assert!(detail.contains("nesting too deep"), "{detail}");
                assert_eq!(col, MAX_PAREN_DEPTH + 1);
            }
            other => panic!("expected a syntax error, got {other:?}"),
        }
        let ok = format!("{}true{}", "(".repeat(MAX_PAREN_DEPTH), ")".repeat(MAX_PAREN_DEPTH));
        assert!(eval_empty(&ok)?);
        // parentheses inside literals are not nesting
        let c = ctx(json!({"s": "((("}));
        let quoted = format!("s == \"{}\"", "(".repeat(200));
        assert!(!evaluate(&quoted, &c)?);
        Ok(())
    }

    #[test]
    fn long_chains_stay_flat() -> CondResult<()> {
        let n = 20_000;
        let all = vec!["true"; n].join(" and ");
        assert!(matches!(parse_condition(&all)?, CondExpr::And(ref terms) if terms.len() == n));
        assert!(eval_empty(&all)?);
        let any = format!("{} or true", vec!["false"; n].join(" || "));
        assert!(eval_empty(&any)?);
        let negated = format!("{}false", "not ".repeat(n + 1));
        assert!(eval_empty(&negated)?);
        assert!(!eval_empty(&format!("{}false", "!".repeat(n)))?);
        Ok(())
    }

    #[test]
    fn double_negation_still_wants_a_boolean() {
        let c = ctx(json!({"name": "x"}));
        assert!(matches!(
            evaluate("not not name", &c),
            Err(ConditionError::TypeMismatch(_))
        ));
    }

    #[test]
    fn syntax_errors_point_at_the_problem() {
        match eval_empty(r#""x" matches "x""#) {
            Err(ConditionError::Syntax { col, detail }) => {
                assert_eq!(col, 13);
                assert!(detail.contains("/pattern/"), "{detail}");
            }
            other => panic!("expected a syntax error, got {other:?}"),
        }
        match eval_empty("   ") {
            Err(ConditionError::Syntax { detail, .. }) => assert_eq!(detail, "empty condition"),
            other => panic!("expected a syntax error, got {other:?}"),
        }
    }

    #[test]
    fn syntax_errors_are_reported_not_panicked() {
        for bad in ["", "5 >", "(true", "true)", "a.", "5 > > 3", "\"open", "@", "present 5", "1 == 2 == 3"] {
            assert!(
                matches!(eval_empty(bad), Err(ConditionError::Syntax { .. })),
                "expected syntax error for {bad:?}"
            );
        }
    }
}
