//! Round-trip fixture suites: parse, runner and tree comparison.
//!
//! A case names a root type, its parser arguments and the raw bytes. The runner
//! parses the bytes with tracing on, checks the whole input was consumed,
//! compares the field tree to `expect` and checks that re-serializing the
//! parsed value reproduces the input (or `reserialized`, when given).
//! A case with `error: Kind;` instead expects the parse to fail with that kind.
//!
//! Expectations may omit fields: every listed child must appear, in order,
//! among the actual children of its group.

use crate::buffer::ByteOrder;
use crate::codec::{Codec, CodecError};
use crate::dump::Node;
use crate::protocols::root_type;
use crate::value::Value;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser as PestParser;
use std::fmt;
use std::path::Path;

#[derive(PestParser)]
#[grammar = "fixture.pest"]
struct FixtureParser;

#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("fixture syntax: {0}")]
    Syntax(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("case {case}: invalid hex: {source}")]
    InvalidHex { case: String, source: hex::FromHexError },
    #[error("case {case}: unknown root type {root}")]
    UnknownRoot { case: String, root: String },
    #[error("case {case}: {source}")]
    Codec { case: String, source: CodecError },
    #[error("case {case}: expected {expected} error, parse succeeded")]
    UnexpectedSuccess { case: String, expected: String },
    #[error("case {case}: expected {expected} error, got {actual}")]
    WrongError { case: String, expected: String, actual: CodecError },
    #[error("case {case}: consumed {consumed} of {total} bits")]
    Incomplete { case: String, consumed: usize, total: usize },
    #[error("case {case}: at {path}: {detail}")]
    TreeMismatch { case: String, path: String, detail: String },
    #[error("case {case}: re-serialized bytes differ: expected {expected}, got {actual}")]
    BytesMismatch { case: String, expected: String, actual: String },
}

/// Literal on the right-hand side of an expected leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(i128),
    Float(f64),
    Bool(bool),
    Bytes(Vec<u8>),
    Str(String),
    /// Enum constant name.
    Name(String),
    Padding(usize),
}

impl Literal {
    fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Literal::Number(n), Value::UInt(v)) => *n == i128::from(*v),
            (Literal::Number(n), Value::Int(v)) => *n == i128::from(*v),
            (Literal::Number(n), Value::Enum { value, .. }) => *n == i128::from(*value),
            (Literal::Float(x), Value::Float(v)) => x == v,
            (Literal::Bool(b), Value::Bit(v)) => b == v,
            (Literal::Bytes(b), Value::Bytes(v)) => b == v,
            (Literal::Str(s), Value::Str(v)) => s == v,
            (Literal::Name(n), Value::Enum { name, .. }) => n == name,
            (Literal::Padding(n), Value::Padding(v)) => n == v,
            _ => false,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Number(n) => write!(f, "{}", n),
            Literal::Float(x) => write!(f, "{:?}", x),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Bytes(b) => write!(f, "hex\"{}\"", hex::encode(b)),
            Literal::Str(s) => write!(f, "{:?}", s),
            Literal::Name(n) => write!(f, "{}", n),
            Literal::Padding(n) => write!(f, "padding({})", n),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expected {
    Leaf { name: String, value: Literal },
    Group { name: String, children: Vec<Expected> },
}

impl Expected {
    pub fn name(&self) -> &str {
        match self {
            Expected::Leaf { name, .. } | Expected::Group { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Parse must succeed; the tree is checked when given.
    Decodes(Option<Expected>),
    /// Parse must fail with this [`ErrorKind`](crate::ErrorKind) name.
    Fails(String),
}

#[derive(Debug, Clone)]
pub struct Case {
    pub name: String,
    pub root: String,
    pub args: Vec<u64>,
    pub raw: Vec<u8>,
    pub reserialized: Option<Vec<u8>>,
    pub outcome: Outcome,
}

#[derive(Debug, Clone)]
pub struct Suite {
    pub name: String,
    pub byte_order: ByteOrder,
    pub cases: Vec<Case>,
}

/// Outcome of one case in a suite run.
#[derive(Debug)]
pub struct CaseResult {
    pub suite: String,
    pub case: String,
    pub result: Result<(), FixtureError>,
}

/// Parse fixture source into suites.
pub fn parse(source: &str) -> Result<Vec<Suite>, FixtureError> {
    let pairs = FixtureParser::parse(Rule::file, source).map_err(|e| FixtureError::Syntax(e.to_string()))?;
    let file = pairs.into_iter().next().ok_or_else(|| FixtureError::Syntax("empty input".into()))?;
    file.into_inner()
        .filter(|p| p.as_rule() == Rule::suite)
        .map(build_suite)
        .collect()
}

pub fn load(path: impl AsRef<Path>) -> Result<Vec<Suite>, FixtureError> {
    let source = std::fs::read_to_string(path)?;
    parse(&source)
}

fn syntax(what: &str) -> FixtureError {
    FixtureError::Syntax(format!("missing {}", what))
}

fn build_suite(pair: Pair<Rule>) -> Result<Suite, FixtureError> {
    let mut name = None;
    let mut byte_order = ByteOrder::BigEndian;
    let mut cases = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::string => name = Some(string_value(inner)),
            Rule::byte_order_decl => {
                let order = inner.into_inner().next().ok_or_else(|| syntax("byte order"))?;
                byte_order = match order.as_str() {
                    "little" => ByteOrder::LittleEndian,
                    _ => ByteOrder::BigEndian,
                };
            }
            Rule::case => cases.push(build_case(inner)?),
            _ => {}
        }
    }
    Ok(Suite { name: name.ok_or_else(|| syntax("suite name"))?, byte_order, cases })
}

fn build_case(pair: Pair<Rule>) -> Result<Case, FixtureError> {
    let mut name = String::new();
    let mut root = String::new();
    let mut args = Vec::new();
    let mut raw = Vec::new();
    let mut reserialized = None;
    let mut outcome = Outcome::Decodes(None);
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::string => name = string_value(inner),
            Rule::root_decl => {
                root = inner.into_inner().next().ok_or_else(|| syntax("root type"))?.as_str().to_string();
            }
            Rule::args_decl => {
                for arg in inner.into_inner() {
                    args.push(match arg.as_rule() {
                        Rule::boolean => u64::from(arg.as_str() == "true"),
                        _ => u64::try_from(number_value(arg)?)
                            .map_err(|_| FixtureError::Syntax(format!("case {}: negative argument", name)))?,
                    });
                }
            }
            Rule::raw_decl => raw = hex_value(&name, inner)?,
            Rule::reserialized_decl => reserialized = Some(hex_value(&name, inner)?),
            Rule::error_decl => {
                let kind = inner.into_inner().next().ok_or_else(|| syntax("error kind"))?;
                outcome = Outcome::Fails(kind.as_str().to_string());
            }
            Rule::expect_decl => {
                let node = inner.into_inner().next().ok_or_else(|| syntax("expected tree"))?;
                outcome = Outcome::Decodes(Some(build_expected(node)?));
            }
            _ => {}
        }
    }
    Ok(Case { name, root, args, raw, reserialized, outcome })
}

fn build_expected(pair: Pair<Rule>) -> Result<Expected, FixtureError> {
    let rule = pair.as_rule();
    let mut it = pair.into_inner();
    let name = it.next().ok_or_else(|| syntax("field name"))?.as_str().to_string();
    match rule {
        Rule::group => {
            let children = it.map(build_expected).collect::<Result<_, _>>()?;
            Ok(Expected::Group { name, children })
        }
        _ => {
            let lit = it.next().ok_or_else(|| syntax("field value"))?;
            Ok(Expected::Leaf { name, value: build_literal(lit)? })
        }
    }
}

fn build_literal(pair: Pair<Rule>) -> Result<Literal, FixtureError> {
    Ok(match pair.as_rule() {
        Rule::hex_bytes => {
            let digits = pair.into_inner().next().map_or("", |p| p.as_str());
            Literal::Bytes(hex::decode(digits).map_err(|e| FixtureError::Syntax(format!("hex literal: {}", e)))?)
        }
        Rule::padding => {
            let n = pair.into_inner().next().ok_or_else(|| syntax("padding size"))?;
            let n = usize::try_from(number_value(n)?).map_err(|_| FixtureError::Syntax("negative padding".into()))?;
            Literal::Padding(n)
        }
        Rule::boolean => Literal::Bool(pair.as_str() == "true"),
        Rule::number => Literal::Number(number_value(pair)?),
        Rule::float => Literal::Float(
            pair.as_str().parse().map_err(|e| FixtureError::Syntax(format!("float literal {}: {}", pair.as_str(), e)))?,
        ),
        Rule::string => Literal::Str(string_value(pair)),
        _ => Literal::Name(pair.as_str().to_string()),
    })
}

fn string_value(pair: Pair<Rule>) -> String {
    pair.into_inner().next().map_or_else(String::new, |p| p.as_str().to_string())
}

fn number_value(pair: Pair<Rule>) -> Result<i128, FixtureError> {
    let text = pair.as_str();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let value = match digits.strip_prefix("0x") {
        Some(hex) => i128::from_str_radix(hex, 16),
        None => digits.parse::<i128>(),
    }
    .map_err(|e| FixtureError::Syntax(format!("number {}: {}", text, e)))?;
    Ok(if negative { -value } else { value })
}

fn hex_value(case: &str, pair: Pair<Rule>) -> Result<Vec<u8>, FixtureError> {
    let text = pair.into_inner().next().map_or_else(String::new, string_value);
    let digits: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(digits).map_err(|source| FixtureError::InvalidHex { case: case.to_string(), source })
}

/// Run one case with the suite's byte order.
pub fn run_case(byte_order: ByteOrder, case: &Case) -> Result<(), FixtureError> {
    let root = root_type(&case.root)
        .ok_or_else(|| FixtureError::UnknownRoot { case: case.name.clone(), root: case.root.clone() })?;
    let codec = Codec::new(byte_order);
    let decoded = (root.decode)(&codec, &case.raw, &case.args);

    let (tree, decoded) = match (&case.outcome, decoded) {
        (Outcome::Fails(expected), Ok(_)) => {
            return Err(FixtureError::UnexpectedSuccess { case: case.name.clone(), expected: expected.clone() })
        }
        (Outcome::Fails(expected), Err(actual)) => {
            if actual.kind.name() == expected {
                return Ok(());
            }
            return Err(FixtureError::WrongError { case: case.name.clone(), expected: expected.clone(), actual });
        }
        (Outcome::Decodes(_), Err(source)) => return Err(FixtureError::Codec { case: case.name.clone(), source }),
        (Outcome::Decodes(tree), Ok(decoded)) => (tree, decoded),
    };

    let total = case.raw.len() * 8;
    if decoded.consumed_bits != total {
        return Err(FixtureError::Incomplete { case: case.name.clone(), consumed: decoded.consumed_bits, total });
    }
    if let Some(expected) = tree {
        let actual = match decoded.tree.as_slice() {
            [single] => single,
            roots => {
                return Err(FixtureError::TreeMismatch {
                    case: case.name.clone(),
                    path: String::new(),
                    detail: format!("expected one root node, got {}", roots.len()),
                })
            }
        };
        compare(expected, actual, "")
            .map_err(|(path, detail)| FixtureError::TreeMismatch { case: case.name.clone(), path, detail })?;
    }
    let want = case.reserialized.as_ref().unwrap_or(&case.raw);
    if &decoded.reserialized != want {
        return Err(FixtureError::BytesMismatch {
            case: case.name.clone(),
            expected: hex::encode(want),
            actual: hex::encode(&decoded.reserialized),
        });
    }
    Ok(())
}

pub fn run_suite(suite: &Suite) -> Vec<CaseResult> {
    suite
        .cases
        .iter()
        .map(|case| CaseResult {
            suite: suite.name.clone(),
            case: case.name.clone(),
            result: run_case(suite.byte_order, case),
        })
        .collect()
}

fn compare(expected: &Expected, actual: &Node, parent: &str) -> Result<(), (String, String)> {
    let path = if parent.is_empty() { expected.name().to_string() } else { format!("{}/{}", parent, expected.name()) };
    if expected.name() != actual.name() {
        return Err((path, format!("node is named {}", actual.name())));
    }
    match (expected, actual) {
        (Expected::Leaf { value, .. }, Node::Leaf { value: got, .. }) => {
            if value.matches(got) {
                Ok(())
            } else {
                Err((path, format!("expected {}, got {}", value, got)))
            }
        }
        (Expected::Group { children, .. }, Node::Group { children: got, .. }) => {
            let mut rest = got.iter();
            for child in children {
                let found = rest
                    .by_ref()
                    .find(|node| node.name() == child.name())
                    .ok_or_else(|| (format!("{}/{}", path, child.name()), "missing".to_string()))?;
                compare(child, found, &path)?;
            }
            Ok(())
        }
        (Expected::Leaf { .. }, Node::Group { .. }) => Err((path, "expected a field, found a group".into())),
        (Expected::Group { .. }, Node::Leaf { .. }) => Err((path, "expected a group, found a field".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_literals_and_nesting() {
        let suites = parse(
            r#"
            # comment
            suite "s" {
              byte_order: little;
              case "c" {
                root: ModbusPDU;
                args: [true, 0x10, 3];
                raw: "01 02";
                expect: A { x: 0x10; y: -3; z: true; b: hex"beef"; s: "hi"; e: CLASS_0; p: padding(1); G { } }
              }
            }
            "#,
        )
        .expect("parse");
        assert_eq!(suites.len(), 1);
        let suite = &suites[0];
        assert_eq!(suite.byte_order, ByteOrder::LittleEndian);
        let case = &suite.cases[0];
        assert_eq!(case.args, vec![1, 16, 3]);
        assert_eq!(case.raw, vec![1, 2]);
        let Outcome::Decodes(Some(Expected::Group { children, .. })) = &case.outcome else {
            panic!("expected a group");
        };
        let values: Vec<_> = children
            .iter()
            .filter_map(|c| match c {
                Expected::Leaf { value, .. } => Some(value.clone()),
                Expected::Group { .. } => None,
            })
            .collect();
        assert_eq!(
            values,
            vec![
                Literal::Number(16),
                Literal::Number(-3),
                Literal::Bool(true),
                Literal::Bytes(vec![0xbe, 0xef]),
                Literal::Str("hi".into()),
                Literal::Name("CLASS_0".into()),
                Literal::Padding(1),
            ]
        );
    }

    #[test]
    fn subset_comparison_skips_unlisted_fields() {
        let actual = Node::Group {
            name: "M".into(),
            children: vec![
                Node::Leaf { name: "a".into(), value: Value::UInt(1) },
                Node::Leaf { name: "b".into(), value: Value::UInt(2) },
            ],
        };
        let expected = Expected::Group {
            name: "M".into(),
            children: vec![Expected::Leaf { name: "b".into(), value: Literal::Number(2) }],
        };
        assert!(compare(&expected, &actual, "").is_ok());

        let wrong = Expected::Group {
            name: "M".into(),
            children: vec![Expected::Leaf { name: "a".into(), value: Literal::Number(5) }],
        };
        let (path, _) = compare(&wrong, &actual, "").expect_err("mismatch");
        assert_eq!(path, "M/a");
    }

    #[test]
    fn float_literals_match_float_leaves() {
        let suites = parse(
            r#"suite "s" { case "c" { root: M; raw: "00"; expect: M { real: 1.5; lreal: -2.5e3; count: 2; } } }"#,
        )
        .expect("parse");
        let Outcome::Decodes(Some(expected)) = &suites[0].cases[0].outcome else {
            panic!("expected a tree");
        };
        let actual = Node::Group {
            name: "M".into(),
            children: vec![
                Node::Leaf { name: "real".into(), value: Value::Float(1.5) },
                Node::Leaf { name: "lreal".into(), value: Value::Float(-2500.0) },
                Node::Leaf { name: "count".into(), value: Value::UInt(2) },
            ],
        };
        assert!(compare(expected, &actual, "").is_ok());
        assert_eq!(Value::Float(1.5).to_string(), "1.5");
    }

    #[test]
    fn rejects_malformed_source() {
        assert!(matches!(parse("suite { }"), Err(FixtureError::Syntax(_))));
    }
}
