//! Typed s-expressions compiled to SQL expressions.
//!
//! An s-expression is a literal (integer, decimal, string or boolean) or a
//! two-element array `[operation, [operand, ...]]`. Every operand is type
//! checked against the operation's argument list before SQL is produced, so
//! `["add", [3, "hi"]]` is rejected instead of failing inside Postgres.
//!
//! ```
//! use pgcompose_sql::sexp::{SExpr, ValueType, compile};
//! use serde_json::json;
//!
//! let sexp = SExpr::from_json(&json!(["equalTo", [3, ["add", [1, 2]]]])).unwrap();
//! let compiled = compile(&sexp).unwrap();
//! assert_eq!(compiled.expression, "(3) = ((1) + (2))");
//! assert_eq!(compiled.types, [ValueType::Boolean]);
//! ```

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::Value;
use thiserror::Error;

use crate::Lit;

/// The types an s-expression value can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Integer,
    Decimal,
    Boolean,
    Text,
}

impl ValueType {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueType::Integer => "integer",
            ValueType::Decimal => "decimal",
            ValueType::Boolean => "boolean",
            ValueType::Text => "text",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const NUMBERS: &[ValueType] = &[ValueType::Integer, ValueType::Decimal];
const INTEGER: &[ValueType] = &[ValueType::Integer];
const BOOLEAN: &[ValueType] = &[ValueType::Boolean];
const TEXT: &[ValueType] = &[ValueType::Text];
const ANY: &[ValueType] = &[
    ValueType::Integer,
    ValueType::Decimal,
    ValueType::Boolean,
    ValueType::Text,
];

/// A parsed s-expression.
#[derive(Debug, Clone, PartialEq)]
pub enum SExpr {
    Integer(i64),
    Decimal(Decimal),
    Text(String),
    Boolean(bool),
    Apply {
        operation: String,
        operands: Vec<SExpr>,
    },
}

impl SExpr {
    pub fn apply(operation: impl Into<String>, operands: Vec<SExpr>) -> Self {
        SExpr::Apply {
            operation: operation.into(),
            operands,
        }
    }

    /// Read an s-expression from its JSON form.
    pub fn from_json(value: &Value) -> Result<Self, SExprError> {
        match value {
            Value::Bool(b) => Ok(SExpr::Boolean(*b)),
            Value::String(s) => Ok(SExpr::Text(s.clone())),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(SExpr::Integer(i)),
                None => {
                    let text = n.to_string();
                    Decimal::from_str(&text)
                        .or_else(|_| Decimal::from_scientific(&text))
                        .map(SExpr::Decimal)
                        .map_err(|_| SExprError::Malformed(text))
                }
            },
            Value::Array(items) => match items.as_slice() {
                [Value::String(operation), Value::Array(operands)] => Ok(SExpr::Apply {
                    operation: operation.clone(),
                    operands: operands
                        .iter()
                        .map(SExpr::from_json)
                        .collect::<Result<_, _>>()?,
                }),
                _ => Err(SExprError::Malformed(value.to_string())),
            },
            Value::Null | Value::Object(_) => Err(SExprError::Malformed(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SExprError {
    #[error("invalid s-expression: {0}")]
    Malformed(String),

    #[error("unknown operation {0}")]
    UnknownOperation(String),

    #[error("Operation {operation} expects {expected} arguments, but was passed {actual}")]
    Arity {
        operation: String,
        expected: usize,
        actual: usize,
    },

    #[error(
        "Operation {operation} expects one of {allowed} for {argument}, but the value it was given could be a {given}"
    )]
    ArgumentType {
        operation: String,
        argument: &'static str,
        allowed: String,
        given: String,
    },
}

/// One argument of an operation and the types it accepts.
#[derive(Debug)]
pub struct Argument {
    pub name: &'static str,
    pub types: &'static [ValueType],
}

const fn arg(name: &'static str, types: &'static [ValueType]) -> Argument {
    Argument { name, types }
}

const A_B_ANY: &[Argument] = &[arg("a", ANY), arg("b", ANY)];
const A_B_BOOLEAN: &[Argument] = &[arg("a", BOOLEAN), arg("b", BOOLEAN)];
const A_B_TEXT: &[Argument] = &[arg("a", TEXT), arg("b", TEXT)];
const A_B_NUMBERS: &[Argument] = &[arg("a", NUMBERS), arg("b", NUMBERS)];
const VALUE_BOOLEAN: &[Argument] = &[arg("value", BOOLEAN)];
const VALUE_NUMBER: &[Argument] = &[arg("value", NUMBERS)];
const VALUE_IS_NULL: &[Argument] = &[arg("value", ANY), arg("isNull", BOOLEAN)];

#[derive(Debug)]
enum Returns {
    Fixed(&'static [ValueType]),
    /// Integer when every operand can only be an integer, decimal otherwise.
    Arithmetic,
}

/// Where `%` wildcards go around the second operand of a pattern match.
#[derive(Debug, Clone, Copy)]
enum Wildcards {
    None,
    Before,
    After,
    Both,
}

#[derive(Debug)]
enum Template {
    Infix(&'static str),
    Not,
    Call(&'static str),
    IsNull,
    Pattern(&'static str, Wildcards),
}

impl Template {
    fn render(&self, operands: &[String]) -> String {
        match (self, operands) {
            (Template::Infix(op), [a, b]) => format!("{a} {op} {b}"),
            (Template::Not, [value]) => format!("NOT {value}"),
            (Template::Call(name), args) => format!("{name}({})", args.join(", ")),
            (Template::IsNull, [value, is_null]) => format!("({value} IS NULL) = {is_null}"),
            (Template::Pattern(op, wildcards), [a, b]) => {
                let pattern = match wildcards {
                    Wildcards::None => b.clone(),
                    Wildcards::Before => format!("('%' || {b})"),
                    Wildcards::After => format!("({b} || '%')"),
                    Wildcards::Both => format!("('%' || {b} || '%')"),
                };
                format!("{a} {op} {pattern}")
            }
            // arity is checked before rendering
            (_, operands) => operands.join(", "),
        }
    }
}

/// An operation s-expressions can apply.
#[derive(Debug)]
pub struct Operation {
    pub name: &'static str,
    pub description: &'static str,
    pub arguments: &'static [Argument],
    returns: Returns,
    template: Template,
}

const fn op(
    name: &'static str,
    description: &'static str,
    arguments: &'static [Argument],
    returns: Returns,
    template: Template,
) -> Operation {
    Operation {
        name,
        description,
        arguments,
        returns,
        template,
    }
}

const fn comparison(name: &'static str, description: &'static str, sql: &'static str) -> Operation {
    op(name, description, A_B_ANY, Returns::Fixed(BOOLEAN), Template::Infix(sql))
}

const fn pattern(
    name: &'static str,
    description: &'static str,
    sql: &'static str,
    wildcards: Wildcards,
) -> Operation {
    op(
        name,
        description,
        A_B_TEXT,
        Returns::Fixed(BOOLEAN),
        Template::Pattern(sql, wildcards),
    )
}

/// Every operation, by the name s-expressions use.
pub static OPERATIONS: &[Operation] = &[
    op(
        "not",
        "Returns the opposite of the input boolean",
        VALUE_BOOLEAN,
        Returns::Fixed(BOOLEAN),
        Template::Not,
    ),
    op("and", "AND", A_B_BOOLEAN, Returns::Fixed(BOOLEAN), Template::Infix("AND")),
    op("or", "OR", A_B_BOOLEAN, Returns::Fixed(BOOLEAN), Template::Infix("OR")),
    comparison("equalTo", "Whether a and b are equal", "="),
    op(
        "isNull",
        "Whether the value being null matches isNull",
        VALUE_IS_NULL,
        Returns::Fixed(BOOLEAN),
        Template::IsNull,
    ),
    comparison("lessThan", "less than", "<"),
    comparison("lessThanOrEqualTo", "less than or equal to", "<="),
    comparison("greaterThan", "greater than", ">"),
    comparison("greaterThanOrEqualTo", "greater than or equal to", ">="),
    pattern("includes", "includes", "LIKE", Wildcards::Both),
    pattern("includesInsensitive", "includes insensitive", "ILIKE", Wildcards::Both),
    pattern("notIncludes", "not includes", "NOT LIKE", Wildcards::Both),
    pattern("notIncludesInsensitive", "not includes insensitive", "NOT ILIKE", Wildcards::Both),
    pattern("like", "like", "LIKE", Wildcards::None),
    pattern("likeInsensitive", "like insensitive", "ILIKE", Wildcards::None),
    pattern("notLike", "not like", "NOT LIKE", Wildcards::None),
    pattern("notLikeInsensitive", "not like insensitive", "NOT ILIKE", Wildcards::None),
    pattern("startsWith", "starts with", "LIKE", Wildcards::After),
    pattern("startsWithInsensitive", "starts with insensitive", "ILIKE", Wildcards::After),
    pattern("notStartsWith", "not starts with", "NOT LIKE", Wildcards::After),
    pattern("notStartsWithInsensitive", "not starts with insensitive", "NOT ILIKE", Wildcards::After),
    pattern("endsWith", "ends with", "LIKE", Wildcards::Before),
    pattern("endsWithInsensitive", "ends with insensitive", "ILIKE", Wildcards::Before),
    pattern("notEndsWith", "not ends with", "NOT LIKE", Wildcards::Before),
    pattern("notEndsWithInsensitive", "not ends with insensitive", "NOT ILIKE", Wildcards::Before),
    pattern("similarTo", "similar to", "SIMILAR TO", Wildcards::None),
    pattern("notSimilarTo", "not similar to", "NOT SIMILAR TO", Wildcards::None),
    op(
        "floor",
        "Floors the input",
        VALUE_NUMBER,
        Returns::Fixed(INTEGER),
        Template::Call("floor"),
    ),
    op("add", "Adds a and b", A_B_NUMBERS, Returns::Arithmetic, Template::Infix("+")),
];

/// Look up an operation by name.
pub fn operation(name: &str) -> Option<&'static Operation> {
    OPERATIONS.iter().find(|op| op.name == name)
}

/// A compiled s-expression: SQL text and the types it can evaluate to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compiled {
    pub expression: String,
    pub types: Vec<ValueType>,
}

/// Type check `sexp` and compile it to a SQL expression.
///
/// Operands are parenthesized, so the result never depends on operator
/// precedence.
pub fn compile(sexp: &SExpr) -> Result<Compiled, SExprError> {
    let literal = |expression: String, value_type| Compiled {
        expression,
        types: vec![value_type],
    };

    let (name, operands) = match sexp {
        SExpr::Integer(i) => return Ok(literal(i.to_string(), ValueType::Integer)),
        SExpr::Decimal(d) => return Ok(literal(d.to_string(), ValueType::Decimal)),
        SExpr::Text(s) => return Ok(literal(Lit(s).to_string(), ValueType::Text)),
        SExpr::Boolean(b) => {
            let sql = if *b { "TRUE" } else { "FALSE" };
            return Ok(literal(sql.to_string(), ValueType::Boolean));
        }
        SExpr::Apply {
            operation,
            operands,
        } => (operation, operands),
    };

    let operation = self::operation(name).ok_or_else(|| SExprError::UnknownOperation(name.clone()))?;
    if operands.len() != operation.arguments.len() {
        return Err(SExprError::Arity {
            operation: name.clone(),
            expected: operation.arguments.len(),
            actual: operands.len(),
        });
    }

    let compiled = operands.iter().map(compile).collect::<Result<Vec<_>, _>>()?;

    for (operand, argument) in compiled.iter().zip(operation.arguments) {
        let disallowed: Vec<&str> = operand
            .types
            .iter()
            .filter(|t| !argument.types.contains(t))
            .map(|t| t.as_str())
            .collect();
        if !disallowed.is_empty() {
            return Err(SExprError::ArgumentType {
                operation: name.clone(),
                argument: argument.name,
                allowed: join_types(argument.types),
                given: disallowed.join(", "),
            });
        }
    }

    let types = match operation.returns {
        Returns::Fixed(types) => types.to_vec(),
        Returns::Arithmetic => {
            if compiled.iter().all(|c| c.types == INTEGER) {
                INTEGER.to_vec()
            } else {
                vec![ValueType::Decimal]
            }
        }
    };

    let operands: Vec<String> = compiled
        .iter()
        .map(|c| format!("({})", c.expression))
        .collect();

    Ok(Compiled {
        expression: operation.template.render(&operands),
        types,
    })
}

fn join_types(types: &[ValueType]) -> String {
    types.iter().map(|t| t.as_str()).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compile_json(value: Value) -> Result<Compiled, SExprError> {
        compile(&SExpr::from_json(&value)?)
    }

    #[test]
    fn test_adding_integers() {
        let compiled = compile_json(json!(["add", [3, 3]])).unwrap();
        assert_eq!(compiled.expression, "(3) + (3)");
        assert_eq!(compiled.types, [ValueType::Integer]);
    }

    #[test]
    fn test_adding_text_is_rejected() {
        let err = compile_json(json!(["add", [3, "hi"]])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Operation add expects one of integer, decimal for b, but the value it was given could be a text"
        );
    }

    #[test]
    fn test_nested_operands_are_checked() {
        let err = compile_json(json!(["add", [3, ["equalTo", [5, 5]]]])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Operation add expects one of integer, decimal for b, but the value it was given could be a boolean"
        );

        let compiled = compile_json(json!(["equalTo", [3, ["add", [1, 2]]]])).unwrap();
        assert_eq!(compiled.expression, "(3) = ((1) + (2))");
    }

    #[test]
    fn test_arithmetic_return_types() {
        let compiled = compile_json(json!(["add", [3, 3.5]])).unwrap();
        assert_eq!(compiled.types, [ValueType::Decimal]);

        let compiled = compile_json(json!(["add", [3, ["floor", [3.5]]]])).unwrap();
        assert_eq!(compiled.types, [ValueType::Integer]);
        assert_eq!(compiled.expression, "(3) + (floor((3.5)))");
    }

    #[test]
    fn test_patterns_quote_their_operands() {
        let compiled = compile_json(json!(["includesInsensitive", ["it's", "s"]])).unwrap();
        assert_eq!(compiled.expression, "('it''s') ILIKE ('%' || ('s') || '%')");

        let compiled = compile_json(json!(["notStartsWith", ["abc", "a"]])).unwrap();
        assert_eq!(compiled.expression, "('abc') NOT LIKE (('a') || '%')");

        let compiled = compile_json(json!(["similarTo", ["abc", "%(b|d)%"]])).unwrap();
        assert_eq!(compiled.expression, "('abc') SIMILAR TO ('%(b|d)%')");
    }

    #[test]
    fn test_boolean_operations() {
        let compiled = compile_json(json!([
            "and",
            [["not", [false]], ["isNull", ["x", true]]]
        ]))
        .unwrap();
        assert_eq!(
            compiled.expression,
            "(NOT (FALSE)) AND ((('x') IS NULL) = (TRUE))"
        );
        assert_eq!(compiled.types, [ValueType::Boolean]);
    }

    #[test]
    fn test_arity_and_unknown_operations() {
        assert_eq!(
            compile_json(json!(["floor", [1, 2]])).unwrap_err(),
            SExprError::Arity {
                operation: "floor".to_string(),
                expected: 1,
                actual: 2,
            }
        );
        assert_eq!(
            compile_json(json!(["explode", []])).unwrap_err(),
            SExprError::UnknownOperation("explode".to_string())
        );
        assert!(matches!(
            SExpr::from_json(&json!({ "op": "add" })),
            Err(SExprError::Malformed(_))
        ));
        assert!(matches!(
            SExpr::from_json(&json!(["add", 1, 2])),
            Err(SExprError::Malformed(_))
        ));
    }

    #[test]
    fn test_operation_names_are_unique() {
        for (i, a) in OPERATIONS.iter().enumerate() {
            assert!(
                OPERATIONS[i + 1..].iter().all(|b| b.name != a.name),
                "duplicate operation {}",
                a.name
            );
            assert!(!a.description.is_empty());
        }
    }
}
