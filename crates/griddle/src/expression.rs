//! Textual rendering of filter trees.
//!
//! Backends that evaluate filters themselves (a query builder, a remote
//! store) take the filter as predicate text with positional parameters:
//!
//! ```text
//! (lower(name).contains(@0) and age >= @1)
//! ```
//!
//! Operands are never spliced into the text. Each leaf binds `@N`, where `N`
//! is its position in [`FilterNode::leaves`], and `params[N]` holds the
//! operand. Leaves that bind nothing keep their slot with a null parameter so
//! the indices stay aligned.

use crate::error::Result;
use crate::filter::{FilterNode, Logic};
use crate::predicate::{rewrite_condition, Rewrite};
use crate::resolver::FieldResolver;
use crate::value::Scalar;

/// Predicate text plus its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    /// The predicate text.
    pub text: String,
    /// Parameters referenced as `@0`, `@1`, ...
    pub params: Vec<Scalar>,
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

impl FilterNode {
    /// Renders this tree as predicate text.
    ///
    /// Fields are resolved and operators rewritten exactly as
    /// [`compile`](crate::compile) does, so the same requests fail with the
    /// same errors. Field names appear in their canonical spelling.
    pub fn to_expression<T, R>(&self, resolver: &R) -> Result<Expression>
    where
        R: FieldResolver<T> + ?Sized,
    {
        let mut out = Expression {
            text: String::new(),
            params: Vec::new(),
        };
        render(self, resolver, &mut out)?;
        Ok(out)
    }
}

fn render<T, R>(node: &FilterNode, resolver: &R, out: &mut Expression) -> Result<()>
where
    R: FieldResolver<T> + ?Sized,
{
    match node {
        FilterNode::Composite { children, .. } if children.is_empty() => {
            out.text.push_str("true");
        }
        FilterNode::Composite { logic, children } => {
            let joiner = match logic {
                Logic::And => " and ",
                Logic::Or => " or ",
            };
            out.text.push('(');
            for (i, child) in children.iter().enumerate() {
                if i > 0 {
                    out.text.push_str(joiner);
                }
                render(child, resolver, out)?;
            }
            out.text.push(')');
        }
        FilterNode::Leaf(condition) => {
            let accessor = resolver.resolve(&condition.field)?;
            let field = accessor.name();
            let slot = out.params.len();
            let (text, param) = match rewrite_condition(condition, accessor.kind())? {
                Rewrite::Compare(operator, Scalar::Null) => {
                    let symbol = operator.symbol().unwrap_or("=");
                    (format!("{field} {symbol} null"), Scalar::Null)
                }
                Rewrite::Compare(operator, operand) => {
                    let symbol = operator.symbol().unwrap_or("=");
                    (format!("{field} {symbol} @{slot}"), operand)
                }
                Rewrite::Text(operator, needle) => {
                    let call = text_call(operator.as_str(), slot);
                    let text = if operator.is_negated() {
                        format!("!lower({field}){call}")
                    } else {
                        format!("lower({field}){call}")
                    };
                    (text, Scalar::String(needle))
                }
                Rewrite::TextOf(operator, needle) => {
                    let call = text_call(operator.as_str(), slot);
                    let text = if operator.is_negated() {
                        format!("({field} != null && !lower(to_string({field})){call})")
                    } else {
                        format!("lower(to_string({field})){call}")
                    };
                    (text, Scalar::String(needle))
                }
                Rewrite::Empty { or_null, negate } => {
                    let test = if or_null {
                        format!("{field} = null || {field} = \"\"")
                    } else {
                        format!("{field} = \"\"")
                    };
                    let text = match (negate, or_null) {
                        (true, _) => format!("!({test})"),
                        (false, true) => format!("({test})"),
                        (false, false) => test,
                    };
                    (text, Scalar::Null)
                }
            };
            out.text.push_str(&text);
            out.params.push(param);
        }
    }
    Ok(())
}

fn text_call(operator: &str, slot: usize) -> String {
    let method = match operator {
        "startswith" => "startsWith",
        "endswith" => "endsWith",
        _ => "contains",
    };
    format!(".{method}(@{slot})")
}
