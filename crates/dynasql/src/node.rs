//! The immutable SQL-node tree (spec §3) and its evaluation rules (spec §4.3).

use serde_json::Value;

use crate::binding::BindingContext;
use crate::error::{MapperError, MapperResult};
use crate::expr::{display_value, Expr};
use crate::statement::JdbcType;

/// One node of a parsed SQL template. Immutable once built; see
/// [`crate::template::parse_fragment`] for how a tree is produced.
#[derive(Debug, Clone)]
pub enum SqlNode {
    /// Literal text, already fully resolved at parse time.
    StaticText(String),
    /// Text containing `${name}` tokens, resolved by substitution at call time.
    TextWithSubstitution(String),
    /// Originates from a `#{expr}` token: emits one driver placeholder and
    /// one parameter-list entry.
    Parameter {
        expression: String,
        jdbc_type: Option<JdbcType>,
        handler: Option<String>,
    },
    /// Ordered composition of children.
    Mixed(Vec<SqlNode>),
    /// Applies `child` iff `test` evaluates truthy.
    If { test: String, child: Box<SqlNode> },
    /// Applies the first truthy `when`, else `otherwise`, else nothing.
    Choose {
        whens: Vec<(String, SqlNode)>,
        otherwise: Option<Box<SqlNode>>,
    },
    /// `WHERE` wrapper: strips a leading `AND `/`OR `, prepends `WHERE ` if
    /// non-empty after trimming.
    Where(Box<SqlNode>),
    /// `SET` wrapper: prepends `SET `, strips a trailing comma.
    Set(Box<SqlNode>),
    /// Generalized `trim` that `Where`/`Set` are special cases of.
    Trim {
        child: Box<SqlNode>,
        prefix: Option<String>,
        prefix_overrides: Vec<String>,
        suffix: Option<String>,
        suffix_overrides: Vec<String>,
    },
    /// Iterates a resolved collection/array, applying `child` once per
    /// element with `item`/`index` bound.
    ForEach {
        child: Box<SqlNode>,
        collection: String,
        item: Option<String>,
        index: Option<String>,
        open: Option<String>,
        close: Option<String>,
        separator: Option<String>,
    },
    /// Evaluates `expression` and binds its result under `name`.
    VarDecl { name: String, expression: String },
}

impl SqlNode {
    /// Does this subtree contain anything beyond `StaticText`/`Parameter`?
    /// Spec §3: a statement is `is-dynamic` iff this is true anywhere, or a
    /// `TextWithSubstitution` appears.
    pub fn is_dynamic(&self) -> bool {
        match self {
            SqlNode::StaticText(_) | SqlNode::Parameter { .. } => false,
            SqlNode::Mixed(children) => children.iter().any(SqlNode::is_dynamic),
            _ => true,
        }
    }

    /// Does this subtree contain a `Parameter` node anywhere? A tree can be
    /// `is_dynamic() == false` (only `StaticText`/`Parameter`) while still
    /// holding a `#{…}` whose *value* depends on the caller's parameter
    /// object — `is_dynamic` only tells you the emitted SQL *text* is
    /// call-independent, not that every value in the resulting `BoundSql` is.
    /// [`crate::statement::MappedStatement::compile`] uses this to decide
    /// whether a non-dynamic tree's `BoundSql` is actually safe to cache
    /// wholesale, versus only its SQL text.
    pub fn contains_parameter(&self) -> bool {
        match self {
            SqlNode::Parameter { .. } => true,
            SqlNode::StaticText(_) | SqlNode::TextWithSubstitution(_) | SqlNode::VarDecl { .. } => false,
            SqlNode::Mixed(children) => children.iter().any(SqlNode::contains_parameter),
            SqlNode::If { child, .. } => child.contains_parameter(),
            SqlNode::Choose { whens, otherwise } => {
                whens.iter().any(|(_, c)| c.contains_parameter())
                    || otherwise.as_ref().is_some_and(|c| c.contains_parameter())
            }
            SqlNode::Where(child) | SqlNode::Set(child) | SqlNode::Trim { child, .. } => {
                child.contains_parameter()
            }
            SqlNode::ForEach { child, .. } => child.contains_parameter(),
        }
    }

    /// Depth-first, left-to-right evaluation into `ctx` (spec §4.3).
    pub fn apply(&self, ctx: &mut BindingContext) -> MapperResult<()> {
        match self {
            SqlNode::StaticText(text) => {
                ctx.append(text);
                Ok(())
            }
            SqlNode::TextWithSubstitution(template) => {
                apply_substitution(template, ctx)
            }
            SqlNode::Parameter {
                expression,
                jdbc_type,
                handler,
            } => {
                let value = Expr::parse(expression)?.eval(ctx)?;
                ctx.push_param(expression.clone(), value, *jdbc_type, handler.clone());
                Ok(())
            }
            SqlNode::Mixed(children) => {
                for child in children {
                    child.apply(ctx)?;
                }
                Ok(())
            }
            SqlNode::If { test, child } => {
                if Expr::parse(test)?.eval_truthy(ctx)? {
                    child.apply(ctx)?;
                }
                Ok(())
            }
            SqlNode::Choose { whens, otherwise } => {
                for (test, child) in whens {
                    if Expr::parse(test)?.eval_truthy(ctx)? {
                        return child.apply(ctx);
                    }
                }
                if let Some(otherwise) = otherwise {
                    otherwise.apply(ctx)?;
                }
                Ok(())
            }
            SqlNode::Where(child) => {
                let text = ctx.capture(|ctx| child.apply(ctx))?;
                let trimmed = trim_where(&text);
                ctx.append(&trimmed);
                Ok(())
            }
            SqlNode::Set(child) => {
                let text = ctx.capture(|ctx| child.apply(ctx))?;
                let trimmed = trim_set(&text);
                ctx.append(&trimmed);
                Ok(())
            }
            SqlNode::Trim {
                child,
                prefix,
                prefix_overrides,
                suffix,
                suffix_overrides,
            } => {
                let text = ctx.capture(|ctx| child.apply(ctx))?;
                let trimmed = apply_trim(&text, prefix.as_deref(), prefix_overrides, suffix.as_deref(), suffix_overrides);
                ctx.append(&trimmed);
                Ok(())
            }
            SqlNode::ForEach {
                child,
                collection,
                item,
                index,
                open,
                close,
                separator,
            } => apply_foreach(ctx, child, collection, item.as_deref(), index.as_deref(), open.as_deref(), close.as_deref(), separator.as_deref()),
            SqlNode::VarDecl { name, expression } => {
                let value = Expr::parse(expression)?.eval(ctx)?;
                ctx.bind(name.clone(), value);
                Ok(())
            }
        }
    }
}

fn apply_substitution(template: &str, ctx: &mut BindingContext) -> MapperResult<()> {
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        ctx.append(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            return Err(MapperError::build(format!(
                "unterminated '${{' substitution in '{template}'"
            )));
        };
        let expr_src = &after[..end];
        let value = Expr::parse(expr_src)?.eval(ctx)?;
        ctx.append(&display_value(&value));
        rest = &after[end + 1..];
    }
    ctx.append(rest);
    Ok(())
}

/// Does `s` start with `AND `/`OR ` (case-insensitive, optional leading
/// whitespace)? Returns the byte length of the matched prefix, if any.
fn leading_and_or_len(s: &str) -> Option<usize> {
    let stripped_ws = s.len() - s.trim_start().len();
    let body = &s[stripped_ws..];
    for kw in ["AND ", "OR "] {
        if body.len() >= kw.len() && body[..kw.len()].eq_ignore_ascii_case(kw) {
            return Some(stripped_ws + kw.len());
        }
    }
    None
}

fn trim_where(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let body = match leading_and_or_len(trimmed) {
        Some(len) => trimmed[len..].trim_start(),
        None => trimmed,
    };
    if body.is_empty() {
        String::new()
    } else {
        format!("WHERE {body}")
    }
}

fn trim_set(text: &str) -> String {
    let trimmed = text.trim();
    let trimmed = trimmed.strip_suffix(',').unwrap_or(trimmed).trim_end();
    let trimmed = trimmed.trim_start();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("SET {trimmed}")
    }
}

fn apply_trim(
    text: &str,
    prefix: Option<&str>,
    prefix_overrides: &[String],
    suffix: Option<&str>,
    suffix_overrides: &[String],
) -> String {
    let mut body = text.trim();
    for over in prefix_overrides {
        if body.len() >= over.len() && body[..over.len()].eq_ignore_ascii_case(over) {
            body = body[over.len()..].trim_start();
            break;
        }
    }
    for over in suffix_overrides {
        if body.len() >= over.len() && body[body.len() - over.len()..].eq_ignore_ascii_case(over) {
            body = body[..body.len() - over.len()].trim_end();
            break;
        }
    }
    if body.is_empty() {
        return String::new();
    }
    let mut out = String::new();
    if let Some(prefix) = prefix {
        out.push_str(prefix);
    }
    out.push_str(body);
    if let Some(suffix) = suffix {
        out.push_str(suffix);
    }
    out
}

#[allow(clippy::too_many_arguments)]
fn apply_foreach(
    ctx: &mut BindingContext,
    child: &SqlNode,
    collection: &str,
    item: Option<&str>,
    index: Option<&str>,
    open: Option<&str>,
    close: Option<&str>,
    separator: Option<&str>,
) -> MapperResult<()> {
    if collection.trim().is_empty() {
        return Err(MapperError::build("<foreach> requires a 'collection' attribute"));
    }
    let collection_value = Expr::parse(collection)?.eval(ctx)?;
    let entries = match &collection_value {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (Value::from(i as i64), v.clone()))
            .collect::<Vec<_>>(),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| (Value::String(k.clone()), v.clone()))
            .collect::<Vec<_>>(),
        Value::Null => {
            return Err(MapperError::build(format!(
                "<foreach collection=\"{collection}\"> resolved to null"
            )));
        }
        other => {
            return Err(MapperError::build(format!(
                "<foreach collection=\"{collection}\"> must resolve to an array or object, got {other:?}"
            )));
        }
    };

    if let Some(open) = open {
        ctx.append(open);
    }

    let item_name = item.unwrap_or("item");
    for (n, (key, value)) in entries.iter().enumerate() {
        if n > 0 {
            if let Some(sep) = separator {
                ctx.append(sep);
            }
        }
        let mut child_ctx = ctx.child();
        child_ctx.bind(item_name, value.clone());
        if let Some(index_name) = index {
            child_ctx.bind(index_name, key.clone());
        }
        let item_name_owned = item_name.to_string();
        child_ctx.with_param_rename(
            |c| child.apply(c),
            move |unique| format!("__frch_{item_name_owned}_{unique}"),
        )?;
        ctx.absorb(child_ctx);
    }

    if let Some(close) = close {
        ctx.append(close);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_dynamic_excludes_parameter_but_contains_parameter_includes_it() {
        let node = SqlNode::Mixed(vec![
            SqlNode::StaticText("SELECT * FROM t WHERE id = ".into()),
            SqlNode::Parameter { expression: "id".into(), jdbc_type: None, handler: None },
        ]);
        assert!(!node.is_dynamic());
        assert!(node.contains_parameter());
    }

    #[test]
    fn contains_parameter_is_false_for_pure_literal_text() {
        let node = SqlNode::Mixed(vec![SqlNode::StaticText("SELECT 1".into())]);
        assert!(!node.is_dynamic());
        assert!(!node.contains_parameter());
    }

    #[test]
    fn contains_parameter_sees_through_where_and_if() {
        let node = SqlNode::Where(Box::new(SqlNode::If {
            test: "flag".into(),
            child: Box::new(SqlNode::Parameter { expression: "x".into(), jdbc_type: None, handler: None }),
        }));
        assert!(node.is_dynamic());
        assert!(node.contains_parameter());
    }
}
