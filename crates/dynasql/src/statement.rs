//! Compiled statement source: wraps a node tree and produces [`BoundSql`].

use std::collections::HashMap;

use serde_json::Value;

use crate::binding::BindingContext;
use crate::error::MapperResult;
use crate::node::SqlNode;

/// Portable JDBC-style type tag a `#{expr, jdbcType=...}` token may declare.
/// Closed set; the distilled spec names the attribute but not its domain, so
/// SPEC_FULL §3 fixes it to the tags actually used by templated-SQL bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JdbcType {
    Varchar,
    Integer,
    BigInt,
    Boolean,
    Timestamp,
    Numeric,
    Other,
}

impl JdbcType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "VARCHAR" => Some(Self::Varchar),
            "INTEGER" => Some(Self::Integer),
            "BIGINT" => Some(Self::BigInt),
            "BOOLEAN" => Some(Self::Boolean),
            "TIMESTAMP" => Some(Self::Timestamp),
            "NUMERIC" => Some(Self::Numeric),
            "OTHER" => Some(Self::Other),
            _ => None,
        }
    }
}

/// One ordered entry in a [`BoundSql`]'s parameter list.
#[derive(Debug, Clone)]
pub struct ParameterRef {
    /// The source expression the value was evaluated from (a binding name,
    /// a `param<k>` alias, or a `<foreach>`-local unique name).
    pub expression: String,
    /// The value resolved at bind time.
    pub value: Value,
    pub jdbc_type: Option<JdbcType>,
    pub handler: Option<String>,
}

/// The product of binding a [`MappedStatement`] against one parameter object:
/// final SQL text, ordered parameters, and any top-level `<bind>` values.
#[derive(Debug, Clone)]
pub struct BoundSql {
    pub sql: String,
    pub parameters: Vec<ParameterRef>,
    pub additional_bindings: HashMap<String, Value>,
}

impl BoundSql {
    /// Number of `?` placeholders in `sql` (spec §8's core invariant: this
    /// must always equal `parameters.len()`).
    pub fn placeholder_count(&self) -> usize {
        self.sql.matches('?').count()
    }
}

/// Kind of a named statement, resolved by [`crate::command::CommandResolver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Insert,
    Update,
    Delete,
    Select,
    Flush,
    Unknown,
}

/// Wraps a node tree; binds it against a parameter object on each
/// invocation. A *static* source — no dynamic constructs *and* no `#{…}`
/// parameter anywhere (spec §3) — binds once at construction time and
/// reuses the result for every call, since nothing in such a tree can ever
/// differ between calls. A tree that is merely non-dynamic but still holds
/// a `#{…}` (e.g. `SELECT * FROM t WHERE id = #{id}`) always re-evaluates:
/// its SQL text never changes, but each `#{…}`'s *value* is resolved fresh
/// from whatever parameter object the caller passes, so caching a single
/// `BoundSql` would freeze every parameter at whatever value the tree
/// happened to evaluate to when it was compiled.
pub struct MappedStatement {
    nodes: SqlNode,
    is_dynamic: bool,
    static_bound: Option<BoundSql>,
}

impl MappedStatement {
    /// Compile a node tree. Only when the tree has no dynamic constructs and
    /// no `#{…}` parameter at all can it be evaluated once now and the
    /// result reused for every call; otherwise `bind()` evaluates per call.
    pub fn compile(nodes: SqlNode) -> MapperResult<Self> {
        let is_dynamic = nodes.is_dynamic();
        let static_bound = if is_dynamic || nodes.contains_parameter() {
            None
        } else {
            Some(Self::evaluate(&nodes, &Value::Null)?)
        };
        Ok(Self {
            nodes,
            is_dynamic,
            static_bound,
        })
    }

    pub fn is_dynamic(&self) -> bool {
        self.is_dynamic
    }

    /// Bind this statement's tree against `param`, producing the final SQL
    /// and parameter list. Only a tree with nothing call-dependent to
    /// resolve (see [`Self::compile`]) reuses a cached result; every other
    /// tree — dynamic or not — re-evaluates against `param` on every call
    /// (spec §8: "two evaluations of the same compiled tree... produce
    /// equal BoundSql" holds either way, since re-evaluating with the same
    /// `param` is deterministic).
    pub fn bind(&self, param: &Value) -> MapperResult<BoundSql> {
        match &self.static_bound {
            Some(bound) => Ok(bound.clone()),
            None => Self::evaluate(&self.nodes, param),
        }
    }

    fn evaluate(nodes: &SqlNode, param: &Value) -> MapperResult<BoundSql> {
        let mut ctx = BindingContext::new(param);
        ctx.eval(nodes)?;
        let (sql, parameters, additional_bindings) = ctx.finish();
        Ok(BoundSql {
            sql,
            parameters,
            additional_bindings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::parse_fragment;

    #[test]
    fn nondynamic_statement_with_parameter_rebinds_value_per_call() {
        let (nodes, is_dynamic) = parse_fragment("SELECT * FROM t WHERE id = #{id}").unwrap();
        assert!(!is_dynamic);
        let statement = MappedStatement::compile(nodes).unwrap();

        let first = statement.bind(&serde_json::json!({"id": 7})).unwrap();
        assert_eq!(first.sql, "SELECT * FROM t WHERE id = ?");
        assert_eq!(first.parameters[0].value, Value::from(7));

        let second = statement.bind(&serde_json::json!({"id": 42})).unwrap();
        assert_eq!(second.parameters[0].value, Value::from(42));
    }

    #[test]
    fn parameter_free_statement_is_cached_across_calls() {
        let (nodes, is_dynamic) = parse_fragment("SELECT 1").unwrap();
        assert!(!is_dynamic);
        let statement = MappedStatement::compile(nodes).unwrap();
        let a = statement.bind(&serde_json::json!({"anything": true})).unwrap();
        let b = statement.bind(&Value::Null).unwrap();
        assert_eq!(a.sql, b.sql);
        assert_eq!(a.sql, "SELECT 1");
    }
}
