//! Optional `tracing`-based observability (feature `tracing`), modeled on
//! the teacher's `TracingSqlHook`: emits the SQL about to be dispatched, at
//! debug level, truncated past a configurable length.

use crate::statement::BoundSql;

/// Truncate `sql` to at most `max_len` characters, on a char boundary.
fn truncate_sql(sql: &str, max_len: usize) -> String {
    if sql.chars().count() <= max_len {
        return sql.to_string();
    }
    format!("{}...", sql.chars().take(max_len).collect::<String>())
}

/// Emit a `dynasql.sql` tracing event for one bound statement about to be
/// dispatched through a [`crate::session::MapperSession`] call. A no-op
/// unless `config.trace_evaluation` is set and the `tracing` feature is
/// enabled.
pub fn trace_bound_sql(statement_id: &str, bound: &BoundSql, enabled: bool) {
    if !enabled {
        return;
    }
    #[cfg(feature = "tracing")]
    {
        let sql = truncate_sql(&bound.sql, 200);
        tracing::debug!(
            target: "dynasql.sql",
            statement_id,
            param_count = bound.parameters.len(),
            sql = %sql,
        );
    }
    #[cfg(not(feature = "tracing"))]
    {
        let _ = (statement_id, bound);
    }
}
