//! The external statement registry (spec §6): compiles and stores
//! [`MappedStatement`]s keyed by statement id, and answers the lookups
//! [`crate::command::resolve`] needs.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::command::StatementLookup;
use crate::error::{MapperError, MapperResult};
use crate::node::SqlNode;
use crate::statement::{MappedStatement, StatementKind};

/// A registry entry: a compiled statement plus its declared kind.
struct Entry {
    kind: StatementKind,
    statement: MappedStatement,
}

/// Minimal in-memory statement registry. Configuration loading (an XML
/// mapper file, an annotation scan, …) is an external collaborator per
/// spec §1; this type exists so the core crate is runnable and testable
/// without depending on one.
#[derive(Default)]
pub struct StatementRegistry {
    entries: RwLock<HashMap<String, Entry>>,
}

impl StatementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `nodes` and register it under `id` with the given `kind`.
    /// Re-registering an id overwrites the previous entry.
    pub fn register(&self, id: impl Into<String>, kind: StatementKind, nodes: SqlNode) -> MapperResult<()> {
        let statement = MappedStatement::compile(nodes)?;
        self.entries
            .write()
            .expect("statement registry lock poisoned")
            .insert(id.into(), Entry { kind, statement });
        Ok(())
    }

    /// Bind the statement registered under `id` against `param`, failing
    /// with `MissingStatement` if no such id is registered.
    pub fn bind(&self, id: &str, param: &serde_json::Value) -> MapperResult<crate::statement::BoundSql> {
        let entries = self.entries.read().expect("statement registry lock poisoned");
        let entry = entries
            .get(id)
            .ok_or_else(|| MapperError::missing_statement(id.to_string()))?;
        entry.statement.bind(param)
    }

    pub fn kind(&self, id: &str) -> Option<StatementKind> {
        self.entries.read().expect("statement registry lock poisoned").get(id).map(|e| e.kind)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.read().expect("statement registry lock poisoned").contains_key(id)
    }
}

impl StatementLookup for StatementRegistry {
    fn kind_of(&self, statement_id: &str) -> Option<StatementKind> {
        self.kind(statement_id)
    }
}
