//! The session facade a mapper method executor dispatches through (spec §6:
//! "Session facade (consumed)"). Modeled on the teacher's `GenericClient`:
//! plain `async fn`s in the trait, no `async-trait` boxing.

use std::collections::HashMap;

use serde_json::Value;

use crate::config::Configuration;
use crate::error::MapperResult;

/// A lazily-iterated sequence of result rows (spec glossary: "Cursor").
/// The core has no row-materialization concern of its own; a session
/// implementation supplies its own stream type behind this trait.
pub trait Cursor: Send {
    fn next_row(&mut self) -> MapperResult<Option<Value>>;
}

/// Callback invoked once per row for the `SELECT` + result-handler dispatch
/// path (spec §4.6).
pub trait ResultHandler: Send {
    fn handle(&mut self, row: Value) -> MapperResult<()>;
}

/// Optional paging descriptor a method may declare a slot for.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowBounds {
    pub offset: u64,
    pub limit: Option<u64>,
}

/// Everything a mapper-method executor needs from the underlying data
/// access layer. Statement resolution, SQL binding, and result coercion all
/// happen in the core; a `MapperSession` implementation is only responsible
/// for actually running SQL and shaping rows into `Value`s.
pub trait MapperSession: Send + Sync {
    fn insert(
        &self,
        statement_id: &str,
        param: &Value,
    ) -> impl std::future::Future<Output = MapperResult<i64>> + Send;

    fn update(
        &self,
        statement_id: &str,
        param: &Value,
    ) -> impl std::future::Future<Output = MapperResult<i64>> + Send;

    fn delete(
        &self,
        statement_id: &str,
        param: &Value,
    ) -> impl std::future::Future<Output = MapperResult<i64>> + Send;

    fn select_one(
        &self,
        statement_id: &str,
        param: &Value,
        bounds: Option<RowBounds>,
    ) -> impl std::future::Future<Output = MapperResult<Option<Value>>> + Send;

    fn select_list(
        &self,
        statement_id: &str,
        param: &Value,
        bounds: Option<RowBounds>,
    ) -> impl std::future::Future<Output = MapperResult<Vec<Value>>> + Send;

    fn select_map(
        &self,
        statement_id: &str,
        param: &Value,
        map_key: &str,
        bounds: Option<RowBounds>,
    ) -> impl std::future::Future<Output = MapperResult<HashMap<String, Value>>> + Send;

    fn select_cursor(
        &self,
        statement_id: &str,
        param: &Value,
        bounds: Option<RowBounds>,
    ) -> impl std::future::Future<Output = MapperResult<Box<dyn Cursor>>> + Send;

    fn select_with_handler(
        &self,
        statement_id: &str,
        param: &Value,
        bounds: Option<RowBounds>,
        handler: &mut dyn ResultHandler,
    ) -> impl std::future::Future<Output = MapperResult<()>> + Send;

    fn flush_statements(&self) -> impl std::future::Future<Output = MapperResult<()>> + Send;

    fn configuration(&self) -> &Configuration;
}
