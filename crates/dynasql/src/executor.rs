//! The mapper-method executor (spec §4.6): dispatches one resolved
//! [`Command`] plus a converted parameter object to exactly one
//! [`MapperSession`] call, coercing the result to the method's declared
//! shape.

use std::collections::HashMap;

use serde_json::Value;

use crate::command::Command;
use crate::error::{MapperError, MapperResult};
use crate::session::{MapperSession, ResultHandler, RowBounds};
use crate::signature::{MethodSignature, ReturnShape};
use crate::statement::StatementKind;

/// What a DML method's return type coerces a row count into (spec §4.6's
/// `row-count-result`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowCountReturn {
    Void,
    I32,
    I64,
    Bool,
}

/// `row-count-result(n)`: a pure function of `(n, return-type)` (spec §8's
/// law). Lives standalone so it can be unit-tested without a session.
pub fn row_count_result(n: i64, target: RowCountReturn) -> MapperResult<Value> {
    match target {
        RowCountReturn::Void => Ok(Value::Null),
        RowCountReturn::I32 | RowCountReturn::I64 => Ok(Value::from(n)),
        RowCountReturn::Bool => Ok(Value::Bool(n > 0)),
    }
}

/// The result of one executed mapper method call.
pub enum ExecutedResult {
    Void,
    Scalar(Value),
    Many(Vec<Value>),
    Map(HashMap<String, Value>),
    Cursor(Box<dyn crate::session::Cursor>),
}

impl std::fmt::Debug for ExecutedResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutedResult::Void => write!(f, "Void"),
            ExecutedResult::Scalar(v) => f.debug_tuple("Scalar").field(v).finish(),
            ExecutedResult::Many(v) => f.debug_tuple("Many").field(v).finish(),
            ExecutedResult::Map(v) => f.debug_tuple("Map").field(v).finish(),
            ExecutedResult::Cursor(_) => write!(f, "Cursor(..)"),
        }
    }
}

/// Arguments needed to execute one resolved command (spec §4.6's `execute`).
pub struct ExecuteRequest<'a> {
    pub command: &'a Command,
    pub signature: &'a MethodSignature,
    pub param: &'a Value,
    pub row_count_return: RowCountReturn,
    pub bounds: Option<RowBounds>,
    pub result_handler: Option<&'a mut dyn ResultHandler>,
}

/// Dispatch one call through `session` per spec §4.6's table.
pub async fn execute<S: MapperSession>(session: &S, req: ExecuteRequest<'_>) -> MapperResult<ExecutedResult> {
    let ExecuteRequest { command, signature, param, row_count_return, bounds, result_handler } = req;

    let Some(statement_id) = &command.name else {
        if command.kind == StatementKind::Flush {
            session.flush_statements().await?;
            return Ok(ExecutedResult::Void);
        }
        return Err(MapperError::evaluation("command has no statement id and is not a flush"));
    };

    match command.kind {
        StatementKind::Insert => {
            let n = session.insert(statement_id, param).await?;
            Ok(ExecutedResult::Scalar(row_count_result(n, row_count_return)?))
        }
        StatementKind::Update => {
            let n = session.update(statement_id, param).await?;
            Ok(ExecutedResult::Scalar(row_count_result(n, row_count_return)?))
        }
        StatementKind::Delete => {
            let n = session.delete(statement_id, param).await?;
            Ok(ExecutedResult::Scalar(row_count_result(n, row_count_return)?))
        }
        StatementKind::Flush => {
            session.flush_statements().await?;
            Ok(ExecutedResult::Void)
        }
        StatementKind::Select => execute_select(session, statement_id, signature, param, bounds, result_handler).await,
        StatementKind::Unknown => {
            Err(MapperError::evaluation(format!("statement '{statement_id}' has an unknown statement kind")))
        }
    }
}

async fn execute_select<S: MapperSession>(
    session: &S,
    statement_id: &str,
    signature: &MethodSignature,
    param: &Value,
    bounds: Option<RowBounds>,
    result_handler: Option<&mut dyn ResultHandler>,
) -> MapperResult<ExecutedResult> {
    match signature.return_shape {
        ReturnShape::Void if signature.has_result_handler_slot() => {
            let handler = result_handler
                .ok_or_else(|| MapperError::build(format!("method '{}' declares a result-handler slot but none was supplied", signature.name)))?;
            session.select_with_handler(statement_id, param, bounds, handler).await?;
            Ok(ExecutedResult::Void)
        }
        ReturnShape::Many => {
            let rows = session.select_list(statement_id, param, bounds).await?;
            Ok(ExecutedResult::Many(rows))
        }
        ReturnShape::Map => {
            let key = signature
                .map_key
                .as_deref()
                .ok_or_else(|| MapperError::build(format!("method '{}' returns a map but declares no map-key", signature.name)))?;
            let map = session.select_map(statement_id, param, key, bounds).await?;
            Ok(ExecutedResult::Map(map))
        }
        ReturnShape::Cursor => {
            let cursor = session.select_cursor(statement_id, param, bounds).await?;
            Ok(ExecutedResult::Cursor(cursor))
        }
        ReturnShape::Void => {
            session.select_one(statement_id, param, bounds).await?;
            Ok(ExecutedResult::Void)
        }
        ReturnShape::Scalar | ReturnShape::Optional => {
            let row = session.select_one(statement_id, param, bounds).await?;
            match row {
                Some(value) => Ok(ExecutedResult::Scalar(value)),
                None if signature.return_shape == ReturnShape::Optional => Ok(ExecutedResult::Scalar(Value::Null)),
                None => Err(MapperError::unsupported_return_type(format!(
                    "method '{}' returned null for a non-optional scalar return",
                    signature.name
                ))),
            }
        }
    }
}
