//! Convenient imports for typical `dynasql` usage.
//!
//! ```ignore
//! use dynasql::prelude::*;
//! ```

// ── Tree & evaluation ───────────────────────────────────────────────────────
pub use crate::binding::BindingContext;
pub use crate::expr::Expr;
pub use crate::node::SqlNode;
pub use crate::template::{build, parse_fragment, TemplateNode};

// ── Statements & registry ───────────────────────────────────────────────────
pub use crate::registry::StatementRegistry;
pub use crate::statement::{BoundSql, JdbcType, MappedStatement, ParameterRef, StatementKind};

// ── Method analysis & dispatch ──────────────────────────────────────────────
pub use crate::command::{resolve as resolve_command, Command, InterfaceGraph, StatementLookup};
pub use crate::executor::{execute, row_count_result, ExecuteRequest, ExecutedResult, RowCountReturn};
pub use crate::proxy::{ExecutorCache, MapperMethodEntry};
pub use crate::signature::{MethodSignature, ParamRole, ParamSlot, ReturnShape};

// ── Session facade contract ─────────────────────────────────────────────────
pub use crate::config::Configuration;
pub use crate::session::{Cursor, MapperSession, ResultHandler, RowBounds};

// ── Errors ───────────────────────────────────────────────────────────────────
pub use crate::error::{MapperError, MapperResult};

// ── Derive macro (feature: derive) ──────────────────────────────────────────
#[cfg(feature = "derive")]
pub use dynasql_derive::mapper;
