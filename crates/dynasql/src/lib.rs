//! # dynasql
//!
//! A dynamic-SQL mapping core: a template parser producing an evaluable
//! SQL-node tree, a method-signature analyzer, and a mapper-method
//! dispatcher sitting in front of a session facade.
//!
//! ## Layout
//!
//! - **Tree & evaluation**: [`node`], [`expr`], [`binding`], [`template`].
//! - **Statements**: [`statement`], [`registry`].
//! - **Method analysis & dispatch**: [`signature`], [`command`], [`executor`], [`proxy`].
//! - **External collaborator contract**: [`session`], [`config`].
//! - **Ambient**: [`error`], [`trace`], [`prelude`].
//!
//! ## Minimal magic
//!
//! The core never materializes rows into domain structs and never loads
//! mapper definitions from a file format; both are the session facade's
//! concern. What's here is SQL text generation, parameter binding, and
//! dispatch — the pieces that are safe to unit-test without a database.

pub mod binding;
pub mod command;
pub mod config;
pub mod error;
pub mod executor;
pub mod expr;
pub mod node;
pub mod prelude;
pub mod proxy;
pub mod registry;
pub mod session;
pub mod signature;
pub mod statement;
pub mod template;
pub mod trace;

pub use binding::BindingContext;
pub use command::{Command, InterfaceGraph, StatementLookup};
pub use config::Configuration;
pub use error::{MapperError, MapperResult};
pub use executor::{execute, row_count_result, ExecuteRequest, ExecutedResult, RowCountReturn};
pub use expr::Expr;
pub use node::SqlNode;
pub use proxy::{ExecutorCache, MapperMethodEntry};
pub use registry::StatementRegistry;
pub use session::{Cursor, MapperSession, ResultHandler, RowBounds};
pub use signature::{MethodSignature, ParamRole, ParamSlot, ReturnShape};
pub use statement::{BoundSql, JdbcType, MappedStatement, ParameterRef, StatementKind};
pub use template::{build, parse_fragment, TemplateNode};

#[cfg(feature = "derive")]
pub use dynasql_derive::mapper;
