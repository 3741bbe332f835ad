//! Scoped value environment used while evaluating a SQL-node tree.

use std::cell::Cell;
use std::collections::HashMap;

use serde_json::Value;

use crate::error::MapperResult;
use crate::node::SqlNode;
use crate::statement::{JdbcType, ParameterRef};

/// One driver placeholder's pending metadata, in the order it was appended.
///
/// `source` carries the raw expression the placeholder was derived from; by
/// the time [`BindingContext::finish`] is called this has been resolved into
/// a [`ParameterRef`] together with its bound value.
#[derive(Debug, Clone)]
struct PendingParam {
    expression: String,
    value: Value,
    jdbc_type: Option<JdbcType>,
    handler: Option<String>,
}

/// The scoped environment a [`SqlNode`] tree evaluates against.
///
/// `bindings` holds names introduced by `<bind>` and `<foreach>` (searched
/// first); anything not found there falls back to a property path on `root`,
/// the caller-supplied parameter object. `builder` accumulates the final SQL
/// text and `parameters` accumulates one entry per driver placeholder, in
/// the exact order they are appended to `builder` (spec §3's invariant).
pub struct BindingContext<'r> {
    root: &'r Value,
    bindings: HashMap<String, Value>,
    builder: String,
    parameters: Vec<PendingParam>,
    unique_counter: Cell<u64>,
}

impl<'r> BindingContext<'r> {
    /// Create a fresh top-level context over the caller's parameter object.
    pub fn new(root: &'r Value) -> Self {
        Self {
            root,
            bindings: HashMap::new(),
            builder: String::new(),
            parameters: Vec::new(),
            unique_counter: Cell::new(0),
        }
    }

    /// The root parameter object, as passed to `bind()`/`resolve()` calls.
    pub fn root(&self) -> &Value {
        self.root
    }

    /// Look up `name` in local bindings first, else as a top-level field of
    /// the root parameter object (spec §4.2: "Names resolve against the
    /// binding context first, then property paths on the root parameter
    /// object").
    pub fn resolve_name(&self, name: &str) -> Option<Value> {
        if let Some(v) = self.bindings.get(name) {
            return Some(v.clone());
        }
        match self.root {
            Value::Object(map) => map.get(name).cloned(),
            _ if name == "_root" => Some(self.root.clone()),
            _ => None,
        }
    }

    /// Declare or overwrite a local binding (`<bind>`, `<foreach>` item/index).
    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    /// A child context that inherits this context's bindings by value but
    /// evaluates into its own text buffer and parameter list; used by
    /// `<foreach>` so each iteration's `item`/`index` don't leak to siblings.
    pub fn child(&self) -> BindingContext<'r> {
        BindingContext {
            root: self.root,
            bindings: self.bindings.clone(),
            builder: String::new(),
            parameters: Vec::new(),
            unique_counter: Cell::new(self.unique_counter.get()),
        }
    }

    /// Append literal text to the builder.
    pub fn append(&mut self, text: &str) {
        self.builder.push_str(text);
    }

    /// Emit a single driver placeholder plus its parameter entry.
    pub fn push_param(
        &mut self,
        expression: impl Into<String>,
        value: Value,
        jdbc_type: Option<JdbcType>,
        handler: Option<String>,
    ) {
        self.builder.push('?');
        self.parameters.push(PendingParam {
            expression: expression.into(),
            value,
            jdbc_type,
            handler,
        });
    }

    /// Next collision-free suffix for names produced inside `<foreach>`
    /// expansions (spec §3's `unique-counter`).
    pub fn next_unique(&self) -> u64 {
        let n = self.unique_counter.get();
        self.unique_counter.set(n + 1);
        n
    }

    /// Run `f`, capturing everything it appends to the builder as a
    /// standalone string and rolling the builder back to its prior length.
    /// Parameters `f` pushes are *not* rolled back — they stay in this
    /// context's parameter list in order, ready for the caller to merge the
    /// (possibly rewritten) text back in. This is the "sub-buffer with its
    /// own placeholder-count watermark" evaluation spec §4.3 describes for
    /// `<where>`/`<set>`/`<trim>`.
    pub fn capture<F>(&mut self, f: F) -> MapperResult<String>
    where
        F: FnOnce(&mut Self) -> MapperResult<()>,
    {
        let watermark = self.builder.len();
        f(self)?;
        let captured = self.builder.split_off(watermark);
        Ok(captured)
    }

    /// Run `f`, then rename every parameter it pushed (tracked by a
    /// watermark over `parameters.len()`) using `rename(unique_counter)`,
    /// where the counter is this context's collision-free `unique-counter`
    /// (spec §3), advanced once per renamed parameter. Used by `<foreach>`
    /// to give each iteration's placeholders distinct tracking names
    /// without changing the emitted `?` placeholders or bound values.
    pub fn with_param_rename<F>(&mut self, f: F, rename: impl Fn(u64) -> String) -> MapperResult<()>
    where
        F: FnOnce(&mut Self) -> MapperResult<()>,
    {
        let watermark = self.parameters.len();
        f(self)?;
        for p in self.parameters[watermark..].iter_mut() {
            p.expression = rename(self.unique_counter.get());
            self.unique_counter.set(self.unique_counter.get() + 1);
        }
        Ok(())
    }

    /// Fold a child context's captured output and parameters back into this
    /// context, in place, preserving append order.
    pub fn absorb(&mut self, mut child: BindingContext<'r>) {
        self.builder.push_str(&child.builder);
        self.parameters.append(&mut child.parameters);
        self.unique_counter.set(child.unique_counter.get());
    }

    /// Consume the context, producing the final SQL text, parameter list,
    /// and every binding introduced via `<bind>`/`<foreach>` (spec §3's
    /// `BoundSql.additional-bindings`).
    pub fn finish(self) -> (String, Vec<ParameterRef>, HashMap<String, Value>) {
        let params = self
            .parameters
            .into_iter()
            .map(|p| ParameterRef {
                expression: p.expression,
                value: p.value,
                jdbc_type: p.jdbc_type,
                handler: p.handler,
            })
            .collect();
        (self.builder, params, self.bindings)
    }

    /// Evaluate `node` against this context, the normal entry point used by
    /// [`crate::statement::MappedStatement::bind`].
    pub fn eval(&mut self, node: &SqlNode) -> MapperResult<()> {
        node.apply(self)
    }
}
