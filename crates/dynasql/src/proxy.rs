//! Per-interface executor cache (spec §4.7/§5/§9): the piece the
//! `#[mapper]` macro's generated dispatch glue calls into.
//!
//! Rust has no runtime dynamic-proxy mechanism, so "produce an instance of
//! interface T that routes invocations through a dispatcher" is realized at
//! compile time: `dynasql_derive::mapper` expands a trait definition into a
//! concrete struct whose methods build an [`ExecuteRequest`] and hand it to
//! [`crate::executor::execute`], using this cache to avoid re-resolving the
//! command and re-analyzing the signature on every call.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::command::Command;
use crate::session::MapperSession;
use crate::signature::MethodSignature;

/// Implemented by the concrete type a `#[mapper]`-expanded trait's default
/// method bodies dispatch through: `self.session()` gives access to the
/// [`MapperSession`] every generated body calls (spec §4.7: every method not
/// handled directly by the proxy or by a default body "obtain[s]... the
/// mapper-method executor... and call[s] `execute(session, args)`").
pub trait MapperProxy {
    type Session: MapperSession;

    fn session(&self) -> &Self::Session;
}

/// The cached, build-time-stable pieces of dispatching one declared method:
/// its resolved [`Command`] and analyzed [`MethodSignature`] (spec §9:
/// "Replace reflective walks with a build-time analysis pass that produces
/// a table keyed by a stable method id").
#[derive(Clone)]
pub struct MapperMethodEntry {
    pub command: Arc<Command>,
    pub signature: Arc<MethodSignature>,
}

/// A concurrency-safe, idempotent compute-if-absent cache from method id to
/// its [`MapperMethodEntry`], shared across every proxy instance for one
/// interface (spec §5: "cache population is concurrency-safe and
/// idempotent... a benign double-construction with last-write-wins is
/// acceptable provided published values are equivalent").
#[derive(Default)]
pub struct ExecutorCache {
    entries: RwLock<HashMap<String, MapperMethodEntry>>,
}

impl ExecutorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached entry for `method_id`, computing and inserting it
    /// via `build` if absent. `build` may run more than once under
    /// contention; whichever result is inserted first wins and is what
    /// every caller observes from then on.
    pub fn get_or_build<F>(&self, method_id: &str, build: F) -> MapperMethodEntry
    where
        F: FnOnce() -> MapperMethodEntry,
    {
        if let Some(entry) = self.entries.read().expect("executor cache lock poisoned").get(method_id) {
            return entry.clone();
        }
        let entry = build();
        let mut entries = self.entries.write().expect("executor cache lock poisoned");
        entries.entry(method_id.to_string()).or_insert(entry).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::ReturnShape;
    use crate::statement::StatementKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn caches_across_repeated_lookups() {
        let cache = ExecutorCache::new();
        let calls = AtomicUsize::new(0);
        let build = || {
            calls.fetch_add(1, Ordering::SeqCst);
            MapperMethodEntry {
                command: Arc::new(Command { name: Some("Foo.find".into()), kind: StatementKind::Select }),
                signature: Arc::new(MethodSignature::new("find", ReturnShape::Many, None, vec![]).unwrap()),
            }
        };
        cache.get_or_build("Foo.find", build);
        cache.get_or_build("Foo.find", build);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
