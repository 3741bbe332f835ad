//! Command resolution (spec §4.4): maps a declared interface method to the
//! statement id and kind it should dispatch through.

use std::collections::{HashSet, VecDeque};

use crate::error::{MapperError, MapperResult};
use crate::statement::StatementKind;

/// `{statement-id, statement-kind}` resolved for one declared method.
#[derive(Debug, Clone)]
pub struct Command {
    /// `None` only for the flush-marker fallback (spec §4.4).
    pub name: Option<String>,
    pub kind: StatementKind,
}

/// Describes the interface graph a command resolver walks: a method's
/// declaring interface and that interface's direct supertypes. Implemented
/// by whatever build-time analysis pass enumerates declared interfaces
/// (spec §9: "a build-time analysis pass that produces a table keyed by a
/// stable method id").
pub trait InterfaceGraph {
    /// Direct supertypes of `interface_fqn`, in a fixed, deterministic order.
    fn supertypes(&self, interface_fqn: &str) -> Vec<String>;
}

/// Looks up a statement id in the external registry.
pub trait StatementLookup {
    fn kind_of(&self, statement_id: &str) -> Option<StatementKind>;
}

/// Resolve the command for `method_name` declared on `interface_fqn`,
/// walking the super-interface graph breadth-first (spec §4.4: "breadth or
/// depth first; must be deterministic") until a hit or the graph is
/// exhausted.
pub fn resolve<G: InterfaceGraph, L: StatementLookup>(
    graph: &G,
    lookup: &L,
    interface_fqn: &str,
    method_name: &str,
    has_flush_marker: bool,
) -> MapperResult<Command> {
    let mut queue: VecDeque<String> = VecDeque::new();
    let mut seen: HashSet<String> = HashSet::new();
    queue.push_back(interface_fqn.to_string());
    seen.insert(interface_fqn.to_string());

    while let Some(iface) = queue.pop_front() {
        let id = format!("{iface}.{method_name}");
        if let Some(kind) = lookup.kind_of(&id) {
            if kind == StatementKind::Unknown {
                return Err(MapperError::evaluation(format!(
                    "statement '{id}' has an unknown statement kind"
                )));
            }
            return Ok(Command { name: Some(id), kind });
        }
        for parent in graph.supertypes(&iface) {
            if seen.insert(parent.clone()) {
                queue.push_back(parent);
            }
        }
    }

    if has_flush_marker {
        return Ok(Command { name: None, kind: StatementKind::Flush });
    }

    Err(MapperError::missing_statement(format!("{interface_fqn}.{method_name}")))
}
