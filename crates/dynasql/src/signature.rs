//! Method-signature analysis (spec §4.5): turns one declared interface
//! method into a reusable description of its return shape and how to turn
//! call-site arguments into a bound parameter object.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::{MapperError, MapperResult};

/// How a method's return type should be handled by the executor (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnShape {
    Void,
    Scalar,
    Optional,
    Many,
    Map,
    Cursor,
}

/// One declared parameter slot, in declaration order.
#[derive(Debug, Clone)]
pub struct ParamSlot {
    /// Explicit `@Param`-style annotation name, if any.
    pub annotated_name: Option<String>,
    /// The parameter's name as written in the method signature, if known.
    pub declared_name: Option<String>,
    pub role: ParamRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamRole {
    /// Participates in SQL binding under its resolved name.
    Domain,
    /// The paging descriptor (spec §4.5/4.6); at most one per method.
    Paging,
    /// The result-handler callback (spec §4.5/4.6); at most one per method.
    ResultHandler,
}

/// The analyzed shape of one declared interface method (spec §4.5).
#[derive(Debug, Clone)]
pub struct MethodSignature {
    pub name: String,
    pub return_shape: ReturnShape,
    /// Required when `return_shape == Map`: the property name values are
    /// keyed by.
    pub map_key: Option<String>,
    pub params: Vec<ParamSlot>,
}

impl MethodSignature {
    /// Build a signature, enforcing spec §4.5's analysis-time checks:
    /// at most one paging slot, at most one result-handler slot, and a
    /// `map_key` iff `return_shape == Map`.
    pub fn new(
        name: impl Into<String>,
        return_shape: ReturnShape,
        map_key: Option<String>,
        params: Vec<ParamSlot>,
    ) -> MapperResult<Self> {
        let name = name.into();
        let paging_count = params.iter().filter(|p| p.role == ParamRole::Paging).count();
        if paging_count > 1 {
            return Err(MapperError::build(format!(
                "method '{name}' declares {paging_count} paging parameters, at most one is allowed"
            )));
        }
        let handler_count = params.iter().filter(|p| p.role == ParamRole::ResultHandler).count();
        if handler_count > 1 {
            return Err(MapperError::build(format!(
                "method '{name}' declares {handler_count} result-handler parameters, at most one is allowed"
            )));
        }
        match (return_shape, &map_key) {
            (ReturnShape::Map, None) => {
                return Err(MapperError::build(format!(
                    "method '{name}' returns a map but declares no map-key"
                )))
            }
            (shape, Some(_)) if shape != ReturnShape::Map => {
                return Err(MapperError::build(format!(
                    "method '{name}' declares a map-key but does not return a map"
                )))
            }
            _ => {}
        }
        Ok(Self { name, return_shape, map_key, params })
    }

    pub fn has_paging_slot(&self) -> bool {
        self.params.iter().any(|p| p.role == ParamRole::Paging)
    }

    pub fn has_result_handler_slot(&self) -> bool {
        self.params.iter().any(|p| p.role == ParamRole::ResultHandler)
    }

    fn domain_slots(&self) -> impl Iterator<Item = &ParamSlot> {
        self.params.iter().filter(|p| p.role == ParamRole::Domain)
    }

    /// Each domain slot's resolved name: its explicit annotation if present,
    /// else `param<1-based-index>` counted over domain slots only (spec
    /// §4.5: "skip paging/result-handler slots").
    fn resolved_names(&self) -> Vec<String> {
        self.domain_slots()
            .enumerate()
            .map(|(i, slot)| slot.annotated_name.clone().unwrap_or_else(|| format!("param{}", i + 1)))
            .collect()
    }

    /// Turn positional call-site argument values into the parameter object
    /// a [`crate::statement::MappedStatement`] binds against (spec §4.5's
    /// `convert-args`, consumed by spec §4.6's executor).
    ///
    /// `args` must have exactly one entry per domain slot, in declaration
    /// order (paging/result-handler values are not passed here — the
    /// executor extracts those separately).
    pub fn convert_args(&self, args: &[Value]) -> MapperResult<Value> {
        let domain_count = self.domain_slots().count();
        if args.len() != domain_count {
            return Err(MapperError::build(format!(
                "method '{}' expects {domain_count} domain argument(s), got {}",
                self.name,
                args.len()
            )));
        }
        if domain_count == 1 && self.domain_slots().next().unwrap().annotated_name.is_none() {
            return Ok(args[0].clone());
        }
        let names = self.resolved_names();
        let mut map = serde_json::Map::new();
        for (i, (name, value)) in names.iter().zip(args.iter()).enumerate() {
            map.insert(name.clone(), value.clone());
            map.insert(format!("param{}", i + 1), value.clone());
            if let Some(declared) = self.domain_slots().nth(i).and_then(|s| s.declared_name.clone()) {
                map.entry(declared).or_insert_with(|| value.clone());
            }
        }
        Ok(Value::Object(map))
    }

    /// A strict name→value lookup map exposed to callers that need a
    /// parameter-name resolver directly rather than a built `Value` (spec
    /// §6's "parameter-name resolver (exposed)").
    pub fn name_map(&self, args: &[Value]) -> MapperResult<HashMap<String, Value>> {
        let Value::Object(map) = self.convert_args(args)? else {
            let mut single = HashMap::new();
            single.insert("param1".to_string(), args[0].clone());
            return Ok(single);
        };
        Ok(map.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain(name: Option<&str>) -> ParamSlot {
        ParamSlot { annotated_name: name.map(str::to_string), declared_name: None, role: ParamRole::Domain }
    }

    #[test]
    fn single_unannotated_param_passes_through() {
        let sig = MethodSignature::new("find", ReturnShape::Optional, None, vec![domain(None)]).unwrap();
        let args = vec![Value::from(7)];
        assert_eq!(sig.convert_args(&args).unwrap(), Value::from(7));
    }

    #[test]
    fn multiple_params_build_named_map() {
        let sig = MethodSignature::new(
            "find",
            ReturnShape::Many,
            None,
            vec![domain(Some("name")), domain(None)],
        )
        .unwrap();
        let args = vec![Value::from("a"), Value::from(2)];
        let converted = sig.convert_args(&args).unwrap();
        assert_eq!(converted["name"], Value::from("a"));
        assert_eq!(converted["param1"], Value::from("a"));
        assert_eq!(converted["param2"], Value::from(2));
    }

    #[test]
    fn rejects_duplicate_paging_slots() {
        let paging = ParamSlot { annotated_name: None, declared_name: None, role: ParamRole::Paging };
        let err = MethodSignature::new("find", ReturnShape::Many, None, vec![paging.clone(), paging]).unwrap_err();
        assert!(matches!(err, MapperError::Build(_)));
    }

    #[test]
    fn map_return_requires_map_key() {
        let err = MethodSignature::new("find", ReturnShape::Map, None, vec![]).unwrap_err();
        assert!(matches!(err, MapperError::Build(_)));
    }
}
