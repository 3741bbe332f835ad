//! End-to-end coverage of the template-to-`BoundSql` pipeline, mirroring
//! the worked scenarios a dynamic-SQL mapping core is expected to handle.

use dynasql::{parse_fragment, row_count_result, MappedStatement, RowCountReturn};
use serde_json::json;

fn bind(template: &str, param: &serde_json::Value) -> dynasql::BoundSql {
    let (nodes, _) = parse_fragment(template).unwrap();
    let statement = MappedStatement::compile(nodes).unwrap();
    statement.bind(param).unwrap()
}

#[test]
fn simple_select_by_id() {
    let bound = bind("SELECT * FROM t WHERE id = #{id}", &json!({"id": 7}));
    assert_eq!(bound.sql, "SELECT * FROM t WHERE id = ?");
    assert_eq!(bound.parameters.len(), 1);
    assert_eq!(bound.parameters[0].value, json!(7));
    assert_eq!(bound.placeholder_count(), bound.parameters.len());
}

#[test]
fn dynamic_where_with_if() {
    let template = r#"SELECT * FROM t<where><if test="name != null"> AND name = #{name} </if><if test="age != null"> AND age &gt; #{age} </if></where>"#;

    let bound = bind(template, &json!({"name": null, "age": 18}));
    assert_eq!(bound.sql, "SELECT * FROM t WHERE age > ?");
    assert_eq!(bound.parameters.len(), 1);
    assert_eq!(bound.parameters[0].value, json!(18));

    let bound = bind(template, &json!({"name": null, "age": null}));
    assert_eq!(bound.sql, "SELECT * FROM t");
    assert!(bound.parameters.is_empty());
}

#[test]
fn foreach_in_list() {
    let template = r#"SELECT * FROM t WHERE id IN <foreach collection="ids" item="x" open="(" close=")" separator=",">#{x}</foreach>"#;

    let bound = bind(template, &json!({"ids": [1, 2, 3]}));
    assert_eq!(bound.sql, "SELECT * FROM t WHERE id IN (?,?,?)");
    let values: Vec<_> = bound.parameters.iter().map(|p| p.value.clone()).collect();
    assert_eq!(values, vec![json!(1), json!(2), json!(3)]);

    let bound = bind(template, &json!({"ids": []}));
    assert_eq!(bound.sql, "SELECT * FROM t WHERE id IN ()");
    assert!(bound.parameters.is_empty());
}

#[test]
fn substitution_vs_parameter() {
    let bound = bind("ORDER BY ${col} ASC LIMIT #{n}", &json!({"col": "created_at", "n": 10}));
    assert_eq!(bound.sql, "ORDER BY created_at ASC LIMIT ?");
    assert_eq!(bound.parameters.len(), 1);
    assert_eq!(bound.parameters[0].value, json!(10));

    // Documented unsafe: substitution is textual, not parameterized.
    let bound = bind("ORDER BY ${col} ASC LIMIT #{n}", &json!({"col": "x; DROP TABLE t", "n": 1}));
    assert_eq!(bound.sql, "ORDER BY x; DROP TABLE t ASC LIMIT ?");
}

#[test]
fn row_count_coercion_scenarios() {
    assert_eq!(row_count_result(3, RowCountReturn::Void).unwrap(), serde_json::Value::Null);
    assert_eq!(row_count_result(3, RowCountReturn::I32).unwrap(), json!(3));
    assert_eq!(row_count_result(3, RowCountReturn::Bool).unwrap(), json!(true));
    assert_eq!(row_count_result(3, RowCountReturn::I64).unwrap(), json!(3));
}

#[test]
fn foreach_parameter_names_are_unique_per_iteration() {
    let template = r#"<foreach collection="ids" item="id" open="(" close=")" separator=",">#{id}</foreach>"#;
    let bound = bind(template, &json!({"ids": [10, 20]}));
    let names: Vec<_> = bound.parameters.iter().map(|p| p.expression.clone()).collect();
    assert_eq!(names.len(), 2);
    assert_ne!(names[0], names[1]);
    for name in &names {
        assert!(name.starts_with("__frch_id_"));
    }
}

#[test]
fn static_tree_ignores_parameter_object() {
    let (nodes, is_dynamic) = parse_fragment("SELECT 1").unwrap();
    assert!(!is_dynamic);
    let statement = MappedStatement::compile(nodes).unwrap();
    let a = statement.bind(&json!({"anything": true})).unwrap();
    let b = statement.bind(&serde_json::Value::Null).unwrap();
    assert_eq!(a.sql, b.sql);
    assert_eq!(a.sql, "SELECT 1");
}

#[test]
fn where_never_emits_bare_keyword() {
    let template = r#"<where><if test="flag == true"> AND x = 1 </if></where>"#;
    let bound = bind(template, &json!({"flag": false}));
    assert_eq!(bound.sql, "");
}

#[test]
fn set_strips_trailing_comma() {
    let template = r#"<set><if test="a != null">a = #{a}, </if><if test="b != null">b = #{b}, </if></set>"#;
    let bound = bind(template, &json!({"a": 1, "b": null}));
    assert_eq!(bound.sql, "SET a = ?");
}
