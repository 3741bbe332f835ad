//! Benchmark parsing and evaluating a dynamic SQL-node tree.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dynasql::{parse_fragment, MappedStatement};
use serde_json::json;

const DYNAMIC_TEMPLATE: &str = r#"
SELECT * FROM t
<where>
<if test="name != null"> AND name = #{name} </if>
<if test="age != null"> AND age &gt; #{age} </if>
<foreach collection="tags" item="tag" open=" AND tag IN (" close=")" separator=",">#{tag}</foreach>
</where>
"#;

fn bench_parse(c: &mut Criterion) {
    c.bench_function("parse_fragment/dynamic", |b| {
        b.iter(|| parse_fragment(black_box(DYNAMIC_TEMPLATE)).unwrap());
    });
}

fn bench_bind(c: &mut Criterion) {
    let (nodes, _) = parse_fragment(DYNAMIC_TEMPLATE).unwrap();
    let statement = MappedStatement::compile(nodes).unwrap();
    let param = json!({"name": "a", "age": 18, "tags": ["x", "y", "z"]});
    c.bench_function("mapped_statement/bind", |b| {
        b.iter(|| statement.bind(black_box(&param)).unwrap());
    });
}

// Parameter-free, so `compile` can cache the evaluated `BoundSql` wholesale
// and `bind` is a cheap clone of it; `SELECT * FROM t WHERE id = #{id}` below
// is *not* this fast path, since its `#{id}` value must be re-resolved per call.
fn bench_cached_static_bind(c: &mut Criterion) {
    let (nodes, _) = parse_fragment("SELECT * FROM t").unwrap();
    let statement = MappedStatement::compile(nodes).unwrap();
    let param = json!({});
    c.bench_function("mapped_statement/bind_cached_static", |b| {
        b.iter(|| statement.bind(black_box(&param)).unwrap());
    });
}

fn bench_parameterized_nondynamic_bind(c: &mut Criterion) {
    let (nodes, _) = parse_fragment("SELECT * FROM t WHERE id = #{id}").unwrap();
    let statement = MappedStatement::compile(nodes).unwrap();
    let param = json!({"id": 7});
    c.bench_function("mapped_statement/bind_parameterized_nondynamic", |b| {
        b.iter(|| statement.bind(black_box(&param)).unwrap());
    });
}

criterion_group!(
    benches,
    bench_parse,
    bench_bind,
    bench_cached_static_bind,
    bench_parameterized_nondynamic_bind
);
criterion_main!(benches);
