//! End-to-end scenarios from spec.md §8's testable properties, run
//! through the public `Runner` API the way an embedding application
//! would. Named after the spec's own S-numbering where a scenario maps
//! onto one directly; others are inline sanity checks for clauses the
//! numbered scenarios don't exercise on their own.

use std::collections::HashMap;

use flowquery::{PropertyMap, Runner, Value};
use pretty_assertions::assert_eq;

fn int(i: i64) -> Value {
    Value::Int(i)
}

#[tokio::test]
async fn s1_literal_arithmetic_projection() {
    let runner = Runner::new();
    let result = runner.run("RETURN 1 + 2 AS sum", PropertyMap::new()).await.unwrap();
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0].get("sum"), Some(&int(3)));
}

#[tokio::test]
async fn s2_nested_unwind_groups_by_the_non_aggregate_item() {
    let runner = Runner::new();
    let result = runner
        .run(
            "UNWIND [1,1,2,2] AS i UNWIND [1,2,3,4] AS j RETURN i, sum(j) AS s",
            PropertyMap::new(),
        )
        .await
        .unwrap();
    assert_eq!(result.rows.len(), 2);
    assert_eq!(result.rows[0].get("i"), Some(&int(1)));
    assert_eq!(result.rows[0].get("s"), Some(&int(20)));
    assert_eq!(result.rows[1].get("i"), Some(&int(2)));
    assert_eq!(result.rows[1].get("s"), Some(&int(20)));
}

/// spec.md §8 S4: a chain `1->2->3->4` of `:KNOWS`, `*0..3` from an
/// unlabeled, unbound start node — exercises the "scan every defined
/// label when a pattern node has neither a label nor a bound reference"
/// fallback as well as the depth-first zero-before-one-before-two hop
/// emission order.
#[tokio::test]
async fn s4_variable_length_emits_depth_first_in_hop_order() {
    let runner = Runner::new();
    runner
        .run(
            "CREATE VIRTUAL LABEL Person FROM {
                UNWIND [1,2,3,4] AS id RETURN id AS id
            }",
            PropertyMap::new(),
        )
        .await
        .unwrap();
    runner
        .run(
            "CREATE VIRTUAL TYPE KNOWS FROM {
                UNWIND [{l:1,r:2},{l:2,r:3},{l:3,r:4}] AS edge
                RETURN edge.l AS left_id, edge.r AS right_id
            }",
            PropertyMap::new(),
        )
        .await
        .unwrap();

    let result = runner
        .run("MATCH (a)-[r:KNOWS*0..3]->(b) RETURN a.id AS a, r, b.id AS b", PropertyMap::new())
        .await
        .unwrap();

    assert_eq!(result.rows.len(), 10);

    // Person 1 emits its four rows (0, 1, 2, 3 hops) before Person 2's
    // three, before Person 3's two, before Person 4's one.
    let starts: Vec<i64> = result.rows.iter().map(|r| r.get("a").unwrap().as_int().unwrap()).collect();
    assert_eq!(starts, vec![1, 1, 1, 1, 2, 2, 2, 3, 3, 4]);

    // Person 1's zero-hop row binds `b` to itself and `r` to null.
    assert_eq!(result.rows[0].get("b"), Some(&int(1)));
    assert_eq!(result.rows[0].get("r"), Some(&Value::Null));
    // Person 1's three-hop row reaches Person 4.
    assert_eq!(result.rows[3].get("b"), Some(&int(4)));
}

/// spec.md §8 S5: two persons with a reciprocal `:KNOWS` (stored as two
/// rows, one per direction, since the virtual store has no single
/// "undirected edge" shape) — an undirected variable-length pattern
/// must match symmetrically against both stored rows from either
/// starting node to reach the documented 6-row, all-acyclic-paths count.
#[tokio::test]
async fn s5_undirected_variable_length_match_is_symmetric_and_acyclic() {
    let runner = Runner::new();
    runner
        .run("CREATE VIRTUAL LABEL Person FROM { UNWIND [1,2] AS id RETURN id AS id }", PropertyMap::new())
        .await
        .unwrap();
    runner
        .run(
            "CREATE VIRTUAL TYPE KNOWS FROM {
                UNWIND [{l:1,r:2},{l:2,r:1}] AS edge
                RETURN edge.l AS left_id, edge.r AS right_id
            }",
            PropertyMap::new(),
        )
        .await
        .unwrap();

    let result = runner
        .run("MATCH p=(:Person)-[:KNOWS*]-(:Person) RETURN p", PropertyMap::new())
        .await
        .unwrap();

    assert_eq!(result.rows.len(), 6);
}

#[tokio::test]
async fn s6_aggregates_over_an_empty_group_use_their_documented_defaults() {
    let runner = Runner::new();
    let sum_result = runner.run("UNWIND [] AS x RETURN sum(x) AS s", PropertyMap::new()).await.unwrap();
    assert_eq!(sum_result.rows, vec![HashMap::from([("s".to_string(), int(0))])]);

    let avg_result = runner.run("UNWIND [] AS x RETURN avg(x) AS a", PropertyMap::new()).await.unwrap();
    assert_eq!(avg_result.rows, vec![HashMap::from([("a".to_string(), Value::Null)])]);
}

#[tokio::test]
async fn s7_union_deduplicates_but_union_all_does_not() {
    let runner = Runner::new();
    let union_result = runner
        .run("WITH 1 AS x RETURN x UNION WITH 1 AS x RETURN x", PropertyMap::new())
        .await
        .unwrap();
    assert_eq!(union_result.rows, vec![HashMap::from([("x".to_string(), int(1))])]);

    let union_all_result = runner
        .run("WITH 1 AS x RETURN x UNION ALL WITH 1 AS x RETURN x", PropertyMap::new())
        .await
        .unwrap();
    assert_eq!(
        union_all_result.rows,
        vec![
            HashMap::from([("x".to_string(), int(1))]),
            HashMap::from([("x".to_string(), int(1))]),
        ]
    );
}

#[tokio::test]
async fn s8_order_by_key_never_leaks_into_the_projected_row() {
    let runner = Runner::new();
    let result = runner
        .run(
            "UNWIND ['BANANA','apple','Cherry'] AS fruit RETURN fruit ORDER BY toLower(fruit)",
            PropertyMap::new(),
        )
        .await
        .unwrap();
    let fruits: Vec<&Value> = result.rows.iter().map(|r| r.get("fruit").unwrap()).collect();
    assert_eq!(
        fruits,
        vec![
            &Value::String("apple".into()),
            &Value::String("BANANA".into()),
            &Value::String("Cherry".into()),
        ]
    );
    for row in &result.rows {
        assert_eq!(row.len(), 1, "ORDER BY key must not appear in the output row");
    }
}

#[tokio::test]
async fn optional_match_against_an_undefined_label_yields_null_bindings_not_an_error() {
    let runner = Runner::new();
    let result = runner
        .run("OPTIONAL MATCH (n:Ghost) RETURN n", PropertyMap::new())
        .await
        .unwrap();
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0].get("n"), Some(&Value::Null));
}

#[tokio::test]
async fn plain_match_against_an_undefined_label_is_a_semantic_error() {
    let runner = Runner::new();
    let err = runner.run("MATCH (n:Ghost) RETURN n", PropertyMap::new()).await;
    assert!(err.is_err());
}

#[tokio::test]
async fn where_filters_rows_three_valued_logic_treats_null_as_not_true() {
    let runner = Runner::new();
    let result = runner
        .run(
            "UNWIND [1, 2, 3, null] AS x WHERE x > 1 RETURN x",
            PropertyMap::new(),
        )
        .await
        .unwrap();
    let xs: Vec<&Value> = result.rows.iter().map(|r| r.get("x").unwrap()).collect();
    assert_eq!(xs, vec![&int(2), &int(3)]);
}

#[tokio::test]
async fn call_dispatches_to_a_registered_provider_and_binds_yield_names() {
    use async_trait::async_trait;
    use flowquery::{AsyncProvider, ProviderRequest};
    use std::sync::Arc;

    struct Echo;
    #[async_trait]
    impl AsyncProvider for Echo {
        async fn fetch(&self, request: ProviderRequest) -> flowquery::Result<Value> {
            Ok(Value::Map(PropertyMap::from([("url".to_string(), Value::String(request.url))])))
        }
    }

    let runner = Runner::new();
    runner.register_provider("echo", Arc::new(Echo));
    let result = runner
        .run("CALL echo('https://example.com') YIELD url RETURN url", PropertyMap::new())
        .await
        .unwrap();
    assert_eq!(result.rows[0].get("url"), Some(&Value::String("https://example.com".into())));
}

#[tokio::test]
async fn custom_scalar_function_shadows_nothing_and_is_callable() {
    use flowquery::{Arity, FunctionDescriptor};

    fn shout(args: &[Value]) -> flowquery::Result<Value> {
        match &args[0] {
            Value::String(s) => Ok(Value::String(format!("{}!", s.to_uppercase()))),
            other => Ok(other.clone()),
        }
    }

    let runner = Runner::new();
    runner.register_function("shout", FunctionDescriptor::Scalar { arity: Arity::exact(1), func: shout });
    let result = runner.run("RETURN shout('hi') AS loud", PropertyMap::new()).await.unwrap();
    assert_eq!(result.rows[0].get("loud"), Some(&Value::String("HI!".into())));
}

#[tokio::test]
async fn predicate_functions_fold_over_a_bound_loop_variable() {
    let runner = Runner::new();
    let result = runner
        .run(
            "RETURN all(x IN [2,4,6] WHERE x % 2 = 0) AS a,
                    any(x IN [1,3,5] WHERE x = 3) AS b,
                    none(x IN [1,2,3] WHERE x > 5) AS c,
                    single(x IN [1,2,3] WHERE x = 2) AS d",
            PropertyMap::new(),
        )
        .await
        .unwrap();
    assert_eq!(result.rows[0].get("a"), Some(&Value::Bool(true)));
    assert_eq!(result.rows[0].get("b"), Some(&Value::Bool(true)));
    assert_eq!(result.rows[0].get("c"), Some(&Value::Bool(true)));
    assert_eq!(result.rows[0].get("d"), Some(&Value::Bool(true)));
}

#[tokio::test]
async fn predicate_functions_on_a_null_collection_propagate_null() {
    let runner = Runner::new();
    let result = runner.run("RETURN all(x IN null WHERE x > 0) AS a", PropertyMap::new()).await.unwrap();
    assert_eq!(result.rows[0].get("a"), Some(&Value::Null));
}

#[tokio::test]
async fn single_requires_exactly_one_match() {
    let runner = Runner::new();
    let result = runner
        .run("RETURN single(x IN [1,2,3] WHERE x > 1) AS one_of_two", PropertyMap::new())
        .await
        .unwrap();
    assert_eq!(result.rows[0].get("one_of_two"), Some(&Value::Bool(false)));
}
