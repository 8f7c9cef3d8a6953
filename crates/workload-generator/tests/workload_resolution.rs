//! Resolving a whole workload the way a client context would.

use std::collections::HashSet;
use workload_core::{ResolvedUnit, StepPhase, Workload};
use workload_generator::{Resolved, UnitInstance};

const TPCC_LITE: &str = r#"
name: tpcc_lite
seed: 2024
steps:
  - name: load_items
    phase: setup
    units:
      - type: insert
        table_name: item
        row_count: 100000
        method: bulk_copy
        columns:
          - name: i_id
            rule: { type: int32_range, min: 1, max: 100000, unique: true }
          - name: i_name
            rule:
              type: string_range
              min_len: 14
              max_len: 24
              alphabet: [{ min: 65, max: 90 }, { min: 97, max: 122 }]
          - name: i_price
            rule: { type: float_range, min: 1.0, max: 100.0 }
  - name: new_order
    units:
      - type: query
        name: new_order
        sql: "SELECT NEWORD(:w_id, :d_id, :c_id, :o_ol_cnt, 0)"
        params:
          - { name: c_id, rule: { type: int32_range, min: 1, max: 3000 } }
          - { name: o_ol_cnt, rule: { type: int32_range, min: 5, max: 15 } }
        groups:
          - name: district
            params:
              - { name: w_id, rule: { type: int32_range, min: 1, max: 10 } }
              - { name: d_id, rule: { type: int32_range, min: 1, max: 10 } }
"#;

fn instance(workload: &Workload, name: &str) -> UnitInstance {
    UnitInstance::new(workload.seed, workload.find_unit(name).unwrap()).unwrap()
}

#[test]
fn test_item_load_covers_the_id_range() {
    let workload = Workload::from_yaml(TPCC_LITE).unwrap();
    let Resolved::Rows(stream) = instance(&workload, "item").resolve().unwrap() else {
        panic!("insert should resolve to rows");
    };
    let stream = stream.with_batch_size(10_000);
    assert_eq!(stream.columns(), ["i_id", "i_name", "i_price"]);

    let mut ids = HashSet::with_capacity(100_000);
    for batch in stream {
        for row in batch.unwrap().rows {
            let id = row[0].as_i32().unwrap();
            assert!((1..=100_000).contains(&id));
            ids.insert(id);
        }
    }
    assert_eq!(ids.len(), 100_000);
}

#[test]
fn test_new_order_resolves_1000_times() {
    let workload = Workload::from_yaml(TPCC_LITE).unwrap();
    let mut new_order = instance(&workload, "new_order");
    for _ in 0..1000 {
        let Resolved::Unit(ResolvedUnit::Query(query)) = new_order.resolve().unwrap() else {
            panic!("expected query");
        };
        assert_eq!(query.args.len(), 4);
        let w_id = query.params["w_id"].as_i32().unwrap();
        let d_id = query.params["d_id"].as_i32().unwrap();
        let c_id = query.params["c_id"].as_i32().unwrap();
        let ol_cnt = query.params["o_ol_cnt"].as_i32().unwrap();
        assert!((1..=10).contains(&w_id));
        assert!((1..=10).contains(&d_id));
        assert!((1..=3000).contains(&c_id));
        assert!((5..=15).contains(&ol_cnt));
    }
}

#[test]
fn test_contexts_rebuilt_from_yaml_agree() {
    let a = Workload::from_yaml(TPCC_LITE).unwrap();
    let b = Workload::from_yaml(TPCC_LITE).unwrap();
    for step in a.steps_in(StepPhase::Workload) {
        for unit in &step.units {
            let mut x = UnitInstance::new(a.seed, unit).unwrap();
            let mut y = UnitInstance::new(b.seed, b.find_unit(unit.name()).unwrap()).unwrap();
            for _ in 0..20 {
                let (Resolved::Unit(left), Resolved::Unit(right)) =
                    (x.resolve().unwrap(), y.resolve().unwrap())
                else {
                    panic!("expected units");
                };
                assert_eq!(left, right);
            }
        }
    }
}

#[test]
fn test_changing_the_run_seed_changes_values() {
    let workload = Workload::from_yaml(TPCC_LITE).unwrap();
    let unit = workload.find_unit("new_order").unwrap();
    let mut base = UnitInstance::new(workload.seed, unit).unwrap();
    let mut other = UnitInstance::new(workload.seed + 1, unit).unwrap();
    let draw = |instance: &mut UnitInstance| -> Vec<ResolvedUnit> {
        (0..10)
            .map(|_| match instance.resolve().unwrap() {
                Resolved::Unit(unit) => unit,
                Resolved::Rows(_) => panic!("expected unit"),
            })
            .collect()
    };
    assert_ne!(draw(&mut base), draw(&mut other));
}
