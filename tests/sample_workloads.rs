//! The bundled workloads load, round-trip and run.

use benchgen::{
    decode_payload, encode_workload, load_workload, preview, run_with_driver, write_rows, Preview,
    RunConfig,
};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use workload_core::{ResolvedUnit, StepPhase, Workload};
use workload_driver::RecordingDriver;

fn sample(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("workloads")
        .join(name)
}

#[test]
fn test_samples_load_and_validate() {
    let tpcb = load_workload(sample("tpcb.yaml")).unwrap();
    assert_eq!(tpcb.name, "tpcb");
    assert_eq!(tpcb.steps_in(StepPhase::Setup).count(), 2);
    assert_eq!(tpcb.steps_in(StepPhase::Teardown).count(), 1);

    let tpcc = load_workload(sample("tpcc_lite.yaml")).unwrap();
    assert_eq!(tpcc.metadata.get("benchmark").map(String::as_str), Some("tpcc"));
    assert_eq!(tpcc.find_unit("item").unwrap().kind(), "create_table");
    assert_eq!(tpcc.find_unit("load_item").unwrap().kind(), "insert");
}

#[test]
fn test_missing_workload_names_the_file() {
    let err = load_workload(sample("missing.yaml")).unwrap_err();
    assert!(format!("{err:#}").contains("missing.yaml"));
}

#[test]
fn test_encode_to_file_and_decode() {
    let workload = load_workload(sample("tpcc_lite.yaml")).unwrap();
    let bytes = encode_workload(&workload, None).unwrap();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&bytes).unwrap();
    let read_back = std::fs::read(file.path()).unwrap();

    let yaml = decode_payload(&read_back).unwrap();
    assert_eq!(Workload::from_yaml(&yaml).unwrap(), workload);
}

#[test]
fn test_decode_rejects_garbage() {
    assert!(decode_payload(b"not a payload").is_err());
}

#[test]
fn test_new_order_preview() {
    let workload = load_workload(sample("tpcc_lite.yaml")).unwrap();
    let Preview::Units(units) = preview(&workload, "new_order", 1000).unwrap() else {
        panic!("expected units");
    };
    assert_eq!(units.len(), 1000);
    for unit in &units {
        let ResolvedUnit::Query(query) = unit else {
            panic!("expected query");
        };
        assert_eq!(query.sql, "SELECT NEWORD($1, $2, $3, $4, 0)");
        let w_id = query.args[0].as_i32().unwrap();
        let d_id = query.args[1].as_i32().unwrap();
        assert!((1..=2).contains(&w_id));
        assert!((1..=10).contains(&d_id));
    }
}

#[test]
fn test_new_order_customers_are_skewed() {
    let workload = load_workload(sample("tpcc_lite.yaml")).unwrap();
    let Preview::Units(units) = preview(&workload, "new_order", 2000).unwrap() else {
        panic!("expected units");
    };
    let customers: Vec<i32> = units
        .iter()
        .map(|unit| {
            let ResolvedUnit::Query(query) = unit else {
                panic!("expected query");
            };
            query.params["c_id"].as_i32().unwrap()
        })
        .collect();
    assert!(customers.iter().all(|c| (1..=3000).contains(c)));
    let hot = customers.iter().filter(|c| **c <= 30).count();
    let cold = customers.iter().filter(|c| **c > 2970).count();
    assert!(hot > 10 * cold.max(1), "hot {hot}, cold {cold}");
}

#[test]
fn test_item_prices_are_decimals() {
    let workload = load_workload(sample("tpcc_lite.yaml")).unwrap();
    let Preview::Rows(batch) = preview(&workload, "load_item", 200).unwrap() else {
        panic!("expected rows");
    };
    let price = batch.columns.iter().position(|c| c == "i_price").unwrap();
    for row in &batch.rows {
        let value = row[price].as_decimal().unwrap();
        assert_eq!(value.scale(), 2);
        assert!(value >= Decimal::ONE && value <= Decimal::new(100, 0));
    }
}

#[test]
fn test_district_keys_are_unique() {
    let workload = load_workload(sample("tpcc_lite.yaml")).unwrap();
    let Preview::Rows(batch) = preview(&workload, "load_district", 20).unwrap() else {
        panic!("expected rows");
    };
    let w = batch.columns.iter().position(|c| c == "d_w_id").unwrap();
    let d = batch.columns.iter().position(|c| c == "d_id").unwrap();
    let keys: HashSet<(i32, i32)> = batch
        .rows
        .iter()
        .map(|row| (row[w].as_i32().unwrap(), row[d].as_i32().unwrap()))
        .collect();
    assert_eq!(keys.len(), 20);
}

#[test]
fn test_row_dump_is_reproducible() {
    let workload = load_workload(sample("tpcc_lite.yaml")).unwrap();
    let mut first = Vec::new();
    let mut second = Vec::new();
    write_rows(&workload, "load_item", 500, Some(600), 32, &mut first).unwrap();
    write_rows(&workload, "load_item", 500, Some(600), 100, &mut second).unwrap();
    assert_eq!(first, second);
    assert_eq!(String::from_utf8(first).unwrap().lines().count(), 101);
}

#[tokio::test]
async fn test_multi_client_run_loads_every_row_once() {
    let workload = load_workload(sample("tpcb.yaml")).unwrap();
    let config = RunConfig {
        clients: 3,
        iterations: 2,
        batch_size: 5000,
        ..RunConfig::default()
    };
    let driver = Arc::new(RecordingDriver::new());
    let summary = run_with_driver(workload, &config, driver.clone()).await.unwrap();

    assert_eq!(summary.clients, 3);
    assert_eq!(summary.units_failed, 0);
    assert_eq!(summary.rows_inserted, 100_011);

    let mut aids = HashSet::new();
    for batch in driver.batches().await {
        if batch.table_name == "pgbench_accounts" {
            for row in batch.rows {
                assert!(aids.insert(row[0].as_i64().unwrap()));
            }
        }
    }
    assert_eq!(aids.len(), 100_000);

    let creates = driver
        .units()
        .await
        .into_iter()
        .filter(|u| matches!(u, ResolvedUnit::CreateTable(_)))
        .count();
    assert_eq!(creates, 4);

    let transactions = driver
        .units()
        .await
        .into_iter()
        .filter(|u| u.name() == "tpcb_like")
        .count();
    assert_eq!(transactions, 6);
}
