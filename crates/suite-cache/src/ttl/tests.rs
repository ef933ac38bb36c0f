use suite_cache_db::CachePool;

use super::*;
use crate::schema::FieldDescriptor;
use crate::storage::StorageEngine;
use crate::types::{Scope, UpstreamTable};

fn structure() -> Vec<FieldDescriptor> {
    vec![FieldDescriptor { slug: "name".into(), label: "Name".into(), field_type: "textfield".into(), params: None }]
}

fn record(id: &str) -> crate::types::Record {
    serde_json::json!({"id": id, "name": "x"}).as_object().unwrap().clone()
}

async fn setup() -> (StorageEngine, TtlController) {
    let pool = CachePool::open_in_memory().await.unwrap();
    let storage = StorageEngine::open(pool).await.unwrap();
    let ctl = TtlController::new(storage.clone());
    (storage, ctl)
}

#[tokio::test]
async fn get_ttl_falls_back_to_default_preset() {
    let (_storage, ctl) = setup().await;
    assert_eq!(ctl.get_ttl("tbl_A").await.unwrap(), TtlPreset::Default.seconds());
}

#[tokio::test]
async fn set_ttl_persists_and_overrides_default() {
    let (_storage, ctl) = setup().await;
    ctl.set_ttl("tbl_A", 900, Some("very_high_mutation"), None).await.unwrap();
    assert_eq!(ctl.get_ttl("tbl_A").await.unwrap(), 900);
}

#[tokio::test]
async fn set_ttl_is_idempotent_on_conflict() {
    let (_storage, ctl) = setup().await;
    ctl.set_ttl("tbl_A", 900, None, None).await.unwrap();
    ctl.set_ttl("tbl_A", 1800, None, Some("bumped")).await.unwrap();
    assert_eq!(ctl.get_ttl("tbl_A").await.unwrap(), 1800);
}

#[tokio::test]
async fn records_scope_is_invalid_before_any_populate() {
    let (_storage, ctl) = setup().await;
    assert!(!ctl.valid(Scope::Records, Some("tbl_A")).await.unwrap());
}

#[tokio::test]
async fn records_scope_is_valid_after_populate_with_positive_ttl() {
    let (storage, ctl) = setup().await;
    storage.store_records("tbl_A", &structure(), &[record("rec_1")], 3600).await.unwrap();
    assert!(ctl.valid(Scope::Records, Some("tbl_A")).await.unwrap());
}

#[tokio::test]
async fn invalidating_records_clears_only_that_table() {
    let (storage, ctl) = setup().await;
    storage.store_records("tbl_A", &structure(), &[record("rec_1")], 3600).await.unwrap();
    storage.store_records("tbl_B", &structure(), &[record("rec_2")], 3600).await.unwrap();

    ctl.invalidate(Scope::Records, Some("tbl_A")).await.unwrap();

    assert!(!ctl.valid(Scope::Records, Some("tbl_A")).await.unwrap());
    assert!(ctl.valid(Scope::Records, Some("tbl_B")).await.unwrap());
}

#[tokio::test]
async fn invalidating_a_solution_cascades_to_its_table_list_and_records() {
    let (storage, ctl) = setup().await;
    let tables = vec![UpstreamTable { id: "tbl_A".into(), name: "A".into(), solution_id: Some("sol_X".into()), structure: structure() }];
    storage.store_table_list(Some("sol_X"), &tables, 3600).await.unwrap();
    storage.store_records("tbl_A", &structure(), &[record("rec_1")], 3600).await.unwrap();

    ctl.invalidate(Scope::Solutions, None).await.unwrap();

    assert!(!ctl.valid(Scope::TableList, Some("sol_X")).await.unwrap());
    assert!(!ctl.valid(Scope::Records, Some("tbl_A")).await.unwrap());
}

#[tokio::test]
async fn invalidating_global_table_list_cascades_to_all_records() {
    let (storage, ctl) = setup().await;
    let tables = vec![UpstreamTable { id: "tbl_A".into(), name: "A".into(), solution_id: Some("sol_X".into()), structure: structure() }];
    storage.store_table_list(None, &tables, 3600).await.unwrap();
    storage.store_records("tbl_A", &structure(), &[record("rec_1")], 3600).await.unwrap();

    ctl.invalidate(Scope::TableList, None).await.unwrap();

    assert!(!ctl.valid(Scope::TableList, None).await.unwrap());
    assert!(!ctl.valid(Scope::Records, Some("tbl_A")).await.unwrap());
}

#[tokio::test]
async fn warm_spec_explicit_and_single_pass_through() {
    let (_storage, ctl) = setup().await;
    assert_eq!(ctl.tables_to_warm(&WarmSpec::Single("tbl_A".into()), 5).await.unwrap(), vec!["tbl_A".to_string()]);
    assert_eq!(
        ctl.tables_to_warm(&WarmSpec::Explicit(vec!["tbl_A".into(), "tbl_B".into()]), 5).await.unwrap(),
        vec!["tbl_A".to_string(), "tbl_B".to_string()]
    );
}

#[tokio::test]
async fn status_report_counts_records_across_tables() {
    let (storage, ctl) = setup().await;
    storage.store_records("tbl_A", &structure(), &[record("rec_1"), record("rec_2")], 3600).await.unwrap();
    let report = ctl.status_report().await.unwrap();
    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].count, 2);
    assert!(report.records[0].is_valid);
}
