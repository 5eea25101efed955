use std::sync::Arc;

use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

use academy_database::connect_pool;
use academy_runtime::{
    prepare_schema, Catalog, DrawConfig, DrawMode, DrawRecord, DrawResult, DrawService,
    DrawnCard, FreeDrawRequest, HistoryLookup, HistoryStore, OpportunityDrawRequest,
    OpportunityKind, ProgressEntry, ProgressLedger, ProgressUpdate, Rarity, SqliteStore,
};

async fn store() -> Result<SqliteStore> {
    let pool = connect_pool("sqlite::memory:").await?;
    prepare_schema(&pool, false, true).await?;
    Ok(SqliteStore::new(pool))
}

fn at(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 6, day)
        .and_then(|d| d.and_hms_opt(hour, 30, 15))
        .unwrap()
}

#[tokio::test]
async fn history_round_trips_through_sqlite() -> Result<()> {
    let store = store().await?;
    assert_eq!(store.load_history("A001").await?, HistoryLookup::NoHistory);

    let request_id = Uuid::new_v4();
    let records = DrawRecord::with_source(
        DrawRecord::from_draws(
            "A001",
            request_id,
            &[
                DrawnCard::new("九九乘法", Rarity::Common),
                DrawnCard::new("牛頓", Rarity::Legendary),
                DrawnCard::new("小明", Rarity::Rare),
            ],
            at(1, 9),
        ),
        Some(OpportunityKind::Progress),
        true,
    );
    assert_eq!(store.append(&records).await?, 3);

    let HistoryLookup::Found(loaded) = store.load_history("A001").await? else {
        panic!("history should exist");
    };
    assert_eq!(loaded, records);
    assert_eq!(loaded[0].opportunity, Some(OpportunityKind::Progress));
    assert!(loaded[0].with_replacement);
    assert_eq!(store.find_request(request_id).await?, records);
    assert_eq!(store.students().await?, vec!["A001".to_string()]);

    let status = store.student_status("A001").await?.unwrap();
    assert_eq!(status.total_draws, 3);
    assert_eq!(status.no_legendary_count, 1);
    Ok(())
}

#[tokio::test]
async fn appending_the_same_draw_twice_is_ignored() -> Result<()> {
    let store = store().await?;
    let records = DrawRecord::from_draws(
        "A002",
        Uuid::new_v4(),
        &[DrawnCard::new("量角器", Rarity::Common)],
        at(1, 9),
    );

    assert_eq!(store.append(&records).await?, 1);
    assert_eq!(store.append(&records).await?, 0);
    assert_eq!(store.all_records().await?.len(), 1);
    assert_eq!(store.student_status("A002").await?.unwrap().total_draws, 1);
    Ok(())
}

#[tokio::test]
async fn opportunity_is_consumed_by_one_conditional_update() -> Result<()> {
    let store = store().await?;
    let today = at(3, 0).date();

    assert!(!store.consume_opportunity("ghost", OpportunityKind::Homework, today).await?);

    let entry = store
        .update_progress("A003", &ProgressUpdate { name: Some("小華".into()), homework_done: Some(true), ..Default::default() })
        .await?;
    assert_eq!(entry.name, "小華");
    assert!(entry.homework_done);

    assert!(!store.consume_opportunity("A003", OpportunityKind::Progress, today).await?);
    assert!(store.consume_opportunity("A003", OpportunityKind::Homework, today).await?);
    assert!(!store.consume_opportunity("A003", OpportunityKind::Homework, today).await?);

    let entry = store.find_student("A003").await?.unwrap();
    assert_eq!(entry.homework_last_draw, Some(today));

    store.restore_opportunity("A003", OpportunityKind::Homework, None).await?;
    let entry = store.find_student("A003").await?.unwrap();
    assert_eq!(entry.homework_last_draw, None);
    assert!(entry.is_available(OpportunityKind::Homework, today));
    Ok(())
}

#[tokio::test]
async fn progress_update_keeps_draw_dates() -> Result<()> {
    let store = store().await?;
    let mut entry = ProgressEntry::new("A004", "小美");
    entry.progress_done = true;
    entry.progress_last_draw = Some(at(2, 0).date());
    store.save_entry(&entry).await?;

    let updated = store
        .update_progress("A004", &ProgressUpdate { homework_done: Some(true), ..Default::default() })
        .await?;
    assert_eq!(updated.progress_last_draw, Some(at(2, 0).date()));
    assert_eq!(updated.name, "小美");
    assert_eq!(store.find_student("A004").await?, Some(updated));
    Ok(())
}

#[tokio::test]
async fn draw_service_runs_on_sqlite() -> Result<()> {
    let catalog = Catalog::from_reader(
        "名稱,稀有度,類型,卡池分類,KN\n甲,普通,學生卡,基礎包,1\n乙,稀有,知識卡,基礎包,2\n丙,傳說,武器卡,基礎包,5\n".as_bytes(),
    )?;
    let store = Arc::new(store().await?);
    let mut entry = ProgressEntry::new("A005", "阿志");
    entry.homework_done = true;
    store.save_entry(&entry).await?;

    let service = DrawService::new(Arc::new(catalog), DrawConfig::flat(), store.clone(), store.clone())?
        .with_rng_seed(1);

    let request = OpportunityDrawRequest {
        student_id: "A005".into(),
        kind: OpportunityKind::Homework,
        pool_tag: None,
        request_id: Some(Uuid::new_v4()),
    };
    assert!(matches!(service.draw_for_opportunity(&request, at(4, 9)).await?, DrawResult::Committed(_)));
    assert!(matches!(service.draw_for_opportunity(&request, at(4, 9)).await?, DrawResult::Replayed(_)));

    // caps 2 + 2 + 1 leave four more draws in the pool
    let packs = FreeDrawRequest {
        student_id: "A005".into(),
        mode: DrawMode::Packs { packs: 1 },
        pool_tag: None,
        request_id: None,
    };
    match service.draw_free(&packs, at(4, 10)).await? {
        DrawResult::Committed(receipt) => {
            assert_eq!(receipt.records.len(), 5);
            assert!(receipt.with_replacement);
        }
        other => panic!("unexpected result {other:?}"),
    }

    let history = service.student_history("A005").await?;
    assert_eq!(history.records.len(), 6);
    assert_eq!(history.status.map(|s| s.total_draws), Some(6));
    Ok(())
}
