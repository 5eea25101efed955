use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

use academy_runtime::{
    Catalog, DrawConfig, DrawError, DrawMode, DrawRecord, DrawResult, DrawService,
    FreeDrawRequest, HistoryLookup, HistoryStore, LocalExporter, MemoryStore,
    OpportunityDrawRequest, OpportunityKind, PackSampling, PackShortfall, ProgressEntry,
    ProgressLedger, Rarity, StoreError, StudentDrawState, StudentStatus,
};

const CATALOG: &str = "\
名稱,稀有度,類型,卡池分類,KN,科目
九九乘法,普通,知識卡,基礎包,1,數學
量角器,普通,武器卡,基礎包,1,數學
小明,稀有,學生卡,基礎包,2,
光合作用,史詩,知識卡,基礎包,3,自然
牛頓,傳說,學生卡,基礎包,5,自然
Annie老師,傳說,英雄卡,基礎包,0,
凱撒,傳說,學生卡,羅馬戰士體驗營,5,歷史
";

fn catalog() -> Arc<Catalog> {
    Arc::new(Catalog::from_reader(CATALOG.as_bytes()).unwrap())
}

fn at(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 6, day)
        .and_then(|d| d.and_hms_opt(hour, 0, 0))
        .unwrap()
}

fn student(id: &str, homework: bool, progress: bool) -> ProgressEntry {
    ProgressEntry {
        homework_done: homework,
        progress_done: progress,
        ..ProgressEntry::new(id, id)
    }
}

fn service(store: Arc<MemoryStore>) -> DrawService {
    DrawService::new(catalog(), DrawConfig::weighted(), store.clone(), store)
        .unwrap()
        .with_rng_seed(42)
}

fn homework(student_id: &str) -> OpportunityDrawRequest {
    OpportunityDrawRequest {
        student_id: student_id.to_string(),
        kind: OpportunityKind::Homework,
        pool_tag: None,
        request_id: None,
    }
}

fn committed(result: DrawResult) -> academy_runtime::DrawReceipt {
    match result {
        DrawResult::Committed(receipt) => receipt,
        other => panic!("expected a committed draw, got {other:?}"),
    }
}

#[tokio::test]
async fn opportunity_is_spent_once_per_day() -> Result<()> {
    let store = Arc::new(MemoryStore::with_students([student("A001", true, false)]));
    let service = service(store.clone());

    let receipt = committed(service.draw_for_opportunity(&homework("A001"), at(1, 9)).await?);
    assert_eq!(receipt.records.len(), 1);
    assert_eq!(receipt.opportunity, Some(OpportunityKind::Homework));
    assert_eq!(receipt.records[0].drawn_at, at(1, 9));

    let again = service.draw_for_opportunity(&homework("A001"), at(1, 10)).await;
    assert!(matches!(again, Err(DrawError::OpportunityUnavailable { kind: OpportunityKind::Homework, .. })));

    let eligibility = service.eligibility("A001", at(1, 0).date()).await?;
    assert_eq!(eligibility.total_available(), 0);

    committed(service.draw_for_opportunity(&homework("A001"), at(2, 9)).await?);
    let history = store.load_history("A001").await?;
    assert_eq!(history.records().len(), 2);
    Ok(())
}

#[tokio::test]
async fn gate_rejects_unknown_and_unfinished_students() -> Result<()> {
    let store = Arc::new(MemoryStore::with_students([student("A002", false, true)]));
    let service = service(store.clone());

    let unknown = service.draw_for_opportunity(&homework("nobody"), at(1, 9)).await;
    assert!(matches!(unknown, Err(DrawError::NotRegistered(id)) if id == "nobody"));

    let unfinished = service.draw_for_opportunity(&homework("A002"), at(1, 9)).await;
    assert!(matches!(unfinished, Err(DrawError::OpportunityUnavailable { .. })));

    let progress = OpportunityDrawRequest { kind: OpportunityKind::Progress, ..homework("A002") };
    committed(service.draw_for_opportunity(&progress, at(1, 9)).await?);
    assert_eq!(store.all_records().await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn replaying_a_request_returns_the_stored_draw() -> Result<()> {
    let store = Arc::new(MemoryStore::with_students([student("A003", true, true)]));
    let service = service(store.clone());

    let request = OpportunityDrawRequest { request_id: Some(Uuid::new_v4()), ..homework("A003") };
    let first = committed(service.draw_for_opportunity(&request, at(1, 9)).await?);

    match service.draw_for_opportunity(&request, at(1, 9)).await? {
        DrawResult::Replayed(replayed) => {
            assert_eq!(replayed.records, first.records);
            assert_eq!(replayed.opportunity, Some(OpportunityKind::Homework));
            assert!(!replayed.with_replacement);
        }
        other => panic!("expected replay, got {other:?}"),
    }
    assert_eq!(store.all_records().await?.len(), 1);

    // the progress opportunity is still open after the replay
    let eligibility = service.eligibility("A003", at(1, 9).date()).await?;
    assert!(eligibility.opportunities[&OpportunityKind::Progress]);

    let stolen = OpportunityDrawRequest { student_id: "someone".into(), ..request };
    assert!(matches!(
        service.draw_for_opportunity(&stolen, at(1, 9)).await,
        Err(DrawError::InvalidRequest(_))
    ));
    Ok(())
}

#[tokio::test]
async fn fully_collected_pool_keeps_the_opportunity() -> Result<()> {
    let store = Arc::new(MemoryStore::with_students([student("A004", true, false)]));
    let service = service(store.clone());

    let owned = ["九九乘法", "九九乘法", "量角器", "量角器", "小明", "小明", "光合作用", "光合作用", "牛頓"]
        .iter()
        .map(|name| {
            let rarity = service.catalog().find(name).unwrap().rarity;
            academy_runtime::DrawnCard::new(*name, rarity)
        })
        .collect::<Vec<_>>();
    store.append(&DrawRecord::from_draws("A004", Uuid::new_v4(), &owned, at(1, 8))).await?;

    let result = service.draw_for_opportunity(&homework("A004"), at(1, 9)).await?;
    assert_eq!(
        result,
        DrawResult::FullyCollected { student_id: "A004".into(), pool_tag: "基礎包".into() }
    );
    let eligibility = service.eligibility("A004", at(1, 9).date()).await?;
    assert!(eligibility.opportunities[&OpportunityKind::Homework]);
    Ok(())
}

#[tokio::test]
async fn replayed_free_pack_keeps_its_replacement_flag() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let service = service(store);

    let request = FreeDrawRequest {
        student_id: "A005".into(),
        mode: DrawMode::Packs { packs: 1 },
        pool_tag: Some("羅馬戰士體驗營".into()),
        request_id: Some(Uuid::new_v4()),
    };
    let first = committed(service.draw_free(&request, at(1, 9)).await?);
    assert!(first.with_replacement);

    match service.draw_free(&request, at(1, 10)).await? {
        DrawResult::Replayed(replayed) => {
            assert!(replayed.with_replacement);
            assert_eq!(replayed.opportunity, None);
            assert_eq!(replayed.records, first.records);
        }
        other => panic!("expected replay, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn weighted_pack_from_a_large_pool_draws_without_replacement() -> Result<()> {
    // 151 weighted copies but only 3 cards of allowance
    let csv = "名稱,稀有度,類型,卡池分類,KN\n阿土,普通,學生卡,小卡池,1\n王者,傳說,學生卡,小卡池,5\n";
    let catalog = Arc::new(Catalog::from_reader(csv.as_bytes())?);

    for shortfall in [PackShortfall::WithReplacement, PackShortfall::Reject] {
        let store = Arc::new(MemoryStore::new());
        let config = DrawConfig { shortfall, ..DrawConfig::weighted() };
        let service = DrawService::new(catalog.clone(), config, store.clone(), store)?.with_rng_seed(3);

        let request = FreeDrawRequest {
            student_id: "B004".into(),
            mode: DrawMode::Packs { packs: 1 },
            pool_tag: Some("小卡池".into()),
            request_id: None,
        };
        let receipt = committed(service.draw_free(&request, at(1, 9)).await?);
        assert_eq!(receipt.records.len(), 5);
        assert!(!receipt.with_replacement);
        let legendary = receipt.records.iter().filter(|record| record.card_name == "王者").count();
        assert!(legendary <= 1);
    }
    Ok(())
}

#[tokio::test]
async fn pack_session_holds_caps_across_packs() -> Result<()> {
    let mut csv = String::from("名稱,稀有度,類型,卡池分類,KN\n");
    for i in 0..15 {
        csv.push_str(&format!("卡{i},普通,學生卡,基礎包,1\n"));
    }
    let catalog = Arc::new(Catalog::from_reader(csv.as_bytes())?);
    let store = Arc::new(MemoryStore::new());
    let config = DrawConfig { pack_sampling: PackSampling::Allowance, ..DrawConfig::weighted() };
    let service = DrawService::new(catalog, config, store.clone(), store.clone())?.with_rng_seed(7);

    let request = FreeDrawRequest {
        student_id: "B001".into(),
        mode: DrawMode::Packs { packs: 5 },
        pool_tag: None,
        request_id: None,
    };
    let receipt = committed(service.draw_free(&request, at(1, 9)).await?);
    assert_eq!(receipt.records.len(), 25);
    assert!(!receipt.with_replacement);

    let state = StudentDrawState::from_records(&receipt.records);
    for i in 0..15 {
        assert!(state.count(&format!("卡{i}"), Rarity::Common) <= 2);
    }

    // 5 cards of allowance left, so one more pack fits and the next does not
    let one_more = FreeDrawRequest { mode: DrawMode::Packs { packs: 1 }, ..request.clone() };
    let receipt = committed(service.draw_free(&one_more, at(1, 10)).await?);
    assert!(!receipt.with_replacement);

    match service.draw_free(&one_more, at(1, 11)).await? {
        DrawResult::FullyCollected { .. } => {}
        other => panic!("expected a fully collected pool, got {other:?}"),
    }
    let status = store.student_status("B001").await?.unwrap();
    assert_eq!(status.total_draws, 30);
    Ok(())
}

#[tokio::test]
async fn small_pool_pack_is_filled_with_replacement() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let service = service(store);

    let request = FreeDrawRequest {
        student_id: "B002".into(),
        mode: DrawMode::Packs { packs: 1 },
        pool_tag: Some("羅馬戰士體驗營".into()),
        request_id: None,
    };
    let receipt = committed(service.draw_free(&request, at(1, 9)).await?);
    assert_eq!(receipt.records.len(), 5);
    assert!(receipt.with_replacement);
    assert!(receipt.records.iter().all(|record| record.card_name == "凱撒"));
    Ok(())
}

#[tokio::test]
async fn bad_free_draw_requests_are_rejected() -> Result<()> {
    let service = service(Arc::new(MemoryStore::new()));

    let too_many = FreeDrawRequest {
        student_id: "B003".into(),
        mode: DrawMode::Packs { packs: 6 },
        pool_tag: None,
        request_id: None,
    };
    assert!(matches!(service.draw_free(&too_many, at(1, 9)).await, Err(DrawError::InvalidRequest(_))));

    let unknown_pool = FreeDrawRequest { mode: DrawMode::Single, pool_tag: Some("不存在".into()), ..too_many.clone() };
    assert!(matches!(service.draw_free(&unknown_pool, at(1, 9)).await, Err(DrawError::UnknownPool(_))));

    let blank = FreeDrawRequest { student_id: "  ".into(), mode: DrawMode::Single, ..too_many.clone() };
    assert!(matches!(service.draw_free(&blank, at(1, 9)).await, Err(DrawError::InvalidRequest(_))));

    for student_id in ["../B003", "a/b", "a\\b", "..", "a\nb"] {
        let unsafe_id = FreeDrawRequest { student_id: student_id.into(), mode: DrawMode::Single, ..too_many.clone() };
        assert!(
            matches!(service.draw_free(&unsafe_id, at(1, 9)).await, Err(DrawError::InvalidRequest(_))),
            "{student_id:?} should be rejected"
        );
    }
    assert!(matches!(service.rebuild_snapshot("../B003").await, Err(DrawError::InvalidRequest(_))));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_spend_one_opportunity() -> Result<()> {
    let store = Arc::new(MemoryStore::with_students([student("C001", true, false)]));
    let service = Arc::new(service(store.clone()));

    let handles = (0..8)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move { service.draw_for_opportunity(&homework("C001"), at(1, 9)).await })
        })
        .collect::<Vec<_>>();

    let mut committed_count = 0;
    for handle in handles {
        match handle.await? {
            Ok(DrawResult::Committed(_)) => committed_count += 1,
            Err(DrawError::OpportunityUnavailable { .. }) => {}
            other => panic!("unexpected result {other:?}"),
        }
    }
    assert_eq!(committed_count, 1);
    assert_eq!(store.all_records().await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn leaderboard_and_history_follow_the_store() -> Result<()> {
    let store = Arc::new(MemoryStore::with_students([
        student("D001", true, true),
        student("D002", true, false),
    ]));
    let service = service(store.clone());

    let single = |id: &str| FreeDrawRequest {
        student_id: id.to_string(),
        mode: DrawMode::Single,
        pool_tag: Some("羅馬戰士體驗營".into()),
        request_id: None,
    };
    committed(service.draw_free(&single("D002"), at(1, 9)).await?);
    committed(service.draw_for_opportunity(&homework("D001"), at(1, 9)).await?);
    committed(service.draw_for_opportunity(&OpportunityDrawRequest { kind: OpportunityKind::Progress, ..homework("D001") }, at(1, 9)).await?);

    let board = service.leaderboard().await?;
    assert_eq!(board.len(), 2);
    assert_eq!(board.iter().map(|row| row.rank).collect::<Vec<_>>(), vec![1, 2]);
    assert!(board[0].legendary >= board[1].legendary);

    let roman = board.iter().find(|row| row.student_id == "D002").unwrap();
    assert_eq!((roman.legendary, roman.total_draws), (1, 1));

    let history = service.student_history("D001").await?;
    assert_eq!(history.records.len(), 2);
    assert_eq!(history.summary.iter().map(|c| c.count).sum::<u32>(), 2);
    assert_eq!(history.status.map(|s| s.total_draws), Some(2));
    Ok(())
}

#[tokio::test]
async fn snapshot_is_written_and_merged() -> Result<()> {
    let dir = std::env::temp_dir().join(format!("academy-flow-{}", Uuid::new_v4()));
    let store = Arc::new(MemoryStore::with_students([student("E001", true, true)]));
    let service = service(store).with_exporter(LocalExporter::new(&dir));

    let receipt = committed(service.draw_for_opportunity(&homework("E001"), at(1, 9)).await?);
    let snapshot = receipt.snapshot.expect("snapshot path");
    assert!(snapshot.ends_with("抽卡紀錄_E001_20250601_090000.csv"));
    assert!(receipt.snapshot_error.is_none());

    let merged = service.merge_exports().await?;
    assert_eq!(merged.len(), 1);
    let rows = LocalExporter::read_session(&merged[0])?;
    assert_eq!(rows[0].card_name, receipt.records[0].card_name);

    let rebuilt = service.rebuild_all_snapshots().await?;
    assert_eq!(rebuilt, merged);

    std::fs::remove_dir_all(dir).ok();
    Ok(())
}

#[tokio::test]
async fn snapshot_failure_does_not_undo_the_draw() -> Result<()> {
    // a regular file where the export directory should be
    let blocker = std::env::temp_dir().join(format!("academy-blocker-{}", Uuid::new_v4()));
    std::fs::write(&blocker, b"not a directory")?;

    let store = Arc::new(MemoryStore::with_students([student("E002", true, false)]));
    let service = service(store.clone()).with_exporter(LocalExporter::new(&blocker));

    let receipt = committed(service.draw_for_opportunity(&homework("E002"), at(1, 9)).await?);
    assert!(receipt.snapshot.is_none());
    assert!(receipt.snapshot_error.is_some());
    assert_eq!(store.all_records().await?.len(), 1);

    std::fs::remove_file(blocker).ok();
    Ok(())
}

/// History store that can be told to fail reads or writes.
#[derive(Default)]
struct FlakyHistory {
    inner: MemoryStore,
    fail_load: AtomicBool,
    fail_append: AtomicBool,
}

#[async_trait::async_trait]
impl HistoryStore for FlakyHistory {
    async fn load_history(&self, student_id: &str) -> Result<HistoryLookup, StoreError> {
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("history offline".into()));
        }
        self.inner.load_history(student_id).await
    }

    async fn find_request(&self, request_id: Uuid) -> Result<Vec<DrawRecord>, StoreError> {
        self.inner.find_request(request_id).await
    }

    async fn append(&self, records: &[DrawRecord]) -> Result<usize, StoreError> {
        if self.fail_append.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("history offline".into()));
        }
        self.inner.append(records).await
    }

    async fn student_status(&self, student_id: &str) -> Result<Option<StudentStatus>, StoreError> {
        self.inner.student_status(student_id).await
    }

    async fn students(&self) -> Result<Vec<String>, StoreError> {
        self.inner.students().await
    }

    async fn all_records(&self) -> Result<Vec<DrawRecord>, StoreError> {
        self.inner.all_records().await
    }
}

#[tokio::test]
async fn unreadable_history_is_not_treated_as_empty() -> Result<()> {
    let history = Arc::new(FlakyHistory::default());
    history.fail_load.store(true, Ordering::SeqCst);
    let ledger = Arc::new(MemoryStore::with_students([student("F001", true, false)]));
    let service = DrawService::new(catalog(), DrawConfig::weighted(), history, ledger.clone())?;

    let result = service.draw_for_opportunity(&homework("F001"), at(1, 9)).await;
    assert!(matches!(result, Err(DrawError::Store(StoreError::Unavailable(_)))));

    let entry = ledger.find_student("F001").await?.unwrap();
    assert_eq!(entry.homework_last_draw, None);
    Ok(())
}

#[tokio::test]
async fn failed_append_restores_the_opportunity() -> Result<()> {
    let history = Arc::new(FlakyHistory::default());
    history.fail_append.store(true, Ordering::SeqCst);
    let mut entry = student("F002", true, false);
    entry.homework_last_draw = Some(at(1, 0).date());
    let ledger = Arc::new(MemoryStore::with_students([entry]));
    let service = DrawService::new(catalog(), DrawConfig::weighted(), history.clone(), ledger.clone())?;

    let result = service.draw_for_opportunity(&homework("F002"), at(2, 9)).await;
    assert!(matches!(result, Err(DrawError::Store(_))));

    let entry = ledger.find_student("F002").await?.unwrap();
    assert_eq!(entry.homework_last_draw, Some(at(1, 0).date()));
    assert!(entry.is_available(OpportunityKind::Homework, at(2, 0).date()));

    history.fail_append.store(false, Ordering::SeqCst);
    committed(service.draw_for_opportunity(&homework("F002"), at(2, 9)).await?);
    Ok(())
}
