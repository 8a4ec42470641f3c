use assess_core::model::{AssessmentId, BankItem, BankItemId, FeedbackTiming, TestMode, UserId};
use assess_core::progress::ProgressDocument;
use storage::repository::{BankSource, ProgressKey, ProgressStore, StorageError};
use storage::sqlite::SqliteRepository;

fn bank() -> Vec<BankItem> {
    vec![
        BankItem::new(BankItemId::new("b"), "3+3", "6").unwrap(),
        BankItem::new(BankItemId::new("a"), "2+2", "4").unwrap(),
    ]
}

async fn repo(name: &str) -> SqliteRepository {
    SqliteRepository::open(&format!("sqlite:file:{name}?mode=memory&cache=shared"))
        .await
        .expect("open")
}

#[tokio::test]
async fn sqlite_bank_keeps_seeded_order() {
    let repo = repo("memdb_bank_order").await;
    let assessment = AssessmentId::new("set-1");
    repo.replace_bank(&assessment, &bank()).await.unwrap();

    let fetched = repo.fetch_bank(&assessment, None).await.unwrap();
    assert_eq!(fetched, bank());

    // Reseeding replaces rather than appends.
    repo.replace_bank(&assessment, &bank()[..1]).await.unwrap();
    let fetched = repo.fetch_bank(&assessment, None).await.unwrap();
    assert_eq!(fetched.len(), 1);
}

#[tokio::test]
async fn sqlite_missing_bank_is_not_found() {
    let repo = repo("memdb_bank_missing").await;
    let err = repo
        .fetch_bank(&AssessmentId::new("missing"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn sqlite_progress_upserts_per_user() {
    let repo = repo("memdb_progress").await;
    let alice = ProgressKey::new(AssessmentId::new("set-1"), UserId::new("alice"));
    let bob = ProgressKey::new(AssessmentId::new("set-1"), UserId::new("bob"));

    assert!(repo.load_progress(&alice).await.unwrap().is_none());

    let first = ProgressDocument {
        questions_order: Some(vec![1, 0]),
        selected_answers: Some(vec![Some("6".into()), None]),
        test_mode: Some(TestMode::MultipleChoice),
        ..ProgressDocument::default()
    };
    repo.save_progress(&alice, &first).await.unwrap();

    let second = ProgressDocument {
        feedback_mode: Some(FeedbackTiming::End),
        done: Some(true),
        score: Some(1),
        ..first.clone()
    };
    repo.save_progress(&alice, &second).await.unwrap();

    assert_eq!(repo.load_progress(&alice).await.unwrap(), Some(second));
    assert!(repo.load_progress(&bob).await.unwrap().is_none());
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let repo = repo("memdb_migrate_twice").await;
    repo.migrate().await.expect("second migrate");
}
