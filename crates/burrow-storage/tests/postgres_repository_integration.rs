//! Runs against a disposable PostgreSQL container; needs a Docker daemon.
//! `cargo test -p burrow-storage -- --ignored`

use std::time::Duration;

use burrow_core::{DeleteEntry, InsertOutcome, ShortCode, StorageError, UrlRecord};
use burrow_storage::{PostgresConfig, PostgresRepository, ReadRepository, Repository};
use burrow_test_infra::postgres::{PostgresConfig as ServerConfig, PostgresServer};

struct Fixture {
    _postgres: PostgresServer,
    repo: PostgresRepository,
}

impl Fixture {
    async fn start() -> Self {
        let postgres = PostgresServer::new(ServerConfig::builder().build())
            .await
            .expect("start postgres");
        let url = postgres.database_url().await.expect("postgres url");
        let repo = connect_with_retry(&url).await;

        Self {
            _postgres: postgres,
            repo,
        }
    }
}

async fn connect_with_retry(url: &str) -> PostgresRepository {
    let mut last_error = None;

    for _ in 0..20 {
        let config = PostgresConfig::builder()
            .dsn(url)
            .max_connections(5)
            .build();
        match PostgresRepository::connect_with(config).await {
            Ok(repo) => return repo,
            Err(err) => {
                last_error = Some(err);
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }
    }

    panic!("failed to connect postgres: {last_error:?}");
}

fn code(value: &str) -> ShortCode {
    ShortCode::new_unchecked(value)
}

fn record(c: &str, url: &str, owner: &str) -> UrlRecord {
    UrlRecord::new(code(c), url, owner)
}

#[tokio::test]
#[ignore = "requires a docker daemon"]
async fn insert_and_get() {
    let fixture = Fixture::start().await;

    let outcome = fixture
        .repo
        .insert(record("abc", "https://example.com/a", "u1"))
        .await
        .unwrap();
    assert_eq!(outcome, InsertOutcome::Created);

    let got = fixture.repo.get(&code("abc")).await.unwrap();
    assert_eq!(got.original_url, "https://example.com/a");
    assert_eq!(got.owner, "u1");
    assert!(!got.deleted);

    assert!(matches!(
        fixture.repo.get(&code("missing")).await.unwrap_err(),
        StorageError::NotFound(_)
    ));
}

#[tokio::test]
#[ignore = "requires a docker daemon"]
async fn duplicate_original_url_returns_existing_code() {
    let fixture = Fixture::start().await;

    fixture
        .repo
        .insert(record("abc", "https://example.com/a", "u1"))
        .await
        .unwrap();
    let outcome = fixture
        .repo
        .insert(record("xyz", "https://example.com/a", "u2"))
        .await
        .unwrap();

    match outcome {
        InsertOutcome::AlreadyExists(existing) => assert_eq!(existing.code.as_str(), "abc"),
        InsertOutcome::Created => panic!("duplicate must not create a row"),
    }
    assert!(fixture.repo.get(&code("xyz")).await.is_err());
}

#[tokio::test]
#[ignore = "requires a docker daemon"]
async fn taken_short_code_conflicts() {
    let fixture = Fixture::start().await;

    fixture
        .repo
        .insert(record("abc", "https://example.com/a", "u1"))
        .await
        .unwrap();
    let err = fixture
        .repo
        .insert(record("abc", "https://example.com/b", "u1"))
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::Conflict(_)));
}

#[tokio::test]
#[ignore = "requires a docker daemon"]
async fn insert_batch_rolls_back_on_duplicate() {
    let fixture = Fixture::start().await;

    fixture
        .repo
        .insert(record("abc", "https://example.com/a", "u1"))
        .await
        .unwrap();

    let err = fixture
        .repo
        .insert_batch(vec![
            record("b1", "https://example.com/b", "u2"),
            record("b2", "https://example.com/a", "u2"),
        ])
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict(_)));

    assert!(fixture.repo.get(&code("b1")).await.is_err());
    assert_eq!(
        fixture.repo.get(&code("abc")).await.unwrap().owner,
        "u1".to_string()
    );

    fixture
        .repo
        .insert_batch(vec![
            record("b1", "https://example.com/b", "u2"),
            record("b2", "https://example.com/c", "u2"),
        ])
        .await
        .unwrap();
    assert_eq!(fixture.repo.get_by_owner("u2").await.unwrap().len(), 2);
}

#[tokio::test]
#[ignore = "requires a docker daemon"]
async fn delete_batch_flags_only_owned_rows() {
    let fixture = Fixture::start().await;

    fixture
        .repo
        .insert_batch(vec![
            record("a", "https://a.example", "u1"),
            record("b", "https://b.example", "u1"),
            record("c", "https://c.example", "u2"),
        ])
        .await
        .unwrap();

    fixture
        .repo
        .delete_batch(vec![
            DeleteEntry::new(code("a"), "u1"),
            DeleteEntry::new(code("c"), "u1"),
            DeleteEntry::new(code("missing"), "u1"),
            DeleteEntry::new(code("a"), "u1"),
        ])
        .await
        .unwrap();

    assert!(fixture.repo.is_deleted(&code("a")).await.unwrap());
    assert!(!fixture.repo.is_deleted(&code("b")).await.unwrap());
    assert!(!fixture.repo.is_deleted(&code("c")).await.unwrap());
    assert!(matches!(
        fixture.repo.is_deleted(&code("missing")).await.unwrap_err(),
        StorageError::NotFound(_)
    ));

    let owned = fixture.repo.get_by_owner("u1").await.unwrap();
    assert_eq!(owned.len(), 2);
}

#[tokio::test]
#[ignore = "requires a docker daemon"]
async fn ping_and_close() {
    let fixture = Fixture::start().await;

    fixture.repo.ping().await.unwrap();
    fixture.repo.close().await.unwrap();
    fixture.repo.close().await.unwrap();

    assert!(fixture.repo.ping().await.unwrap_err().is_unavailable());
}
