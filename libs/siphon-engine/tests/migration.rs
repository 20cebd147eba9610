//! End-to-end supervision tests over scripted store connections and real
//! snapshot files.

use redis::Value;
use redis::{ErrorKind as RedisErrorKind, RedisError};

use siphon_api::{ErrorKind, FileEndpoint, Record};
use siphon_engine::connect::StoreConn;
use siphon_engine::run::{Migration, Outcome, RunState};
use siphon_pipeline::bus;
use siphon_pipeline::mock::ScriptedConn;
use siphon_pipeline::{
    ScanOptions, Sink, SnapshotReader, SnapshotWriter, Source, StoreReader, StoreWriter,
};
use tokio_util::sync::CancellationToken;

fn scan_reply(cursor: u64, keys: &[Vec<u8>]) -> Value {
    Value::Array(vec![
        Value::BulkString(cursor.to_string().into_bytes()),
        Value::Array(keys.iter().map(|k| Value::BulkString(k.clone())).collect()),
    ])
}

fn file_endpoint(path: std::path::PathBuf) -> FileEndpoint {
    FileEndpoint { path, max_field: 1024 * 1024 }
}

async fn write_snapshot(endpoint: &FileEndpoint, records: Vec<Record>) {
    let (tx, rx) = bus::bounded(10);
    let writer =
        tokio::spawn(SnapshotWriter::new(endpoint).write(rx, CancellationToken::new()));
    for record in records {
        tx.send(vec![record]).await.unwrap();
    }
    drop(tx);
    writer.await.unwrap().unwrap();
}

async fn read_snapshot(endpoint: &FileEndpoint) -> Vec<Record> {
    let (tx, rx) = bus::bounded(10);
    let reader =
        tokio::spawn(SnapshotReader::new(endpoint).read(tx, CancellationToken::new()));
    let mut records = Vec::new();
    while let Some(batch) = rx.recv().await {
        records.extend(batch);
    }
    reader.await.unwrap().unwrap();
    records
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[tokio::test]
async fn file_to_file_completes() {
    let dir = tempfile::tempdir().unwrap();
    let src = file_endpoint(dir.path().join("src.siphon"));
    let dst = file_endpoint(dir.path().join("dst.siphon"));

    let records = vec![
        Record::new(b"alpha".to_vec(), b"one".to_vec(), 0),
        Record::new(b"beta".to_vec(), vec![0x00, 0xE2, 0xFF], 30_000),
        Record::new(b"gamma".to_vec(), b"three".to_vec(), 0),
    ];
    write_snapshot(&src, records.clone()).await;

    let mut migration = Migration::new(100);
    assert_eq!(migration.state(), RunState::Idle);

    let outcome = migration
        .run(
            Source::<StoreConn>::File(SnapshotReader::new(&src)),
            Sink::<StoreConn>::File(SnapshotWriter::new(&dst)),
            std::future::pending(),
        )
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Completed { records: 3 });
    assert_eq!(migration.state(), RunState::Completed);
    assert_eq!(
        std::fs::read(&dst.path).unwrap(),
        std::fs::read(&src.path).unwrap()
    );
}

#[tokio::test]
async fn store_to_store_migrates_every_key() {
    let keys: Vec<Vec<u8>> = (1..=20).map(|i| format!("key{i}").into_bytes()).collect();
    let dumps: Vec<Value> = (1..=20)
        .map(|i| Value::BulkString(format!("value{i}").into_bytes()))
        .collect();

    let source_conn = ScriptedConn::new();
    source_conn.push_cmd(Ok(scan_reply(0, &keys)));
    source_conn.push_pipe(Ok(dumps));

    let target_conn = ScriptedConn::new();
    target_conn.push_pipe(Ok(vec![Value::Okay; 20]));

    let outcome = Migration::new(100)
        .run(
            Source::Store(StoreReader::new(source_conn, ScanOptions::default())),
            Sink::Store(StoreWriter::new(target_conn.clone(), 1)),
            std::future::pending(),
        )
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Completed { records: 20 });
    let pipes = target_conn.sent_pipes();
    assert_eq!(pipes.len(), 1);
    for i in 1..=20 {
        assert!(contains(&pipes[0], format!("key{i}").as_bytes()));
        assert!(contains(&pipes[0], format!("value{i}").as_bytes()));
    }
    assert!(contains(&pipes[0], b"REPLACE"));
}

#[tokio::test]
async fn store_to_file_to_store_preserves_the_keyspace() {
    let dir = tempfile::tempdir().unwrap();
    let dump_file = file_endpoint(dir.path().join("dump.siphon"));

    let source_conn = ScriptedConn::new();
    source_conn.push_cmd(Ok(scan_reply(0, &[b"k1".to_vec(), b"k2".to_vec()])));
    // DUMP replies, then PTTL replies in the same round trip group.
    source_conn.push_pipe(Ok(vec![
        Value::BulkString(b"v1".to_vec()),
        Value::BulkString(b"v2".to_vec()),
        Value::Int(30_000),
        Value::Int(-1),
    ]));

    let opts = ScanOptions { ttl_sync: true, ..Default::default() };
    let outcome = Migration::new(100)
        .run(
            Source::Store(StoreReader::new(source_conn, opts)),
            Sink::File(SnapshotWriter::new(&dump_file)),
            std::future::pending(),
        )
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Completed { records: 2 });

    let target_conn = ScriptedConn::new();
    target_conn.push_pipe(Ok(vec![Value::Okay; 2]));
    let outcome = Migration::new(100)
        .run(
            Source::File(SnapshotReader::new(&dump_file)),
            Sink::Store(StoreWriter::new(target_conn.clone(), 1)),
            std::future::pending(),
        )
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Completed { records: 2 });

    let pipes = target_conn.sent_pipes();
    assert!(contains(&pipes[0], b"v1"));
    assert!(contains(&pipes[0], b"v2"));
    // The synced TTL survived both hops; the no-expiry key restored with 0.
    assert!(contains(&pipes[0], b"30000"));
}

#[tokio::test]
async fn interrupt_ends_clean_with_complete_triples_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let src = file_endpoint(dir.path().join("src.siphon"));
    let dst = file_endpoint(dir.path().join("dst.siphon"));

    let records: Vec<Record> = (0..200)
        .map(|i| Record::new(format!("key{i}").into_bytes(), vec![b'v'; 32], 0))
        .collect();
    write_snapshot(&src, records).await;

    let mut migration = Migration::new(2);
    let outcome = migration
        .run(
            // One record per send maximizes cancellation points.
            Source::<StoreConn>::File(SnapshotReader::new(&src).with_batch_hint(1)),
            Sink::<StoreConn>::File(SnapshotWriter::new(&dst)),
            async {},
        )
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Cancelled);
    assert_eq!(migration.state(), RunState::Cancelled);

    // Everything accepted before the interrupt was flushed, and no partial
    // triple is observable: the target parses cleanly end to end.
    let written = read_snapshot(&dst).await;
    assert!(written.len() <= 200);
    for record in &written {
        assert_eq!(record.value, vec![b'v'; 32]);
    }
}

#[tokio::test]
async fn missing_source_file_fails_the_migration() {
    let dir = tempfile::tempdir().unwrap();
    let src = file_endpoint(dir.path().join("absent.siphon"));
    let dst = file_endpoint(dir.path().join("dst.siphon"));

    let mut migration = Migration::new(100);
    let err = migration
        .run(
            Source::<StoreConn>::File(SnapshotReader::new(&src)),
            Sink::<StoreConn>::File(SnapshotWriter::new(&dst)),
            std::future::pending(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Codec);
    assert_eq!(migration.state(), RunState::Failed);
}

#[tokio::test]
async fn store_failure_surfaces_the_first_error() {
    let source_conn = ScriptedConn::new();
    source_conn.push_cmd(Err(RedisError::from((
        RedisErrorKind::IoError,
        "connection reset",
    ))));
    let target_conn = ScriptedConn::new();

    let mut migration = Migration::new(100);
    let err = migration
        .run(
            Source::Store(StoreReader::new(source_conn, ScanOptions::default())),
            Sink::Store(StoreWriter::new(target_conn, 2)),
            std::future::pending(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Store);
    assert_eq!(migration.state(), RunState::Failed);
}
