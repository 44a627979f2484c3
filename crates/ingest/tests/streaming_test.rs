//! Integration tests for streaming ingestion against an in-memory connection.

mod common;

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use common::{CountingFactory, LimitConnection, TempDir, MAX_STREAM_BYTES};
use sluice_ingest::{
    CancellationToken, ConnError, DataFormat, ErrorKind, IngestError, IngestOption, MappingKind,
    Op, Status, StreamingIngestor,
};
use sluice_storage::gzip_all;

fn ingestor(factory: Arc<CountingFactory>) -> StreamingIngestor {
    StreamingIngestor::new("telemetry", "events", factory)
}

#[tokio::test]
async fn stream_succeeds_below_size_limit() {
    let factory = Arc::new(CountingFactory::new());
    let s = ingestor(factory.clone());

    let data = Bytes::from(vec![b'a'; MAX_STREAM_BYTES - 1]);
    let res = s
        .stream(&CancellationToken::new(), data, DataFormat::Csv, None)
        .await
        .unwrap();

    assert_eq!(res.status(), Status::Success);
    let (request, raw) = factory.conn.last();
    assert_eq!(raw.len(), MAX_STREAM_BYTES - 1);
    assert_eq!(request.database, "telemetry");
    assert_eq!(request.table, "events");
    assert_eq!(request.format, DataFormat::Csv);
    assert!(request.client_request_id.starts_with("sluice;"));
}

#[tokio::test]
async fn stream_at_size_limit_surfaces_rejection() {
    let factory = Arc::new(CountingFactory::new());
    let s = ingestor(factory);

    let data = Bytes::from(vec![b'a'; MAX_STREAM_BYTES]);
    let err = s
        .stream(&CancellationToken::new(), data, DataFormat::Csv, None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Backend);
    assert_eq!(err.op(), Op::StreamIngest);
    let IngestError::Backend { source, .. } = err else {
        panic!("expected backend error");
    };
    assert!(matches!(
        source.downcast_ref::<ConnError>(),
        Some(ConnError::Rejected { status: 413, .. })
    ));
}

#[tokio::test]
async fn stream_passes_mapping_reference() {
    let factory = Arc::new(CountingFactory::new());
    let s = ingestor(factory.clone());

    s.stream(
        &CancellationToken::new(),
        Bytes::from_static(b"{\"a\":1}"),
        DataFormat::MultiJson,
        Some("events_json"),
    )
    .await
    .unwrap();

    let (request, raw) = factory.conn.last();
    assert_eq!(request.mapping_ref.as_deref(), Some("events_json"));
    assert_eq!(raw, b"{\"a\":1}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_first_streams_open_one_connection() {
    let factory = Arc::new(CountingFactory::new());
    let s = Arc::new(ingestor(factory.clone()));

    let tasks: Vec<_> = (0..50)
        .map(|i| {
            let s = s.clone();
            tokio::spawn(async move {
                s.stream(
                    &CancellationToken::new(),
                    Bytes::from(format!("{i},row\n")),
                    DataFormat::Csv,
                    None,
                )
                .await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(factory.connects(), 1);
    assert_eq!(factory.conn.writes.lock().unwrap().len(), 50);
    assert!(s.is_connected());
}

#[tokio::test]
async fn failed_connect_is_retried_on_next_call() {
    let factory = Arc::new(CountingFactory::failing());
    let s = ingestor(factory.clone());
    let cancel = CancellationToken::new();

    for _ in 0..2 {
        let err = s
            .stream(&cancel, Bytes::from_static(b"a\n"), DataFormat::Csv, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Backend);
        assert_eq!(err.op(), Op::Connect);
    }
    assert_eq!(factory.connects(), 2);
    assert!(!s.is_connected());
}

#[tokio::test]
async fn plain_file_is_compressed_once() {
    let dir = TempDir::new();
    let path = dir.file("events.csv", b"a,b\n1,2\n");
    let factory = Arc::new(CountingFactory::new());
    let s = ingestor(factory.clone());

    let res = s
        .from_file(&CancellationToken::new(), &path, &[])
        .await
        .unwrap();

    assert_eq!(res.source_path(), path);
    assert!(res.properties().streaming.should_compress);
    let (request, raw) = factory.conn.last();
    assert_eq!(raw, b"a,b\n1,2\n");
    assert_eq!(request.format, DataFormat::Csv);
}

#[tokio::test]
async fn gzip_file_is_not_recompressed() {
    let dir = TempDir::new();
    let gz = gzip_all(sluice_storage::payload(std::io::Cursor::new(
        b"{\"a\":1}\n".to_vec(),
    )))
    .await
    .unwrap();
    let path = dir.file("events.json.gz", &gz);
    let factory = Arc::new(CountingFactory::new());
    let s = ingestor(factory.clone());

    let res = s
        .from_file(&CancellationToken::new(), &path, &[])
        .await
        .unwrap();

    assert!(!res.properties().streaming.should_compress);
    // A single gunzip on the receiving side yields the original content.
    let (request, raw) = factory.conn.last();
    assert_eq!(raw, b"{\"a\":1}\n");
    assert_eq!(request.format, DataFormat::Json);
}

#[tokio::test]
async fn gzip_content_is_detected_without_extension() {
    let dir = TempDir::new();
    let gz = gzip_all(sluice_storage::payload(std::io::Cursor::new(b"a,b\n".to_vec())))
        .await
        .unwrap();
    let path = dir.file("events.csv", &gz);
    let factory = Arc::new(CountingFactory::new());
    let s = ingestor(factory.clone());

    s.from_file(&CancellationToken::new(), &path, &[])
        .await
        .unwrap();

    let (_, raw) = factory.conn.last();
    assert_eq!(raw, b"a,b\n");
}

#[tokio::test]
async fn zip_file_is_rejected() {
    let dir = TempDir::new();
    let path = dir.file("events.zip", b"PK\x03\x04rest");
    let factory = Arc::new(CountingFactory::new());
    let s = ingestor(factory.clone());

    let err = s
        .from_file(&CancellationToken::new(), &path, &[])
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Argument);
    assert_eq!(factory.connects(), 0);
}

#[tokio::test]
async fn remote_reference_is_rejected() {
    let factory = Arc::new(CountingFactory::new());
    let s = ingestor(factory.clone());

    let err = s
        .from_file(&CancellationToken::new(), "s3://lake/events.csv", &[])
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Argument);
    assert_eq!(factory.connects(), 0);
}

#[tokio::test]
async fn reader_is_always_compressed_and_defaults_to_csv() {
    let factory = Arc::new(CountingFactory::new());
    let s = ingestor(factory.clone());

    let res = s
        .from_reader(
            &CancellationToken::new(),
            std::io::Cursor::new(b"x,y\n".to_vec()),
            &[IngestOption::client_request_id("ingest;42")],
        )
        .await
        .unwrap();

    assert!(res.properties().streaming.should_compress);
    let (request, raw) = factory.conn.last();
    assert_eq!(raw, b"x,y\n");
    assert_eq!(request.format, DataFormat::Csv);
    assert_eq!(request.client_request_id, "ingest;42");
}

#[tokio::test]
async fn queued_only_option_is_rejected() {
    let factory = Arc::new(CountingFactory::new());
    let s = ingestor(factory.clone());

    let err = s
        .from_reader(
            &CancellationToken::new(),
            std::io::Cursor::new(b"x\n".to_vec()),
            &[IngestOption::mapping("[]", MappingKind::Csv)],
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Argument);
    assert_eq!(factory.connects(), 0);
}

#[tokio::test]
async fn mapping_kind_must_match_inferred_format() {
    let dir = TempDir::new();
    let path = dir.file("events.csv", b"a,b\n");
    let factory = Arc::new(CountingFactory::new());
    let s = ingestor(factory.clone());

    let err = s
        .from_file(
            &CancellationToken::new(),
            &path,
            &[IngestOption::mapping_ref("m", MappingKind::Json)],
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Argument);
    assert_eq!(factory.connects(), 0);
}

#[tokio::test]
async fn cancelled_token_fails_every_entry_point() {
    let dir = TempDir::new();
    let path = dir.file("events.csv", b"a\n");
    let factory = Arc::new(CountingFactory::new());
    let s = ingestor(factory.clone());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let errors = [
        s.from_file(&cancel, &path, &[]).await.unwrap_err(),
        s.from_reader(&cancel, std::io::Cursor::new(b"a\n".to_vec()), &[])
            .await
            .unwrap_err(),
        s.stream(&cancel, Bytes::from_static(b"a\n"), DataFormat::Csv, None)
            .await
            .unwrap_err(),
    ];

    assert!(errors.iter().all(IngestError::is_cancelled));
    assert_eq!(factory.connects(), 0);
}

#[tokio::test]
async fn cancellation_during_write_is_reported() {
    let factory = Arc::new(CountingFactory::with_connection(LimitConnection {
        hang: true,
        ..Default::default()
    }));
    let s = Arc::new(ingestor(factory));
    let cancel = CancellationToken::new();

    let task = {
        let s = s.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            s.stream(&cancel, Bytes::from_static(b"a\n"), DataFormat::Csv, None)
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();

    let err = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("stream returns after cancel")
        .unwrap()
        .unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(err.op(), Op::StreamIngest);
}
