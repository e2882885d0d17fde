//! # Blob Store Tests
//!
//! Covers the local filesystem backend with a temporary directory and the
//! Azure backend against a mock REST endpoint.

mod common;

use bytes::Bytes;
use common::setup_tracing;
use futures::TryStreamExt;
use qachat::{
    blob::{AzureBlobStore, BlobProperties, BlobStore, ByteRange, LocalBlobStore},
    constants::BLOB_CHUNK_SIZE,
    BlobError,
};
use tempfile::tempdir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sample_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[tokio::test]
async fn test_local_store_reads_ranges() {
    // --- 1. Arrange ---
    setup_tracing();
    let dir = tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("manuals")).unwrap();
    let content = sample_bytes(100);
    std::fs::write(dir.path().join("manuals/guide.pdf"), &content).unwrap();
    let store = LocalBlobStore::new(dir.path());

    // --- 2. Act ---
    let props = store.properties("manuals/guide.pdf").await.unwrap();
    let range = ByteRange::parse("bytes=10-19", 100).unwrap();
    let span = store
        .read_range("manuals/guide.pdf", range.start, range.len())
        .await
        .unwrap();
    let clipped = ByteRange::parse("bytes=95-500", 100).unwrap();
    let tail = store
        .read_range("manuals/guide.pdf", clipped.start, clipped.len())
        .await
        .unwrap();
    let all = store.read_all("manuals/guide.pdf").await.unwrap();

    // --- 3. Assert ---
    assert_eq!(
        props,
        Some(BlobProperties {
            size: 100,
            content_type: None
        })
    );
    assert_eq!(span, Bytes::from(content[10..20].to_vec()));
    assert_eq!(tail, Bytes::from(content[95..].to_vec()));
    assert_eq!(all.len(), 100);
}

#[tokio::test]
async fn test_local_store_missing_and_escaping_names() {
    setup_tracing();
    let dir = tempdir().unwrap();
    let store = LocalBlobStore::new(dir.path().join("root"));
    std::fs::create_dir_all(dir.path().join("root")).unwrap();
    std::fs::write(dir.path().join("secret.txt"), b"secret").unwrap();

    assert_eq!(store.properties("absent.pdf").await.unwrap(), None);
    assert_eq!(store.properties("../secret.txt").await.unwrap(), None);
    assert!(matches!(
        store.read_all("../secret.txt").await,
        Err(BlobError::NotFound(_))
    ));
    assert!(matches!(
        store.stream_chunks("absent.pdf").await,
        Err(BlobError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_local_store_streams_whole_file() {
    // --- 1. Arrange ---
    setup_tracing();
    let dir = tempdir().unwrap();
    let content = sample_bytes(BLOB_CHUNK_SIZE as usize + 1000);
    std::fs::write(dir.path().join("big.bin"), &content).unwrap();
    let store = LocalBlobStore::new(dir.path());

    // --- 2. Act ---
    let chunks: Vec<Bytes> = store
        .stream_chunks("big.bin")
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();

    // --- 3. Assert ---
    assert!(chunks.len() >= 2);
    assert!(chunks.iter().all(|c| c.len() as u64 <= BLOB_CHUNK_SIZE));
    let joined: Vec<u8> = chunks.iter().flat_map(|c| c.iter().copied()).collect();
    assert_eq!(joined, content);
}

#[tokio::test]
async fn test_azure_store_properties_and_ranges() {
    // --- 1. Arrange ---
    setup_tracing();
    let server = MockServer::start().await;
    let content = sample_bytes(100);

    Mock::given(method("HEAD"))
        .and(path("/docs/manuals/guide.pdf"))
        .and(query_param("sig", "abc"))
        .and(header("x-ms-version", "2021-08-06"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/pdf")
                .set_body_bytes(content.clone()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs/manuals/guide.pdf"))
        .and(header("x-ms-range", "bytes=10-19"))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(content[10..20].to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/docs/missing.pdf"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let store = AzureBlobStore::new(&format!("{}/docs", server.uri()), "?sv=2022&sig=abc")
        .unwrap();

    // --- 2. Act ---
    let props = store.properties("manuals/guide.pdf").await.unwrap();
    let span = store.read_range("manuals/guide.pdf", 10, 10).await.unwrap();
    let missing = store.properties("missing.pdf").await.unwrap();

    // --- 3. Assert ---
    let props = props.unwrap();
    assert_eq!(props.size, 100);
    assert_eq!(props.content_type.as_deref(), Some("application/pdf"));
    assert_eq!(span, Bytes::from(content[10..20].to_vec()));
    assert_eq!(missing, None);
}

#[tokio::test]
async fn test_azure_store_streams_in_ranged_chunks() {
    // --- 1. Arrange ---
    setup_tracing();
    let server = MockServer::start().await;
    let size = BLOB_CHUNK_SIZE as usize + 10;
    let content = sample_bytes(size);
    let first_end = BLOB_CHUNK_SIZE - 1;

    Mock::given(method("HEAD"))
        .and(path("/docs/big.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content.clone()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs/big.pdf"))
        .and(header("x-ms-range", format!("bytes=0-{first_end}").as_str()))
        .respond_with(
            ResponseTemplate::new(206).set_body_bytes(content[..BLOB_CHUNK_SIZE as usize].to_vec()),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs/big.pdf"))
        .and(header(
            "x-ms-range",
            format!("bytes={}-{}", BLOB_CHUNK_SIZE, size - 1).as_str(),
        ))
        .respond_with(
            ResponseTemplate::new(206).set_body_bytes(content[BLOB_CHUNK_SIZE as usize..].to_vec()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = AzureBlobStore::new(&format!("{}/docs", server.uri()), "sig=abc").unwrap();

    // --- 2. Act ---
    let chunks: Vec<Bytes> = store
        .stream_chunks("big.pdf")
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();

    // --- 3. Assert ---
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[1].len(), 10);
    let joined: Vec<u8> = chunks.iter().flat_map(|c| c.iter().copied()).collect();
    assert_eq!(joined, content);
}
