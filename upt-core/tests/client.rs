use serde_json::json;
use upt_core::{DiskClient, EntryKind, RemoteStore, StoreError};
use wiremock::matchers::{body_bytes, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> DiskClient {
    DiskClient::with_base_url(&server.uri(), "test-token").unwrap()
}

#[tokio::test]
async fn list_entries_pages_through_embedded_items() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/disk/resources"))
        .and(query_param("path", "disk:/Docs"))
        .and(query_param("offset", "0"))
        .and(header("authorization", "OAuth test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_embedded": {
                "limit": 100,
                "offset": 0,
                "total": 3,
                "items": [
                    { "path": "disk:/Docs/A.txt", "name": "A.txt", "type": "file", "size": 1 },
                    { "path": "disk:/Docs/B", "name": "B", "type": "dir" }
                ]
            }
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/disk/resources"))
        .and(query_param("path", "disk:/Docs"))
        .and(query_param("offset", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_embedded": {
                "limit": 100,
                "offset": 2,
                "total": 3,
                "items": [
                    { "path": "disk:/Docs/C.bin", "name": "C.bin", "type": "file", "size": 7 }
                ]
            }
        })))
        .mount(&server)
        .await;

    let entries = client(&server).list_entries("disk:/Docs").await.unwrap();

    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].name, "A.txt");
    assert_eq!(entries[0].size, Some(1));
    assert_eq!(entries[1].kind, EntryKind::Dir);
    assert_eq!(entries[2].size, Some(7));
}

#[tokio::test]
async fn list_entries_maps_404_to_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/disk/resources"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": "DiskNotFoundError"
        })))
        .mount(&server)
        .await;

    let err = client(&server).list_entries("disk:/gone").await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(ref p) if p == "disk:/gone"));
}

#[tokio::test]
async fn make_directory_uses_put() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/v1/disk/resources"))
        .and(query_param("path", "disk:/Docs/New"))
        .and(header("authorization", "OAuth test-token"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "href": "https://cloud-api.yandex.net/v1/disk/resources?path=disk%3A%2FDocs%2FNew",
            "method": "GET",
            "templated": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    client(&server).make_directory("disk:/Docs/New").await.unwrap();
}

#[tokio::test]
async fn make_directory_tolerates_existing_directory() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/v1/disk/resources"))
        .and(query_param("path", "disk:/Docs"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error": "DiskPathPointsToExistentDirectoryError"
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/disk/resources"))
        .and(query_param("path", "disk:/Docs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "path": "disk:/Docs",
            "name": "Docs",
            "type": "dir"
        })))
        .mount(&server)
        .await;

    client(&server).make_directory("disk:/Docs").await.unwrap();
}

#[tokio::test]
async fn make_directory_reports_conflict_with_file() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/v1/disk/resources"))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/disk/resources"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "path": "disk:/Docs",
            "name": "Docs",
            "type": "file",
            "size": 2
        })))
        .mount(&server)
        .await;

    let err = client(&server).make_directory("disk:/Docs").await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
}

#[tokio::test]
async fn store_file_puts_bytes_to_upload_link() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/disk/resources/upload"))
        .and(query_param("path", "disk:/Docs/A.txt"))
        .and(query_param("overwrite", "true"))
        .and(header("authorization", "OAuth test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "href": format!("{}/upload/a", server.uri()),
            "method": "PUT",
            "templated": false
        })))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/upload/a"))
        .and(body_bytes(b"payload"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .store_file("disk:/Docs/A.txt", b"payload".to_vec())
        .await
        .unwrap();
}

#[tokio::test]
async fn read_file_follows_download_link() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/disk/resources/download"))
        .and(query_param("path", "disk:/Docs/A.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "href": format!("{}/download/a", server.uri()),
            "method": "GET",
            "templated": false
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/download/a"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello"))
        .mount(&server)
        .await;

    let bytes = client(&server).read_file("disk:/Docs/A.txt").await.unwrap();
    assert_eq!(bytes, b"hello");
}

#[tokio::test]
async fn delete_file_returns_on_no_content() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/v1/disk/resources"))
        .and(query_param("path", "disk:/Docs/old.txt"))
        .and(query_param("permanently", "true"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client(&server).delete_file("disk:/Docs/old.txt").await.unwrap();
}

#[tokio::test]
async fn delete_file_waits_for_async_operation() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/v1/disk/resources"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "href": format!("{}/v1/disk/operations/7", server.uri()),
            "method": "GET",
            "templated": false
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/disk/operations/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "success" })))
        .expect(1)
        .mount(&server)
        .await;

    client(&server).delete_file("disk:/Docs/big").await.unwrap();
}

#[tokio::test]
async fn delete_file_reports_failed_operation() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/v1/disk/resources"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "href": format!("{}/v1/disk/operations/8", server.uri()),
            "method": "GET",
            "templated": false
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/disk/operations/8"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "failure" })))
        .mount(&server)
        .await;

    let err = client(&server).delete_file("disk:/Docs/big").await.unwrap_err();
    assert!(matches!(err, StoreError::OperationFailed(_)));
}

#[tokio::test]
async fn delete_missing_file_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/v1/disk/resources"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client(&server).delete_file("disk:/missing").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn api_errors_are_classified() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/disk/resources"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .mount(&server)
        .await;

    let err = client(&server).list_entries("disk:/").await.unwrap_err();
    assert!(matches!(err, StoreError::Api { ref body, .. } if body == "busy"));
    assert!(err.is_retryable());
}
