//! Chunked uploads against a mock server

mod common;

use common::{SITE_API, signed_in_client, upload_session};
use site_migrate::upload::{ChunkedUpload, PublishFileType, PublishTarget, UploadState, upload_file};
use site_migrate::{Error, UploadConfig, UploadPhase};
use std::time::Duration;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_initiate(server: &MockServer, session_id: &str) {
    Mock::given(method("POST"))
        .and(path(format!("{SITE_API}/fileUploads")))
        .respond_with(ResponseTemplate::new(201).set_body_string(upload_session(session_id)))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_append(server: &MockServer, session_id: &str, status: u16, times: u64) {
    Mock::given(method("PUT"))
        .and(path(format!("{SITE_API}/fileUploads/{session_id}")))
        .and(body_string_contains("name=\"tableau_file\""))
        .respond_with(ResponseTemplate::new(status))
        .expect(times)
        .mount(server)
        .await;
}

fn datasource_target(name: &str) -> PublishTarget {
    PublishTarget {
        name: name.to_string(),
        project_id: "p-fin".to_string(),
        file_type: PublishFileType::Tdsx,
        show_tabs: false,
        credentials: None,
    }
}

#[tokio::test]
async fn a_file_is_sent_in_chunks_and_published() {
    let server = MockServer::start().await;
    let client = signed_in_client(&server, 100).await;
    mount_initiate(&server, "up-1").await;
    mount_append(&server, "up-1", 200, 4).await;
    Mock::given(method("POST"))
        .and(path(format!("{SITE_API}/datasources")))
        .and(query_param("uploadSessionId", "up-1"))
        .and(query_param("datasourceType", "tdsx"))
        .and(body_string_contains(r#"<datasource name="Orders">"#))
        .and(body_string_contains(r#"<project id="p-fin"/>"#))
        .respond_with(ResponseTemplate::new(201).set_body_string(
            r#"<tsResponse><datasource id="ds-new" name="Orders"/></tsResponse>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::TempDir::new().unwrap();
    let file = dir.path().join("Orders.tdsx");
    std::fs::write(&file, b"0123456789").unwrap();
    let config = UploadConfig {
        chunk_size: 3,
        chunk_delay: Duration::from_millis(1),
    };

    let id = upload_file(&client, &config, &file, &datasource_target("Orders"))
        .await
        .unwrap();

    assert_eq!(id, "ds-new");
    assert_eq!(client.log().error_count(), 0);
}

#[tokio::test]
async fn an_oversized_chunk_is_rejected_locally() {
    let server = MockServer::start().await;
    let client = signed_in_client(&server, 100).await;
    mount_initiate(&server, "up-2").await;
    mount_append(&server, "up-2", 200, 0).await;

    let mut upload = ChunkedUpload::new(&client, 4);
    upload.initiate(10).await.unwrap();
    let err = upload.append_chunk(b"12345").await.unwrap_err();

    assert!(matches!(err, Error::ChunkTooLarge { size: 5, max: 4 }));
    assert_eq!(upload.state(), UploadState::Initiated);
    assert_eq!(upload.session().unwrap().bytes_sent, 0);
}

#[tokio::test]
async fn finalize_waits_for_every_byte() {
    let server = MockServer::start().await;
    let client = signed_in_client(&server, 100).await;
    mount_initiate(&server, "up-3").await;
    mount_append(&server, "up-3", 200, 1).await;
    Mock::given(method("POST"))
        .and(path(format!("{SITE_API}/datasources")))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let mut upload = ChunkedUpload::new(&client, 4);
    upload.initiate(8).await.unwrap();
    upload.append_chunk(b"abcd").await.unwrap();
    let err = upload
        .finalize(&datasource_target("Half"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::UploadProtocol { phase: UploadPhase::Finalize, ref session_id, .. }
            if session_id.as_deref() == Some("up-3")
    ));
    assert_eq!(upload.state(), UploadState::Appending);
}

#[tokio::test]
async fn appending_before_initiate_is_a_protocol_error() {
    let server = MockServer::start().await;
    let client = signed_in_client(&server, 100).await;

    let mut upload = ChunkedUpload::new(&client, 4);
    let err = upload.append_chunk(b"ab").await.unwrap_err();

    assert!(matches!(
        err,
        Error::UploadProtocol { phase: UploadPhase::Append, session_id: None, .. }
    ));
    assert_eq!(upload.state(), UploadState::Idle);
}

#[tokio::test]
async fn a_refused_session_fails_the_upload() {
    let server = MockServer::start().await;
    let client = signed_in_client(&server, 100).await;
    Mock::given(method("POST"))
        .and(path(format!("{SITE_API}/fileUploads")))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let mut upload = ChunkedUpload::new(&client, 4);
    let err = upload.initiate(4).await.unwrap_err();

    assert!(matches!(
        err,
        Error::UploadProtocol { phase: UploadPhase::Initiate, .. }
    ));
    assert_eq!(upload.state(), UploadState::Failed);
    assert!(upload.append_chunk(b"ab").await.is_err());
}

#[tokio::test]
async fn a_failed_finalize_reports_the_orphaned_session() {
    let server = MockServer::start().await;
    let client = signed_in_client(&server, 100).await;
    mount_initiate(&server, "up-4").await;
    mount_append(&server, "up-4", 200, 1).await;
    Mock::given(method("POST"))
        .and(path(format!("{SITE_API}/datasources")))
        .respond_with(ResponseTemplate::new(500).set_body_string("publish failed"))
        .expect(1)
        .mount(&server)
        .await;

    let mut upload = ChunkedUpload::new(&client, 4);
    upload.initiate(2).await.unwrap();
    upload.append_chunk(b"ok").await.unwrap();
    let err = upload
        .finalize(&datasource_target("Orders"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::UploadProtocol { phase: UploadPhase::Finalize, ref session_id, .. }
            if session_id.as_deref() == Some("up-4")
    ));
    assert_eq!(upload.state(), UploadState::Failed);
    assert!(
        client
            .log()
            .error_text()
            .contains("Upload session up-4 orphaned: finalize of 'Orders' failed")
    );
}
