// tests/upload_backends.rs

mod common;
use crate::common::{bf2, init_tracing, with_timeout};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use artifacts_mover::config::{BasicAuth, HttpsAuth, HttpsConfig, ScpConfig, UploadConfig};
use artifacts_mover::errors::{MoverError, UploadError};
use artifacts_mover::types::ArtifactType;
use artifacts_mover::upload::{build_uploaders, join_segments, HttpsUploader, ScpUploader, Uploader};
use artifacts_mover_test_utils::{HttpStub, ServerConfigBuilder};

fn upload_paths() -> BTreeMap<ArtifactType, String> {
    BTreeMap::from([
        (ArtifactType::Bf2Demo, "bf2demos".to_string()),
        (ArtifactType::PrDemo, String::new()),
    ])
}

fn scp_config(key: &Path) -> ScpConfig {
    ScpConfig {
        address: "files.example.org".to_string(),
        port: Some(2222),
        username: "uploader".to_string(),
        private_key_file: key.to_path_buf(),
        base_path: "/var/www/files/".to_string(),
        known_hosts_file: None,
        timeout: Some("2s".to_string()),
    }
}

fn key_file(dir: &Path) -> PathBuf {
    let key = dir.join("id_ed25519");
    std::fs::write(&key, b"not really a key").unwrap();
    key
}

#[test]
fn joins_remote_segments() {
    assert_eq!(join_segments(["/var/www/", "/bf2demos/", "b1.demo"]), "/var/www/bf2demos/b1.demo");
    assert_eq!(join_segments(["", "bf2demos", "b1.demo"]), "bf2demos/b1.demo");
    assert_eq!(join_segments(["/", "", "b1.demo"]), "/b1.demo");
    assert_eq!(
        join_segments(["https://files.example.org/upload/", "bf2demos"]),
        "https://files.example.org/upload/bf2demos"
    );
    assert_eq!(join_segments(["https://files.example.org", ""]), "https://files.example.org");
}

#[test]
fn scp_remote_paths() {
    let dir = tempfile::tempdir().unwrap();
    let key = key_file(dir.path());
    let scp = ScpUploader::new(&scp_config(&key), upload_paths()).unwrap();
    assert_eq!(scp.name(), "scp://files.example.org");
    assert_eq!(scp.address(), "files.example.org:2222");

    assert_eq!(
        scp.remote_path(&bf2("/srv/demos/b1.demo")).unwrap(),
        "/var/www/files/bf2demos/b1.demo"
    );

    // Empty upload_path goes straight into base_path.
    let tracker = artifacts_mover::engine::Artifact::new("/srv/tracker/p1.pr", ArtifactType::PrDemo);
    assert_eq!(scp.remote_path(&tracker).unwrap(), "/var/www/files/p1.pr");
}

#[test]
fn scp_address_may_carry_port() {
    let dir = tempfile::tempdir().unwrap();
    let key = key_file(dir.path());

    let mut cfg = scp_config(&key);
    cfg.address = "files.example.org:2022".to_string();
    cfg.port = None;
    let scp = ScpUploader::new(&cfg, upload_paths()).unwrap();
    assert_eq!(scp.name(), "scp://files.example.org");
    assert_eq!(scp.address(), "files.example.org:2022");

    // An explicit port wins over the one in the address.
    cfg.port = Some(2222);
    assert_eq!(ScpUploader::new(&cfg, upload_paths()).unwrap().address(), "files.example.org:2222");

    cfg.address = "files.example.org".to_string();
    cfg.port = None;
    assert_eq!(ScpUploader::new(&cfg, upload_paths()).unwrap().address(), "files.example.org:22");
}

#[test]
fn scp_requires_existing_private_key_and_valid_timeout() {
    let err = ScpUploader::new(&scp_config(Path::new("/definitely/missing/key")), upload_paths())
        .unwrap_err();
    assert!(matches!(err, MoverError::ConfigError(ref msg) if msg.contains("private key")));

    let locations = ServerConfigBuilder::new()
        .with_type(ArtifactType::Bf2Demo, "/srv/demos")
        .build()
        .types;
    let configs = vec![UploadConfig::Scp(scp_config(Path::new("/definitely/missing/key")))];
    assert!(build_uploaders(&configs, &locations).is_err());

    let dir = tempfile::tempdir().unwrap();
    let mut cfg = scp_config(&key_file(dir.path()));
    cfg.timeout = Some("soon".to_string());
    let err = ScpUploader::new(&cfg, upload_paths()).unwrap_err();
    assert!(matches!(err, MoverError::ConfigError(ref msg) if msg.contains("timeout")));
}

fn local_scp(key: &Path, port: u16) -> ScpUploader {
    let mut cfg = scp_config(key);
    cfg.address = "127.0.0.1".to_string();
    cfg.port = Some(port);
    ScpUploader::new(&cfg, upload_paths()).unwrap()
}

#[tokio::test]
async fn scp_missing_file_fails_before_connecting() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let scp = local_scp(&key_file(dir.path()), 9);

    let err = with_timeout(scp.upload(&bf2(dir.path().join("missing.demo"))))
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::ReadArtifact { .. }), "{err}");
}

#[tokio::test]
async fn scp_unreachable_host_is_an_error() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("b1.demo");
    std::fs::write(&file, b"demo-bytes").unwrap();

    // Grab a free port, then close it again.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let err = with_timeout(local_scp(&key_file(dir.path()), port).upload(&bf2(&file)))
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::Connect { .. }), "{err}");
}

#[tokio::test]
async fn scp_peer_that_is_not_ssh_is_an_error() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("b1.demo");
    std::fs::write(&file, b"demo-bytes").unwrap();

    // Accepts connections and hangs up without an SSH banner.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            drop(socket);
        }
    });

    let err = with_timeout(local_scp(&key_file(dir.path()), port).upload(&bf2(&file)))
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::Ssh { .. }), "{err}");
}

fn https_config(url: String) -> HttpsConfig {
    HttpsConfig {
        url,
        auth: HttpsAuth {
            basic: Some(BasicAuth {
                username: "u".to_string(),
                password: "p".to_string(),
            }),
            headers: BTreeMap::from([("X-Token".to_string(), "abc".to_string())]),
        },
        timeout: Some("10s".to_string()),
    }
}

#[tokio::test]
async fn https_posts_multipart_form() {
    init_tracing();
    let stub = HttpStub::start(200).await;
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("b1.demo");
    std::fs::write(&file, b"demo-bytes").unwrap();

    let https = HttpsUploader::new(&https_config(format!("{}/upload/", stub.url())), upload_paths())
        .unwrap();
    assert_eq!(
        https.endpoint(ArtifactType::Bf2Demo),
        format!("{}/upload/bf2demos", stub.url())
    );

    with_timeout(https.upload(&bf2(&file))).await.unwrap();

    let requests = stub.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert!(request.starts_with("POST /upload/bf2demos HTTP/1.1"), "{request}");

    let lower = request.to_lowercase();
    assert!(lower.contains("content-type: multipart/form-data"), "{request}");
    assert!(lower.contains("authorization: basic dtpw"), "{request}");
    assert!(lower.contains("x-token: abc"), "{request}");
    assert!(request.contains("name=\"artifact\""), "{request}");
    assert!(request.contains("filename=\"b1.demo\""), "{request}");
    assert!(request.contains("demo-bytes"), "{request}");
}

#[tokio::test]
async fn https_non_success_status_is_an_error() {
    init_tracing();
    let stub = HttpStub::start(500).await;
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("b1.demo");
    std::fs::write(&file, b"demo-bytes").unwrap();

    let https = HttpsUploader::new(&https_config(stub.url()), upload_paths()).unwrap();
    let err = with_timeout(https.upload(&bf2(&file))).await.unwrap_err();
    match err {
        UploadError::Status { status, url } => {
            assert_eq!(status.as_u16(), 500);
            assert!(url.ends_with("/bf2demos"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn https_missing_file_fails_before_sending() {
    init_tracing();
    let stub = HttpStub::start(200).await;
    let https = HttpsUploader::new(&https_config(stub.url()), upload_paths()).unwrap();

    let err = with_timeout(https.upload(&bf2("/definitely/missing/b1.demo")))
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::ReadArtifact { .. }));
    assert!(stub.requests().is_empty());
}

#[tokio::test]
async fn https_streams_large_files_completely() {
    init_tracing();
    let stub = HttpStub::start(200).await;
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("big.demo");
    let mut content = vec![b'x'; 512 * 1024];
    content.extend_from_slice(b"END-OF-DEMO");
    std::fs::write(&file, &content).unwrap();

    let https = HttpsUploader::new(&https_config(stub.url()), upload_paths()).unwrap();
    with_timeout(https.upload(&bf2(&file))).await.unwrap();

    let requests = stub.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].contains("filename=\"big.demo\""));
    assert!(requests[0].contains("END-OF-DEMO"));
}
