// tests/config_validation.rs

use std::path::PathBuf;
use std::time::Duration;

use artifacts_mover::config::{
    load_and_validate, validate_config, ConfigFile, RawConfigFile, UploadConfig,
    DEFAULT_ROUND_TIMEOUT,
};
use artifacts_mover::errors::MoverError;
use artifacts_mover::types::{parse_duration, ArtifactType};
use artifacts_mover_test_utils::{ConfigFileBuilder, ServerConfigBuilder};

fn parse(toml_src: &str) -> Result<ConfigFile, MoverError> {
    let raw: RawConfigFile = toml::from_str(toml_src)?;
    ConfigFile::try_from(raw)
}

fn config_error(toml_src: &str) -> String {
    match parse(toml_src) {
        Err(MoverError::ConfigError(msg)) => msg,
        other => panic!("expected a config error, got {other:?}"),
    }
}

const FULL: &str = r#"
failed_upload_path = "/var/lib/mover/failed"

[servers.main]
round_timeout = "90m"

[servers.main.types.bf2demo]
location = "/srv/bf2/demos"
upload_path = "bf2demos"
move_path = "/srv/bf2/archive"

[servers.main.types.prdemo]
location = "/srv/bf2/tracker"
upload_path = "tracker"

[[servers.main.upload]]
kind = "scp"
address = "files.example.org"
port = 2222
username = "uploader"
private_key_file = "/etc/mover/id_ed25519"
base_path = "/var/www/files"
known_hosts_file = "/etc/mover/known_hosts"
timeout = "20s"

[[servers.main.upload]]
kind = "https"
url = "https://files.example.org/upload"
timeout = "5m"
[servers.main.upload.auth.basic]
username = "u"
password = "p"
[servers.main.upload.auth.headers]
X-Token = "abc"

[servers.main.notify]
webhook_url = "https://hooks.example.org/xyz"
[servers.main.notify.urls]
bf2demo = "https://files.example.org/bf2demos"

[servers.training.types.bf2demo]
location = "/srv/training/demos"

[[servers.training.upload]]
kind = "https"
url = "http://127.0.0.1:8080"
"#;

#[test]
fn full_example_parses() {
    let cfg = parse(FULL).unwrap();
    assert_eq!(cfg.failed_upload_path, PathBuf::from("/var/lib/mover/failed"));
    assert_eq!(cfg.servers.len(), 2);

    let main = &cfg.servers["main"];
    assert_eq!(main.round_timeout, Some(Duration::from_secs(90 * 60)));
    assert_eq!(
        main.types.keys().copied().collect::<Vec<_>>(),
        vec![ArtifactType::Bf2Demo, ArtifactType::PrDemo]
    );
    assert!(!main.bf2demo_only());
    assert_eq!(
        main.types[&ArtifactType::Bf2Demo].move_path,
        Some(PathBuf::from("/srv/bf2/archive"))
    );
    assert_eq!(main.types[&ArtifactType::PrDemo].move_path, None);

    assert_eq!(main.upload.len(), 2);
    match &main.upload[0] {
        UploadConfig::Scp(scp) => {
            assert_eq!(scp.port, Some(2222));
            assert_eq!(scp.known_hosts_file, Some(PathBuf::from("/etc/mover/known_hosts")));
            assert_eq!(scp.timeout.as_deref(), Some("20s"));
        }
        other => panic!("expected scp, got {other:?}"),
    }
    match &main.upload[1] {
        UploadConfig::Https(https) => {
            assert_eq!(https.auth.basic.as_ref().unwrap().username, "u");
            assert_eq!(https.auth.headers["X-Token"], "abc");
        }
        other => panic!("expected https, got {other:?}"),
    }
    assert_eq!(main.upload[1].kind(), "https");

    let training = &cfg.servers["training"];
    assert!(training.bf2demo_only());
    assert_eq!(training.round_timeout, Some(DEFAULT_ROUND_TIMEOUT));
    assert!(training.notify.is_none());
}

#[test]
fn zero_round_timeout_disables_timer() {
    let cfg = parse(
        r#"
[servers.a]
round_timeout = "0s"
[servers.a.types.summary]
location = "/x"
[[servers.a.upload]]
kind = "https"
url = "https://example.org"
"#,
    )
    .unwrap();
    assert_eq!(cfg.servers["a"].round_timeout, None);
    assert_eq!(cfg.failed_upload_path, PathBuf::from("./failed"));
}

#[test]
fn rejects_missing_servers() {
    let msg = config_error("failed_upload_path = \"/tmp/failed\"\n");
    assert!(msg.contains("at least one [servers.<name>]"), "{msg}");
}

#[test]
fn rejects_server_without_types() {
    let msg = config_error(
        r#"
[servers.a]
[[servers.a.upload]]
kind = "https"
url = "https://example.org"
"#,
    );
    assert!(msg.contains("[servers.a.types.<type>]"), "{msg}");
}

#[test]
fn rejects_server_without_backends() {
    let msg = config_error(
        r#"
[servers.a.types.bf2demo]
location = "/x"
"#,
    );
    assert!(msg.contains("[[servers.a.upload]]"), "{msg}");
}

#[test]
fn rejects_unknown_artifact_type() {
    let msg = config_error(
        r#"
[servers.a.types.screenshot]
location = "/x"
[[servers.a.upload]]
kind = "https"
url = "https://example.org"
"#,
    );
    assert!(msg.contains("unknown artifact type: screenshot"), "{msg}");
}

#[test]
fn type_names_match_exactly() {
    let msg = config_error(
        r#"
[servers.main.types.bf2demo]
location = "/srv/a"
[servers.main.types.BF2Demo]
location = "/srv/b"
[[servers.main.upload]]
kind = "https"
url = "https://example.org"
"#,
    );
    assert!(msg.contains("unknown artifact type: BF2Demo"), "{msg}");

    assert_eq!("prdemo".parse::<ArtifactType>(), Ok(ArtifactType::PrDemo));
    assert!("PrDemo".parse::<ArtifactType>().is_err());
    assert!(" summary".parse::<ArtifactType>().is_err());
}

#[test]
fn rejects_shared_watch_directory() {
    let msg = config_error(
        r#"
[servers.a.types.bf2demo]
location = "/srv/demos"
[[servers.a.upload]]
kind = "https"
url = "https://example.org"

[servers.b.types.prdemo]
location = "/srv/./demos/"
[[servers.b.upload]]
kind = "https"
url = "https://example.org"
"#,
    );
    assert!(msg.contains("is used by both"), "{msg}");
}

#[test]
fn rejects_bad_durations_and_urls() {
    let msg = config_error(
        r#"
[servers.a]
round_timeout = "soon"
[servers.a.types.bf2demo]
location = "/x"
[[servers.a.upload]]
kind = "https"
url = "https://example.org"
"#,
    );
    assert!(msg.contains("round_timeout"), "{msg}");

    let msg = config_error(
        r#"
[servers.a.types.bf2demo]
location = "/x"
[[servers.a.upload]]
kind = "https"
url = "ftp://example.org"
"#,
    );
    assert!(msg.contains("http://"), "{msg}");

    let msg = config_error(
        r#"
[servers.a.types.bf2demo]
location = "/x"
[[servers.a.upload]]
kind = "https"
url = "https://example.org"
timeout = "10 parsecs"
"#,
    );
    assert!(msg.contains("timeout"), "{msg}");
}

#[test]
fn rejects_incomplete_scp_backend_and_bad_notify_keys() {
    let msg = config_error(
        r#"
[servers.a.types.bf2demo]
location = "/x"
[[servers.a.upload]]
kind = "scp"
address = ""
username = "u"
private_key_file = "/k"
"#,
    );
    assert!(msg.contains("scp"), "{msg}");

    let msg = config_error(
        r#"
[servers.a.types.bf2demo]
location = "/x"
[[servers.a.upload]]
kind = "scp"
address = "files.example.org"
username = "u"
private_key_file = "/k"
timeout = "forever"
"#,
    );
    assert!(msg.contains("invalid scp timeout"), "{msg}");

    let msg = config_error(
        r#"
[servers.a.types.bf2demo]
location = "/x"
[[servers.a.upload]]
kind = "https"
url = "https://example.org"
[servers.a.notify]
webhook_url = "https://hooks.example.org"
[servers.a.notify.urls]
replay = "https://files.example.org"
"#,
    );
    assert!(msg.contains("notify.urls"), "{msg}");
}

#[test]
fn unknown_backend_kind_is_a_toml_error() {
    let err = parse(
        r#"
[servers.a.types.bf2demo]
location = "/x"
[[servers.a.upload]]
kind = "ftp"
url = "ftp://example.org"
"#,
    )
    .unwrap_err();
    assert!(matches!(err, MoverError::TomlError(_)));
}

#[test]
fn load_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ArtifactsMover.toml");
    std::fs::write(&path, FULL).unwrap();

    let cfg = load_and_validate(&path).unwrap();
    assert_eq!(cfg.servers.len(), 2);

    let missing = load_and_validate(dir.path().join("nope.toml")).unwrap_err();
    assert!(matches!(missing, MoverError::IoError(_)));
}

#[test]
fn builder_configs_validate() {
    let cfg = ConfigFileBuilder::new()
        .failed_upload_path("/tmp/failed")
        .with_server(
            "main",
            ServerConfigBuilder::new()
                .with_type(ArtifactType::Bf2Demo, "/srv/demos")
                .with_https("https://example.org")
                .raw(),
        )
        .build();
    validate_config(&cfg).unwrap();

    let mut broken = cfg.clone();
    broken.servers.get_mut("main").unwrap().upload.clear();
    assert!(matches!(
        validate_config(&broken),
        Err(MoverError::ConfigError(_))
    ));
}

#[test]
fn duration_strings() {
    assert_eq!(parse_duration("100ms").unwrap(), Duration::from_millis(100));
    assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
    assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
    assert_eq!(parse_duration("4h").unwrap(), Duration::from_secs(4 * 3600));
    assert!(parse_duration("").is_err());
    assert!(parse_duration("10").is_err());
    assert!(parse_duration("10d").is_err());

    let err = parse_duration("99999999999999999h").unwrap_err();
    assert!(err.contains("too large"), "{err}");
    assert!(parse_duration("99999999999999999m").is_err());
    assert_eq!(
        parse_duration("18446744073709551615s").unwrap(),
        Duration::from_secs(u64::MAX)
    );
}
