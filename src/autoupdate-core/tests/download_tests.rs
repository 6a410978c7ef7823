//! Installer download tests against a mock file server.

mod common;

use std::sync::Arc;
use std::time::Duration;

use autoupdate_core::{AutoUpdater, DownloadState, ErrorKind, UpdateConfig, UpdateEvent};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{RecordingLauncher, config_for, next_event, remaining_events};

const ASSET_PATH: &str = "/download/v2.0.0/app.AppImage";

fn payload() -> Vec<u8> {
    (0..256 * 1024).map(|i| (i % 251) as u8).collect()
}

async fn serve_asset(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(ASSET_PATH))
        .and(header("accept", "application/octet-stream"))
        .respond_with(response)
        .mount(server)
        .await;
}

fn asset_url(server: &MockServer) -> String {
    format!("{}{ASSET_PATH}", server.uri())
}

/// Mount a chain of `hops` redirects ending at the asset and return its start.
async fn redirect_chain(server: &MockServer, hops: usize) -> String {
    for hop in 0..hops {
        let next = if hop + 1 < hops {
            format!("{}/hop/{}", server.uri(), hop + 1)
        } else {
            asset_url(server)
        };
        Mock::given(method("GET"))
            .and(path(format!("/hop/{hop}")))
            .respond_with(ResponseTemplate::new(302).insert_header("location", next.as_str()))
            .mount(server)
            .await;
    }
    format!("{}/hop/0", server.uri())
}

/// Serve `prefix` of a `total`-byte body, then stall with the connection open.
async fn stalling_server(prefix: Vec<u8>, total: usize) -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let task = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 4096];
        let _ = socket.read(&mut request).await.unwrap();
        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nContent-Length: {total}\r\n\r\n"
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(&prefix).await.unwrap();
        socket.flush().await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
    });
    (format!("http://{addr}/app.AppImage"), task)
}

#[tokio::test]
async fn test_download_writes_file_and_launches_installer() {
    let server = MockServer::start().await;
    serve_asset(&server, ResponseTemplate::new(200).set_body_bytes(payload())).await;

    let dir = tempfile::tempdir().unwrap();
    let launcher = Arc::new(RecordingLauncher::default());
    let config = config_for(&server, "1.0.0").with_download_dir(dir.path());
    let (updater, mut events) = AutoUpdater::with_channel(config).unwrap();
    let updater = updater.with_launcher(launcher.clone());

    let handle = updater
        .download_and_install_update(&asset_url(&server), "app.AppImage")
        .unwrap();
    let path = handle.path().to_path_buf();
    assert!(path.is_absolute());
    assert_eq!(path.file_name().unwrap(), "app.AppImage");

    assert_eq!(handle.wait().await, DownloadState::Finished);
    assert_eq!(updater.download_state(), DownloadState::Finished);
    assert_eq!(std::fs::read(&path).unwrap(), payload());
    assert_eq!(*launcher.launched.lock(), vec![path.clone()]);

    drop(updater);
    let mut all = vec![next_event(&mut events).await];
    all.extend(remaining_events(&mut events).await);

    let progress: Vec<f32> = all
        .iter()
        .filter_map(|event| match event {
            UpdateEvent::DownloadProgress(percent) => Some(*percent),
            _ => None,
        })
        .collect();
    assert!(!progress.is_empty());
    assert!(progress.windows(2).all(|pair| pair[0] <= pair[1]), "{progress:?}");
    assert!(progress.iter().all(|p| (0.0..=100.0).contains(p)));
    assert_eq!(progress.last().copied(), Some(100.0));

    assert!(matches!(all.last(), Some(UpdateEvent::DownloadFinished)));
    assert!(!all.iter().any(|event| matches!(event, UpdateEvent::Error(_))));
}

#[tokio::test]
async fn test_filename_path_components_are_dropped() {
    let server = MockServer::start().await;
    serve_asset(&server, ResponseTemplate::new(200).set_body_bytes(b"tiny".to_vec())).await;

    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&server, "1.0.0").with_download_dir(dir.path());
    let (updater, _events) = AutoUpdater::with_channel(config).unwrap();
    let updater = updater.with_launcher(Arc::new(RecordingLauncher::default()));

    let handle = updater
        .download_and_install_update(&asset_url(&server), "../nested/app.AppImage")
        .unwrap();
    let path = handle.path().to_path_buf();
    assert_eq!(handle.wait().await, DownloadState::Finished);
    assert_eq!(path.parent().unwrap(), std::path::absolute(dir.path()).unwrap());
    assert_eq!(std::fs::read(&path).unwrap(), b"tiny");
}

#[tokio::test]
async fn test_token_is_sent_with_download() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/app/releases/assets/2"))
        .and(header("accept", "application/octet-stream"))
        .and(header("authorization", "token secret-token"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"private".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&server, "1.0.0")
        .with_download_dir(dir.path())
        .with_access_token("secret-token");
    let (updater, _events) = AutoUpdater::with_channel(config).unwrap();
    let updater = updater.with_launcher(Arc::new(RecordingLauncher::default()));

    let url = format!("{}/repos/octo/app/releases/assets/2", server.uri());
    let handle = updater
        .download_and_install_update(&url, "app.AppImage")
        .unwrap();
    let path = handle.path().to_path_buf();
    assert_eq!(handle.wait().await, DownloadState::Finished);
    assert_eq!(std::fs::read(path).unwrap(), b"private");
}

#[tokio::test]
async fn test_launch_failure_is_reported() {
    let server = MockServer::start().await;
    serve_asset(&server, ResponseTemplate::new(200).set_body_bytes(payload())).await;

    let dir = tempfile::tempdir().unwrap();
    let launcher = Arc::new(RecordingLauncher::failing());
    let config = config_for(&server, "1.0.0").with_download_dir(dir.path());
    let (updater, mut events) = AutoUpdater::with_channel(config).unwrap();
    let updater = updater.with_launcher(launcher.clone());

    let handle = updater
        .download_and_install_update(&asset_url(&server), "app.AppImage")
        .unwrap();
    assert_eq!(handle.wait().await, DownloadState::Failed);
    assert_eq!(launcher.launched.lock().len(), 1);

    drop(updater);
    let mut all = vec![next_event(&mut events).await];
    all.extend(remaining_events(&mut events).await);

    let tail: Vec<&UpdateEvent> = all.iter().rev().take(2).collect();
    match tail.as_slice() {
        [UpdateEvent::Error(e), UpdateEvent::DownloadFinished] => {
            assert_eq!(e.kind(), ErrorKind::InstallerLaunchFailed);
        }
        other => panic!("unexpected tail: {other:?}"),
    }
}

#[tokio::test]
async fn test_http_error_keeps_file_and_reports_failure() {
    let server = MockServer::start().await;
    serve_asset(&server, ResponseTemplate::new(500)).await;

    let dir = tempfile::tempdir().unwrap();
    let launcher = Arc::new(RecordingLauncher::default());
    let config = config_for(&server, "1.0.0").with_download_dir(dir.path());
    let (updater, mut events) = AutoUpdater::with_channel(config).unwrap();
    let updater = updater.with_launcher(launcher.clone());

    let handle = updater
        .download_and_install_update(&asset_url(&server), "app.AppImage")
        .unwrap();
    let path = handle.path().to_path_buf();
    assert_eq!(handle.wait().await, DownloadState::Failed);
    assert!(path.exists());
    assert!(launcher.launched.lock().is_empty());

    match next_event(&mut events).await {
        UpdateEvent::Error(e) => {
            assert_eq!(e.kind(), ErrorKind::TransportFailed);
            assert!(e.to_string().contains("500"), "{e}");
        }
        other => panic!("expected an error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_second_download_while_file_open_is_rejected() {
    let server = MockServer::start().await;
    serve_asset(
        &server,
        ResponseTemplate::new(200)
            .set_body_bytes(payload())
            .set_delay(Duration::from_secs(2)),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&server, "1.0.0").with_download_dir(dir.path());
    let (updater, mut events) = AutoUpdater::with_channel(config).unwrap();
    let updater = updater.with_launcher(Arc::new(RecordingLauncher::default()));

    let first = updater
        .download_and_install_update(&asset_url(&server), "app.AppImage")
        .unwrap();
    let state_before = updater.download_state();

    let err = updater
        .download_and_install_update(&asset_url(&server), "other.AppImage")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FileOpen);
    assert!(err.to_string().contains("app.AppImage"), "{err}");
    assert!(!updater.download_state().is_terminal());
    assert!(!state_before.is_terminal());

    match next_event(&mut events).await {
        UpdateEvent::Error(e) => assert_eq!(e.kind(), ErrorKind::FileOpen),
        other => panic!("expected FileOpen, got {other:?}"),
    }

    first.cancel();
    assert_eq!(first.wait().await, DownloadState::Cancelled);
    assert!(!dir.path().join("other.AppImage").exists());
}

#[tokio::test]
async fn test_cancel_leaves_partial_file_and_stops_events() {
    let server = MockServer::start().await;
    serve_asset(
        &server,
        ResponseTemplate::new(200)
            .set_body_bytes(payload())
            .set_delay(Duration::from_secs(2)),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let launcher = Arc::new(RecordingLauncher::default());
    let config = config_for(&server, "1.0.0").with_download_dir(dir.path());
    let (updater, mut events) = AutoUpdater::with_channel(config).unwrap();
    let updater = updater.with_launcher(launcher.clone());

    let handle = updater
        .download_and_install_update(&asset_url(&server), "app.AppImage")
        .unwrap();
    let path = handle.path().to_path_buf();
    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.cancel();

    assert_eq!(handle.wait().await, DownloadState::Cancelled);
    assert_eq!(updater.download_state(), DownloadState::Cancelled);
    assert!(path.exists());
    assert!(launcher.launched.lock().is_empty());

    drop(updater);
    assert!(remaining_events(&mut events).await.is_empty());
}

#[tokio::test]
async fn test_download_can_restart_after_cancel() {
    let server = MockServer::start().await;
    serve_asset(&server, ResponseTemplate::new(200).set_body_bytes(payload())).await;

    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&server, "1.0.0").with_download_dir(dir.path());
    let (updater, _events) = AutoUpdater::with_channel(config).unwrap();
    let updater = updater.with_launcher(Arc::new(RecordingLauncher::default()));

    let first = updater
        .download_and_install_update(&asset_url(&server), "app.AppImage")
        .unwrap();
    first.cancel();
    assert_eq!(first.wait().await, DownloadState::Cancelled);

    let second = updater
        .download_and_install_update(&asset_url(&server), "app.AppImage")
        .unwrap();
    let path = second.path().to_path_buf();
    assert_eq!(second.wait().await, DownloadState::Finished);
    assert_eq!(std::fs::read(path).unwrap(), payload());
}

#[tokio::test]
async fn test_empty_filename_is_rejected() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&server, "1.0.0").with_download_dir(dir.path());
    let (updater, mut events) = AutoUpdater::with_channel(config).unwrap();

    let err = updater
        .download_and_install_update(&asset_url(&server), "")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FileOpen);
    assert_eq!(updater.download_state(), DownloadState::Failed);

    match next_event(&mut events).await {
        UpdateEvent::Error(e) => assert_eq!(e.kind(), ErrorKind::FileOpen),
        other => panic!("expected FileOpen, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unwritable_destination_reports_file_open() {
    let server = MockServer::start().await;
    serve_asset(&server, ResponseTemplate::new(200).set_body_bytes(payload())).await;

    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("does-not-exist");
    let config = config_for(&server, "1.0.0").with_download_dir(&missing);
    let (updater, mut events) = AutoUpdater::with_channel(config).unwrap();
    let updater = updater.with_launcher(Arc::new(RecordingLauncher::default()));

    let handle = updater
        .download_and_install_update(&asset_url(&server), "app.AppImage")
        .unwrap();
    assert_eq!(handle.wait().await, DownloadState::Failed);

    match next_event(&mut events).await {
        UpdateEvent::Error(e) => {
            assert_eq!(e.kind(), ErrorKind::FileOpen);
            assert!(e.to_string().contains("does-not-exist"), "{e}");
        }
        other => panic!("expected FileOpen, got {other:?}"),
    }
}

#[tokio::test]
async fn test_five_redirects_are_followed() {
    let server = MockServer::start().await;
    serve_asset(&server, ResponseTemplate::new(200).set_body_bytes(b"tiny".to_vec())).await;
    let start = redirect_chain(&server, 5).await;

    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&server, "1.0.0").with_download_dir(dir.path());
    let (updater, _events) = AutoUpdater::with_channel(config).unwrap();
    let updater = updater.with_launcher(Arc::new(RecordingLauncher::default()));

    let handle = updater
        .download_and_install_update(&start, "app.AppImage")
        .unwrap();
    let path = handle.path().to_path_buf();
    assert_eq!(handle.wait().await, DownloadState::Finished);
    assert_eq!(std::fs::read(path).unwrap(), b"tiny");
}

#[tokio::test]
async fn test_sixth_redirect_fails_transfer() {
    let server = MockServer::start().await;
    serve_asset(&server, ResponseTemplate::new(200).set_body_bytes(b"tiny".to_vec())).await;
    let start = redirect_chain(&server, 6).await;

    let dir = tempfile::tempdir().unwrap();
    let launcher = Arc::new(RecordingLauncher::default());
    let config = config_for(&server, "1.0.0").with_download_dir(dir.path());
    let (updater, mut events) = AutoUpdater::with_channel(config).unwrap();
    let updater = updater.with_launcher(launcher.clone());

    let handle = updater
        .download_and_install_update(&start, "app.AppImage")
        .unwrap();
    assert_eq!(handle.wait().await, DownloadState::Failed);
    assert!(launcher.launched.lock().is_empty());

    match next_event(&mut events).await {
        UpdateEvent::Error(e) => assert_eq!(e.kind(), ErrorKind::TransportFailed),
        other => panic!("expected an error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_cancel_mid_stream_keeps_received_bytes() {
    let body = payload();
    let (url, server) = stalling_server(body[..4096].to_vec(), body.len()).await;

    let dir = tempfile::tempdir().unwrap();
    let launcher = Arc::new(RecordingLauncher::default());
    let config = UpdateConfig::new("octo/app", "1.0.0")
        .unwrap()
        .with_download_dir(dir.path());
    let (updater, mut events) = AutoUpdater::with_channel(config).unwrap();
    let updater = updater.with_launcher(launcher.clone());

    let handle = updater
        .download_and_install_update(&url, "app.AppImage")
        .unwrap();
    let path = handle.path().to_path_buf();

    match next_event(&mut events).await {
        UpdateEvent::DownloadProgress(percent) => assert!(percent < 100.0, "{percent}"),
        other => panic!("expected progress, got {other:?}"),
    }
    handle.cancel();

    assert_eq!(handle.wait().await, DownloadState::Cancelled);
    assert_eq!(updater.download_state(), DownloadState::Cancelled);
    let written = std::fs::metadata(&path).unwrap().len() as usize;
    assert!(written > 0 && written < body.len(), "{written}");
    assert!(launcher.launched.lock().is_empty());

    server.abort();
    drop(updater);
    for event in remaining_events(&mut events).await {
        match event {
            UpdateEvent::DownloadProgress(percent) => assert!(percent < 100.0, "{percent}"),
            other => panic!("unexpected event after cancel: {other:?}"),
        }
    }
}
