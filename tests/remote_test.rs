//! Integration tests for the remote-control server.

use castbridge::remote::{start_remote_server, PlayerCommand};
use tokio::sync::mpsc;

#[tokio::test]
async fn serves_the_control_page() {
    let (tx, _rx) = mpsc::channel(4);
    let remote = start_remote_server(0, tx).await.unwrap();

    let url = format!("http://127.0.0.1:{}/", remote.addr().port());
    let resp = reqwest::get(&url).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body = resp.text().await.unwrap();
    assert!(body.contains("Cast Remote"));

    remote.stop().await;
}

#[tokio::test]
async fn forwards_playback_commands() {
    let (tx, mut rx) = mpsc::channel(4);
    let remote = start_remote_server(0, tx).await.unwrap();
    let base = format!("http://127.0.0.1:{}", remote.addr().port());

    for (path, expected) in [
        ("/play", PlayerCommand::Play),
        ("/pause", PlayerCommand::Pause),
        ("/next", PlayerCommand::Next),
        ("/prev", PlayerCommand::Prev),
    ] {
        let resp = reqwest::get(format!("{base}{path}")).await.unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(rx.recv().await.unwrap(), expected);
    }

    remote.stop().await;
}

#[tokio::test]
async fn parses_volume_with_bounds() {
    let (tx, mut rx) = mpsc::channel(4);
    let remote = start_remote_server(0, tx).await.unwrap();
    let base = format!("http://127.0.0.1:{}", remote.addr().port());

    let resp = reqwest::get(format!("{base}/volume?val=40")).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(rx.recv().await.unwrap(), PlayerCommand::Volume(40));

    for bad in ["/volume", "/volume?val=150", "/volume?val=loud"] {
        let resp = reqwest::get(format!("{base}{bad}")).await.unwrap();
        assert_eq!(resp.status(), 400);
    }

    remote.stop().await;
}

#[tokio::test]
async fn unknown_commands_return_404() {
    let (tx, _rx) = mpsc::channel(4);
    let remote = start_remote_server(0, tx).await.unwrap();
    let base = format!("http://127.0.0.1:{}", remote.addr().port());

    let resp = reqwest::get(format!("{base}/shuffle")).await.unwrap();
    assert_eq!(resp.status(), 404);

    remote.stop().await;
}
