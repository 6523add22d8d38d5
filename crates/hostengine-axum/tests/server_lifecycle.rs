//! Boot and graceful shutdown of the full server.

mod common;

use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::oneshot;

use hostengine_axum::serve;
use hostengine_core::EngineConfig;

use common::{closed_port, test_config, test_context};

#[tokio::test]
async fn autostart_then_shutdown_stops_engine() {
    let config = EngineConfig {
        autostart: true,
        ..test_config(closed_port().await)
    };
    let (ctx, launcher, _probe) = test_context(config);
    let status = ctx.status.clone();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let server = tokio::spawn(serve(ctx, listener, async move {
        let _ = shutdown_rx.await;
    }));

    tokio::time::timeout(Duration::from_secs(5), async {
        while !status.is_ready() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("default model never became ready");
    assert_eq!(launcher.launches()[0].spec.model_id, "model-a");

    shutdown_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server did not shut down")
        .unwrap()
        .unwrap();

    assert_eq!(launcher.alive_count(), 0);
    assert!(!status.is_ready());
}

#[tokio::test]
async fn no_autostart_leaves_engine_stopped() {
    let (ctx, launcher, _probe) = test_context(test_config(closed_port().await));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

    serve(ctx, listener, async {}).await.unwrap();

    assert_eq!(launcher.launch_count(), 0);
}
