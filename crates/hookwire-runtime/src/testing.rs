//! Test helpers

use axum::Router;
use tokio::net::TcpListener;

/// Serve `app` on an ephemeral local port, returning its base URL
pub(crate) async fn spawn_target(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}
