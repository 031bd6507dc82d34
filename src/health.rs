use crate::config::Config;
use crate::db;
use crate::models::item::{
    STATUS_ERROR, STATUS_PENDING, STATUS_READY_DIGESTED, STATUS_READY_PENDING, STATUS_REJECTED,
};
use crate::shutdown;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use diesel::RunQueryDsl;

pub fn start() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("health-pool")
        .enable_all()
        .build()
        .unwrap();

    runtime.block_on(async {
        let token = shutdown::shutdown_token();

        let app = Router::new()
            .route("/healthz", get(healthz))
            .route("/readyz", get(readyz))
            .route("/metrics", get(metrics));

        let address = format!("0.0.0.0:{}", Config::health_port());

        let listener = tokio::net::TcpListener::bind(&address)
            .await
            .unwrap_or_else(|error| panic!("Failed to bind {}: {:?}", address, error));

        log::info!("Health server listening on {}", address);

        if let Err(error) = axum::serve(listener, app)
            .with_graceful_shutdown(async move { token.cancelled().await })
            .await
        {
            log::error!("Health server failed: {:?}", error);
        }
    });
}

async fn healthz() -> &'static str {
    "ok"
}

async fn readyz() -> (StatusCode, &'static str) {
    let ping = tokio::task::spawn_blocking(store_ping).await;

    match ping {
        Ok(true) => (StatusCode::OK, "ready"),
        _ => (StatusCode::SERVICE_UNAVAILABLE, "store unreachable"),
    }
}

async fn metrics() -> (StatusCode, String) {
    match tokio::task::spawn_blocking(collect_metrics).await {
        Ok(Some(body)) => (StatusCode::OK, body),
        _ => (
            StatusCode::SERVICE_UNAVAILABLE,
            "store unreachable".to_string(),
        ),
    }
}

fn store_ping() -> bool {
    let mut connection = match db::pool().get() {
        Ok(connection) => connection,
        Err(_) => return false,
    };

    diesel::sql_query("SELECT 1").execute(&mut connection).is_ok()
}

// The roles are separate processes, so process-local counters would only
// describe this one; every gauge is computed from the shared store instead.
fn collect_metrics() -> Option<String> {
    let mut connection = db::pool().get().ok()?;

    let mut body = String::new();

    body.push_str("# HELP curador_items Items by status.\n");
    body.push_str("# TYPE curador_items gauge\n");

    for status in [
        STATUS_PENDING,
        STATUS_READY_PENDING,
        STATUS_READY_DIGESTED,
        STATUS_REJECTED,
        STATUS_ERROR,
    ] {
        let count = db::items::count_by_status(&mut connection, status).ok()?;

        body.push_str(&format!(
            "curador_items{{status=\"{}\"}} {}\n",
            status, count
        ));
    }

    body.push_str("# HELP curador_raw_messages_unprocessed Raw messages waiting for the pipeline.\n");
    body.push_str("# TYPE curador_raw_messages_unprocessed gauge\n");
    body.push_str(&format!(
        "curador_raw_messages_unprocessed {}\n",
        db::raw_messages::count_unprocessed(&mut connection).ok()?
    ));

    body.push_str("# HELP curador_channels_active Tracked channels the reader polls.\n");
    body.push_str("# TYPE curador_channels_active gauge\n");
    body.push_str(&format!(
        "curador_channels_active {}\n",
        db::channels::count_active(&mut connection).ok()?
    ));

    body.push_str("# HELP curador_discoveries_pending Channel candidates awaiting review.\n");
    body.push_str("# TYPE curador_discoveries_pending gauge\n");
    body.push_str(&format!(
        "curador_discoveries_pending {}\n",
        db::discoveries::count_pending(&mut connection).ok()?
    ));

    body.push_str("# HELP curador_llm_tokens_today Prompt and completion tokens spent today.\n");
    body.push_str("# TYPE curador_llm_tokens_today gauge\n");
    body.push_str(&format!(
        "curador_llm_tokens_today {}\n",
        db::llm_usage::tokens_for_day(&mut connection, db::current_time().date_naive()).ok()?
    ));

    Some(body)
}
