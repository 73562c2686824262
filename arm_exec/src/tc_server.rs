//! # Telecommand Server Module
//!
//! This module abstracts over the networking side of the arm executable. The
//! server accepts plans from the decision service and emergency stops from
//! anyone, over HTTP:
//!
//! - `POST /robot` queues a plan and acknowledges immediately, plans are
//!   refused while the arm is stopped
//! - `POST /stop` stops the arm and returns once it has been sent home
//! - `POST /reset` clears a previous stop
//! - `GET /status` reports the safety state and the queue length

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use comms_if::tc::{AckStatus, ArmStatus, PlanRequest, TcAck, TcError};
use log::{error, info, warn};
use std::{future::Future, net::SocketAddr};
use util::session::Saver;

use crate::{
    safety::SafetyCtrl,
    task_queue::{PlanSender, QueueError},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Shared state of the request handlers.
#[derive(Clone)]
pub struct TcState {
    pub queue: PlanSender,

    pub safety: SafetyCtrl,

    /// Archive accepted plans into the session, if set
    pub saver: Option<Saver>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors which can occur in the telecommand server
#[derive(thiserror::Error, Debug)]
pub enum TcServerError {
    #[error("Invalid bind address {0:?}")]
    InvalidAddress(String),

    #[error("Could not bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(std::io::Error),
}

type TcResult = Result<(StatusCode, Json<TcAck>), (StatusCode, Json<TcError>)>;

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Build the telecommand router.
pub fn router(state: TcState) -> Router {
    Router::new()
        .route("/robot", post(post_plan))
        .route("/stop", post(post_stop))
        .route("/reset", post(post_reset))
        .route("/status", get(get_status))
        .with_state(state)
}

/// Serve telecommands on `bind_addr` until `shutdown` resolves.
pub async fn serve<F>(bind_addr: &str, state: TcState, shutdown: F) -> Result<(), TcServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr: SocketAddr = bind_addr
        .parse()
        .map_err(|_| TcServerError::InvalidAddress(bind_addr.to_string()))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| TcServerError::Bind { addr, source })?;

    info!("Telecommand server listening on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(TcServerError::Serve)
}

async fn post_plan(State(state): State<TcState>, body: Bytes) -> TcResult {
    let body = std::str::from_utf8(&body).map_err(|e| reject(StatusCode::BAD_REQUEST, e))?;

    let request = PlanRequest::from_json(body).map_err(|e| {
        warn!("Rejected plan: {}", e);
        reject(StatusCode::BAD_REQUEST, e)
    })?;

    if state.safety.is_stopped() {
        warn!("Rejected plan, the arm is stopped");
        return Err(reject(
            StatusCode::CONFLICT,
            "The arm is stopped, reset it before sending plans",
        ));
    }

    let plan = state.queue.enqueue(request.plan).map_err(|e| match e {
        QueueError::EmptyPlan => reject(StatusCode::BAD_REQUEST, e),
        QueueError::Closed => reject(StatusCode::SERVICE_UNAVAILABLE, e),
    })?;

    info!(
        "Accepted plan {} ({} steps, {} queued)",
        plan.id,
        plan.steps.len(),
        state.queue.len()
    );

    if let Some(ref saver) = state.saver {
        saver.save_with_timestamp("plans/plan.json", plan);
    }

    Ok((StatusCode::ACCEPTED, Json(TcAck::new(AckStatus::Accepted))))
}

async fn post_stop(State(state): State<TcState>) -> TcResult {
    let safety = state.safety.clone();

    // Homing blocks on the serial link and the settle time
    let result = tokio::task::spawn_blocking(move || safety.stop())
        .await
        .map_err(|e| reject(StatusCode::INTERNAL_SERVER_ERROR, e))?;

    match result {
        Ok(()) => Ok((StatusCode::OK, Json(TcAck::new(AckStatus::Stopped)))),
        Err(e) => {
            error!("Arm stopped but could not be homed: {}", e);
            Err(reject(StatusCode::INTERNAL_SERVER_ERROR, e))
        }
    }
}

async fn post_reset(State(state): State<TcState>) -> TcResult {
    state.safety.reset();

    Ok((StatusCode::OK, Json(TcAck::new(AckStatus::Normal))))
}

async fn get_status(State(state): State<TcState>) -> Json<ArmStatus> {
    Json(ArmStatus {
        safety: state.safety.state(),
        queued: state.queue.len(),
    })
}

fn reject<E: std::fmt::Display>(status: StatusCode, error: E) -> (StatusCode, Json<TcError>) {
    (status, Json(TcError::new(error)))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        arm_ctrl::{ArmCtrl, ArmParams},
        serial_link::{sim::SimPort, LinkPort, SerialLink},
        task_queue::{plan_queue, PlanReceiver},
    };
    use axum::{body::Body, http::Request};
    use comms_if::tc::SafetyState;
    use http_body_util::BodyExt;
    use std::{io, sync::Arc, time::Duration};
    use tower::ServiceExt;

    struct BrokenPort;

    impl LinkPort for BrokenPort {
        fn write_frame(&mut self, _frame: &[u8]) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"))
        }
    }

    fn state() -> (TcState, PlanReceiver) {
        state_with(SimPort)
    }

    fn state_with<P: LinkPort + 'static>(port: P) -> (TcState, PlanReceiver) {
        let link = Arc::new(SerialLink::from_port("test".into(), port));
        let arm = Arc::new(ArmCtrl::new(ArmParams::default().without_delays(), link).unwrap());
        let (queue, rx) = plan_queue();

        (
            TcState {
                queue,
                safety: SafetyCtrl::new(arm),
                saver: None,
            },
            rx,
        )
    }

    async fn call(state: &TcState, method: &str, uri: &str, body: &str) -> (StatusCode, String) {
        let response = router(state.clone())
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_plan_accepted() {
        let (state, rx) = state();

        let (status, body) = call(
            &state,
            "POST",
            "/robot",
            r#"{"plan": [{"action": "pick", "x": 10, "z": 20}, {"action": "place", "x": -10, "z": 25}]}"#,
        )
        .await;

        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body, r#"{"status":"accepted"}"#);

        let plan = rx.poll(Duration::from_millis(10)).unwrap().unwrap();
        assert_eq!(plan.steps.len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_plans_rejected() {
        let (state, rx) = state();

        for body in [
            "not json",
            r#"{"steps": []}"#,
            r#"{"plan": "pick"}"#,
            r#"{"plan": []}"#,
            r#"{"plan": [{"action": "dance"}]}"#,
        ]
        .iter()
        {
            let (status, body) = call(&state, "POST", "/robot", body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            let err: TcError = serde_json::from_str(&body).unwrap();
            assert!(!err.error.is_empty());
        }

        // Nothing reached the queue
        assert_eq!(rx.poll(Duration::from_millis(1)), Ok(None));
    }

    #[tokio::test]
    async fn test_closed_queue_unavailable() {
        let (state, _rx) = state();
        state.queue.close();

        let (status, _) = call(&state, "POST", "/robot", r#"{"plan": [{"action": "give"}]}"#).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_stop_reset_status() {
        let (state, _rx) = state();

        let (status, body) = call(&state, "POST", "/stop", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"status":"stopped"}"#);
        assert_eq!(state.safety.state(), SafetyState::Stopped);

        let (_, body) = call(&state, "GET", "/status", "").await;
        let report: ArmStatus = serde_json::from_str(&body).unwrap();
        assert_eq!(report.safety, SafetyState::Stopped);
        assert_eq!(report.queued, 0);

        let (status, body) = call(&state, "POST", "/reset", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"status":"normal"}"#);
        assert_eq!(state.safety.state(), SafetyState::Normal);
    }

    #[tokio::test]
    async fn test_stop_with_dead_link_still_stops() {
        let (state, _rx) = state_with(BrokenPort);

        let (status, body) = call(&state, "POST", "/stop", "").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let err: TcError = serde_json::from_str(&body).unwrap();
        assert!(!err.error.is_empty());

        assert_eq!(state.safety.state(), SafetyState::Stopped);
    }

    #[tokio::test]
    async fn test_plans_refused_while_stopped() {
        let (state, rx) = state();
        let plan = r#"{"plan": [{"action": "pick", "x": 0, "z": 15}]}"#;

        call(&state, "POST", "/stop", "").await;

        let (status, body) = call(&state, "POST", "/robot", plan).await;
        assert_eq!(status, StatusCode::CONFLICT);
        let err: TcError = serde_json::from_str(&body).unwrap();
        assert!(err.error.contains("stopped"));
        assert_eq!(rx.poll(Duration::from_millis(1)), Ok(None));

        call(&state, "POST", "/reset", "").await;

        let (status, _) = call(&state, "POST", "/robot", plan).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert!(rx.poll(Duration::from_millis(10)).unwrap().is_some());
    }
}
