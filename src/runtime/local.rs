//! Local invoke server.
//!
//! Accepts `POST /invoke` with a gateway request body, feeds it to the event
//! loop through a [`ChannelSource`](crate::runtime::channel::ChannelSource), and
//! answers with the function's response.
//!
//! ```text
//! curl -X POST 127.0.0.1:7000/invoke -H "Content-Type: application/json" -d @request.json
//! ```

use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::runtime::channel::{InvocationSender, InvokeError};
use crate::runtime::event::{GatewayRequest, InvocationEnvelope, InvocationMetadata};
use crate::runtime::source::ErrorReply;

/// State injected into the invoke handler.
#[derive(Clone)]
pub struct LocalState {
    pub sender: InvocationSender,
    pub invocation_timeout: Duration,
}

/// Build the local invoke router.
pub fn router(sender: InvocationSender, invocation_timeout: Duration) -> Router {
    Router::new()
        .route("/invoke", post(invoke_handler))
        .with_state(LocalState {
            sender,
            invocation_timeout,
        })
        .layer(TraceLayer::new_for_http())
}

/// Serve until `shutdown` is cancelled, then finish open requests and return.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Local invoke server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    tracing::info!("Local invoke server stopped");
    Ok(())
}

fn error_reply(status: StatusCode, message: &str, error_type: &str) -> Response {
    (
        status,
        Json(ErrorReply {
            error_message: message.to_string(),
            error_type: error_type.to_string(),
        }),
    )
        .into_response()
}

async fn invoke_handler(
    State(state): State<LocalState>,
    Json(request): Json<GatewayRequest>,
) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let metadata = InvocationMetadata::new(request_id.clone())
        .with_timeout(state.invocation_timeout)
        .with_trace_id(format!("Root=1-{}", Uuid::new_v4().simple()));

    tracing::debug!(request_id = %request_id, path = %request.raw_path, "Local invocation received");

    let invocation = state.sender.invoke(InvocationEnvelope::new(metadata, request));
    match tokio::time::timeout(state.invocation_timeout, invocation).await {
        Ok(Ok(Ok(response))) => (StatusCode::OK, Json(response)).into_response(),
        Ok(Ok(Err(reply))) => (StatusCode::INTERNAL_SERVER_ERROR, Json(reply)).into_response(),
        Ok(Err(InvokeError::Closed)) => error_reply(
            StatusCode::SERVICE_UNAVAILABLE,
            "function host is shutting down",
            "ServiceUnavailable",
        ),
        Ok(Err(InvokeError::Dropped)) => error_reply(
            StatusCode::BAD_GATEWAY,
            "invocation was dropped without a reply",
            "InvocationDropped",
        ),
        Err(_) => {
            tracing::warn!(request_id = %request_id, "Local invocation timed out");
            error_reply(StatusCode::GATEWAY_TIMEOUT, "invocation timed out", "Timeout")
        }
    }
}
