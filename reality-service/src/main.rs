// Copyright (C) 2026 StarHuntingGames
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

mod dynamo;
mod repository;
mod store;

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use lambda_http::run as lambda_run;
use reality_common::Reality;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::{
    dynamo::DynamoRealityStore,
    repository::{InMemoryRealityRepository, RealityRepository},
    store::DocumentRealityRepository,
};

#[derive(Clone)]
struct AppState {
    repository: Arc<dyn RealityRepository>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "reality_service=debug,tower_http=info".to_string()),
        )
        .init();

    let state = AppState {
        repository: init_repository().await,
    };

    let app = build_router(state);

    if std::env::var("AWS_LAMBDA_RUNTIME_API").is_ok() {
        info!("AWS Lambda runtime detected; running reality-service in lambda mode");
        lambda_run(app)
            .await
            .map_err(|e| anyhow::Error::msg(format!("lambda runtime error: {e}")))?;
        return Ok(());
    }

    let bind_addr = parse_bind_addr("REALITY_SERVICE_BIND", "0.0.0.0:3000")?;
    info!(%bind_addr, "reality-service listening");
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn init_repository() -> Arc<dyn RealityRepository> {
    let Some(store) = DynamoRealityStore::from_env().await else {
        warn!("no DynamoDB configuration detected; realities are kept in memory only");
        return Arc::new(InMemoryRealityRepository::new());
    };

    if store.auto_create_table()
        && let Err(error) = store.ensure_table().await
    {
        warn!(error = ?error, "failed to ensure reality table exists");
    }

    Arc::new(DocumentRealityRepository::new(store))
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/reality/{game_id}",
            get(get_reality_handler).put(update_reality_handler),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// `var_name` wins, then a bare `PORT`, then `default`.
fn parse_bind_addr(var_name: &str, default: &str) -> anyhow::Result<SocketAddr> {
    let value = std::env::var(var_name)
        .ok()
        .or_else(|| {
            std::env::var("PORT")
                .ok()
                .map(|port| format!("0.0.0.0:{}", port.trim()))
        })
        .unwrap_or_else(|| default.to_string());
    value.parse().context(format!("invalid {var_name}"))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"ok": true, "service": "reality-service"}))
}

async fn get_reality_handler(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
) -> Result<Json<Reality>, ApiError> {
    // Lookup failures are reported the same way as a missing game.
    let reality = state
        .repository
        .get(&game_id)
        .await
        .map_err(|error| {
            ApiError::not_found(format!("failed to look up game {game_id}: {error:#}"))
        })?
        .ok_or_else(|| ApiError::not_found(format!("game {game_id} not found")))?;

    Ok(Json(reality))
}

async fn update_reality_handler(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let reality: Reality = serde_json::from_slice(&body)
        .map_err(|error| ApiError::bad_request(format!("failed to parse game state: {error}")))?;

    state
        .repository
        .upsert(&game_id, reality)
        .await
        .map_err(|error| ApiError::internal(format!("error saving updated state: {error:#}")))?;

    info!(game_id = %game_id, "reality updated");
    Ok(StatusCode::OK)
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!(status = %self.status, message = %self.message, "request failed");
        (
            self.status,
            Json(serde_json::json!({"error": self.message})),
        )
            .into_response()
    }
}
