//! Axum router for the remote control page.

use axum::{
  extract::{Path, State},
  http::{header, StatusCode},
  response::{Html, IntoResponse, Response},
  routing::get,
  Json, Router,
};
use serde_json::json;

use crate::mpv::{MpvClient, MpvCommand, MpvResponse};

/// Shared state threaded through all handlers.
#[derive(Clone)]
pub struct AppState {
  pub client: MpvClient,
}

/// Builds the router with the control page, command and health routes.
pub fn build_router(state: AppState) -> Router {
  Router::new()
    .route("/", get(handle_index))
    .route("/health", get(handle_health))
    .route("/api/{command}", get(handle_command))
    .with_state(state)
}

async fn handle_index() -> Html<String> {
  Html(control_page())
}

fn control_page() -> String {
  let links: String = MpvCommand::ALL
    .iter()
    .map(|cmd| {
      format!(
        "      <li><a href=\"/api/{name}\">{name}</a></li>\n",
        name = cmd.name()
      )
    })
    .collect();

  format!(
    r#"<!doctype html>
<html>
  <head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>mpv remote</title>
  </head>
  <body>
    <h1>Controls</h1>
    <ul>
{links}    </ul>
  </body>
</html>
"#
  )
}

async fn handle_health(State(state): State<AppState>) -> Response {
  let connected = state.client.is_connected();
  let status = if connected {
    StatusCode::OK
  } else {
    StatusCode::SERVICE_UNAVAILABLE
  };
  let body = json!({
    "status": if connected { "ok" } else { "disconnected" },
    "outstanding": state.client.outstanding(),
  });
  (status, Json(body)).into_response()
}

async fn handle_command(State(state): State<AppState>, Path(name): Path<String>) -> Response {
  let Some(cmd) = MpvCommand::by_name(&name) else {
    return (StatusCode::NOT_FOUND, format!("Unknown command: {}", name)).into_response();
  };

  match state.client.execute(cmd).await {
    Ok(line) => {
      log::info!("{}: {}", name, line);
      match MpvResponse::parse(&line) {
        Ok(response) if !response.is_success() => {
          log::warn!("MPV rejected {}: {}", name, response.error);
        }
        Ok(_) => {}
        Err(e) => log::debug!("Unparsed MPV response for {}: {}", name, e),
      }
      (StatusCode::FOUND, [(header::LOCATION, "/")]).into_response()
    }
    Err(e) => {
      log::error!("{} failed: {}", name, e);
      (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
    }
  }
}
