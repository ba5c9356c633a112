//! Route handlers (C11, ambient): agent-card discovery, health check,
//! and the evaluation endpoint that drives C6 and renders its two
//! emitted events into a single JSON response body.

use actix_web::{web, HttpResponse, Responder};
use green_core::ResultEnvelope;
use green_executor::{CancellationToken, EvaluationExecutor, ExecutionEvent, TerminalStatus};
use serde::{Deserialize, Serialize};
use serde_json::json;

pub struct AppState {
    pub executor: EvaluationExecutor,
}

const AGENT_VERSION: &str = "0.0.0";

pub async fn agent_card() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "name": "Green Agent",
        "description": "Scores a test-generation agent's fault detection and mutation-kill rate against reference implementations.",
        "url": "/",
        "version": AGENT_VERSION,
        "capabilities": {
            "streaming": false,
        },
        "skills": [
            {
                "id": "evaluate",
                "name": "evaluate",
                "description": "Run the full test-quality evaluation pipeline against a participant.",
            }
        ],
        "defaultInputModes": ["text"],
        "defaultOutputModes": ["text"],
    }))
}

pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({"status": "ok"}))
}

#[derive(Debug, Deserialize)]
pub struct SendMessageBody {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Serialize)]
struct EvaluationResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<ResultEnvelope>,
}

/// `POST /message:send`. Adapts the inbound body into the participant
/// identifier C6 expects, runs the pipeline to completion, and renders
/// the two events it emits (artifact, then terminal status) into a
/// single JSON object — this crate's minimal stand-in for the full
/// agent-protocol event stream, which is out of scope here.
pub async fn message_send(
    state: web::Data<AppState>,
    body: web::Json<SendMessageBody>,
) -> impl Responder {
    let cancel = CancellationToken::new();
    let mut events = Vec::new();

    state
        .executor
        .execute(&body.message, &cancel, &mut events)
        .await;

    let mut envelope = None;
    let mut status = TerminalStatus::Failed;
    for event in events {
        match event {
            ExecutionEvent::Artifact(e) => envelope = Some(e),
            ExecutionEvent::Status(s) => status = s,
        }
    }

    let response = EvaluationResponse {
        status: match status {
            TerminalStatus::Completed => "completed",
            TerminalStatus::Failed => "failed",
        },
        result: envelope,
    };

    match status {
        TerminalStatus::Completed => HttpResponse::Ok().json(response),
        TerminalStatus::Failed => HttpResponse::InternalServerError().json(response),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, web, App};
    use green_config::Settings;
    use green_purple_client::PurpleAgentClient;
    use std::io::Write;
    use std::time::Duration;

    fn test_state(task_count: usize) -> web::Data<AppState> {
        std::env::set_var("OPENAI_API_KEY", "test-key");
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[config]\ntrack = \"tdd\"\ntask_count = {task_count}\n").unwrap();
        let settings = Settings::from_file(file.path()).unwrap();
        let client = PurpleAgentClient::new("http://127.0.0.1:0", Duration::from_millis(50), 1);
        web::Data::new(AppState {
            executor: EvaluationExecutor::new(settings, client),
        })
    }

    #[actix_web::test]
    async fn health_reports_ok() {
        let app = test::init_service(App::new().route("/health", web::get().to(health))).await;
        let req = test::TestRequest::get().uri("/health").to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["status"], "ok");
    }

    #[actix_web::test]
    async fn agent_card_names_the_agent() {
        let app = test::init_service(
            App::new().route("/.well-known/agent-card.json", web::get().to(agent_card)),
        )
        .await;
        let req = test::TestRequest::get()
            .uri("/.well-known/agent-card.json")
            .to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["name"], "Green Agent");
        assert_eq!(resp["defaultInputModes"][0], "text");
    }

    #[actix_web::test]
    async fn message_send_with_zero_tasks_completes_with_empty_details() {
        let state = test_state(0);
        let app = test::init_service(
            App::new()
                .app_data(state)
                .route("/message:send", web::post().to(message_send)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/message:send")
            .set_json(&json!({"message": "participant-x"}))
            .to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(resp["status"], "completed");
        assert_eq!(resp["result"]["participants"]["agent"], "participant-x");
        assert!(resp["result"]["results"][0]["detail"]["task_details"]
            .as_array()
            .unwrap()
            .is_empty());
    }
}
