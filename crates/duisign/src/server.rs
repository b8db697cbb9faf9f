#![forbid(unsafe_code)]

//! HTTP JSON signing service.
//!
//! POST `/sign` and `/verify` take `{"message": <base64 XML>}` (sign
//! additionally honors `"preserveCounter"`) and answer
//! `{"message": <base64 XML>}` on success or HTTP 400 with
//! `{"error", "errorCode"}` on failure. Verifying an unsigned Response
//! echoes the input.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use base64::Engine;
use duisign_core::{Error, Result};
use duisign_credentials::CredentialStore;
use duisign_dsig::Verified;
use serde::{Deserialize, Serialize};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<CredentialStore>,
}

#[derive(Deserialize)]
pub struct MessageRequest {
    pub message: String,
    #[serde(default, rename = "preserveCounter")]
    pub preserve_counter: bool,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(rename = "errorCode")]
    pub error_code: i32,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/sign", post(handle_sign))
        .route("/verify", post(handle_verify))
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(port: u16, store: Arc<CredentialStore>) -> Result<()> {
    let app = router(AppState { store });
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "server started");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn handle_sign(
    State(state): State<AppState>,
    Json(request): Json<MessageRequest>,
) -> Response {
    match sign_message(&state, &request) {
        Ok(message) => {
            tracing::info!("sign request completed");
            (StatusCode::OK, Json(MessageResponse { message })).into_response()
        }
        Err(e) => {
            tracing::error!("sign request failed: {e}");
            error_response(&e)
        }
    }
}

async fn handle_verify(
    State(state): State<AppState>,
    Json(request): Json<MessageRequest>,
) -> Response {
    match verify_message(&state, &request) {
        Ok(message) => {
            tracing::info!("verify request completed");
            (StatusCode::OK, Json(MessageResponse { message })).into_response()
        }
        Err(e) => {
            tracing::error!("verify request failed: {e}");
            error_response(&e)
        }
    }
}

fn sign_message(state: &AppState, request: &MessageRequest) -> Result<String> {
    let document = decode_message(&request.message)?;
    let (signed, certificate) =
        duisign_dsig::sign(request.preserve_counter, &document, state.store.as_ref())?;
    tracing::info!(serial = %certificate.serial(), "message signed");
    Ok(base64::engine::general_purpose::STANDARD.encode(signed))
}

fn verify_message(state: &AppState, request: &MessageRequest) -> Result<String> {
    let document = decode_message(&request.message)?;
    let encoded = match duisign_dsig::verify(&document, state.store.as_ref())? {
        Verified::Payload(payload) => base64::engine::general_purpose::STANDARD.encode(payload),
        Verified::Unsigned => base64::engine::general_purpose::STANDARD.encode(&document),
    };
    Ok(encoded)
}

fn decode_message(message: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(message)
        .map_err(|e| Error::MalformedXml(format!("message is not valid base64: {e}")))
}

fn error_response(error: &Error) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: error.to_string(),
            error_code: error.exit_code(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use duisign_credentials::{testgen, Credential};

    const REQUEST: &str = r#"<Request xmlns="http://www.dccinterface.co.uk/ServiceUserGateway" schemaVersion="5.1"><Header><RequestID>90-B3-D5-1F-30-01-00-00:00-07-81-D7-00-00-36-CE:1000</RequestID></Header><Body><GeneralInfo/></Body></Request>"#;

    fn state() -> AppState {
        let identity = testgen::identity(80, [0x90, 0xB3, 0xD5, 0x1F, 0x30, 0x01, 0x00, 0x00], 6);
        let credential = Credential {
            business_id: identity.certificate.business_id().unwrap(),
            certificate: identity.certificate,
            key: identity.key,
        };
        let store = CredentialStore::from_credentials(vec![credential]).unwrap();
        AppState {
            store: Arc::new(store),
        }
    }

    fn b64(text: &str) -> String {
        base64::engine::general_purpose::STANDARD.encode(text)
    }

    #[test]
    fn test_sign_then_verify_round_trip() {
        let state = state();
        let signed = sign_message(
            &state,
            &MessageRequest {
                message: b64(REQUEST),
                preserve_counter: true,
            },
        )
        .unwrap();

        let verified = verify_message(
            &state,
            &MessageRequest {
                message: signed,
                preserve_counter: false,
            },
        )
        .unwrap();
        let payload = base64::engine::general_purpose::STANDARD
            .decode(verified)
            .unwrap();
        assert!(String::from_utf8(payload).unwrap().contains("GeneralInfo"));
    }

    #[test]
    fn test_unsigned_response_echoes_input() {
        let state = state();
        let response =
            r#"<Response xmlns="http://www.dccinterface.co.uk/ServiceUserGateway"><Body/></Response>"#;
        let verified = verify_message(
            &state,
            &MessageRequest {
                message: b64(response),
                preserve_counter: false,
            },
        )
        .unwrap();
        assert_eq!(verified, b64(response));
    }

    #[test]
    fn test_invalid_base64_is_rejected() {
        let state = state();
        let result = sign_message(
            &state,
            &MessageRequest {
                message: "not base64!".into(),
                preserve_counter: false,
            },
        );
        assert!(matches!(result, Err(Error::MalformedXml(_))));
    }

    #[test]
    fn test_request_body_field_names() {
        let request: MessageRequest =
            serde_json::from_str(r#"{"message":"AA==","preserveCounter":true}"#).unwrap();
        assert!(request.preserve_counter);
        // preserveCounter is optional and defaults off.
        let request: MessageRequest = serde_json::from_str(r#"{"message":"AA=="}"#).unwrap();
        assert!(!request.preserve_counter);
    }

    #[test]
    fn test_error_body_field_names() {
        let err = Error::MissingSignature("document carries no signature".into());
        let body = serde_json::to_value(ErrorResponse {
            error: err.to_string(),
            error_code: err.exit_code(),
        })
        .unwrap();
        assert_eq!(body["errorCode"], 10);
        assert!(body["error"].as_str().unwrap().contains("no signature"));
    }

    #[test]
    fn test_error_codes_match_process_exit_codes() {
        let state = state();
        let unsigned_request = b64(REQUEST);
        let err = verify_message(
            &state,
            &MessageRequest {
                message: unsigned_request,
                preserve_counter: false,
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::MissingSignature(_)));
        assert_eq!(err.exit_code(), 10);
    }
}
