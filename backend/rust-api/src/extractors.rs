use axum::{
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use validator::Validate;

fn bad_request(message: String) -> Response {
    tracing::warn!("{}", message);
    let body = json!({
        "message": message,
        "status": 400
    });
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

/// JSON body extractor that answers malformed payloads with the API's JSON
/// error shape and runs the payload's `validator` rules before the handler.
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: serde::de::DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| {
                bad_request(format!("Failed to parse JSON request body: {}", rejection))
            })?;

        value
            .validate()
            .map_err(|errors| bad_request(format!("Invalid request: {}", errors)))?;

        Ok(ValidatedJson(value))
    }
}
