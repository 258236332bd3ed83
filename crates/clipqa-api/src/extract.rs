//! JSON body extractors that answer malformed input with a 400 `ApiError`.

use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use axum::Json;
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// `Json<T>` whose rejections use the API error envelope.
pub struct ApiJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::bad_request(rejection.body_text())),
        }
    }
}

/// Body that may be omitted. An empty body yields `T::default()`; anything
/// else must parse as `T`.
pub struct OptionalJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for OptionalJson<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
        parse_optional(&bytes).map(Self)
    }
}

fn parse_optional<T: DeserializeOwned + Default>(bytes: &[u8]) -> Result<T, ApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(bytes).map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Cursor {
        id: Option<u64>,
    }

    #[test]
    fn test_blank_body_is_default() {
        assert_eq!(parse_optional::<Cursor>(b"").unwrap(), Cursor::default());
        assert_eq!(parse_optional::<Cursor>(b" \n").unwrap(), Cursor::default());
    }

    #[test]
    fn test_present_body_must_parse() {
        assert_eq!(parse_optional::<Cursor>(br#"{"id":4}"#).unwrap(), Cursor { id: Some(4) });

        let err = parse_optional::<Cursor>(br#"{"id":"abc"}"#).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(ref msg) if msg.starts_with("Invalid JSON body")));
        assert!(parse_optional::<Cursor>(b"not json").is_err());
    }
}
