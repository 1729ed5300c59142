use std::convert::Infallible;

use serde_json::{json, Value};
use warp::{
    filters::body::BodyDeserializeError,
    http::StatusCode,
    reject::{self, Reject, Rejection},
    Reply,
};

use crate::{
    error::{QueryError, TypeError, ValidationError},
    middleware::Unauthorized,
};

/// Every failure a handler can end with.
#[derive(Debug)]
pub enum ApiRejection {
    Status { code: u16, info: Option<String> },
    Validation(ValidationError),
}

impl Reject for ApiRejection {}

impl From<potion::Error> for ApiRejection {
    fn from(value: potion::Error) -> Self {
        ApiRejection::Status {
            code: u16::try_from(value.code).unwrap_or(500),
            info: value.info,
        }
    }
}

impl From<QueryError> for ApiRejection {
    fn from(value: QueryError) -> Self {
        potion::Error::from(value).into()
    }
}

impl From<TypeError> for ApiRejection {
    fn from(value: TypeError) -> Self {
        potion::Error::from(value).into()
    }
}

impl From<ValidationError> for ApiRejection {
    fn from(value: ValidationError) -> Self {
        ApiRejection::Validation(value)
    }
}

pub fn reject<E: Into<ApiRejection>>(error: E) -> Rejection {
    reject::custom(error.into())
}

fn status_body(code: u16, info: Option<&str>) -> (StatusCode, Value) {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = match status {
        StatusCode::NOT_FOUND => json!({ "detail": info.unwrap_or("Not found.") }),
        StatusCode::FORBIDDEN => json!({ "detail": info.unwrap_or("Forbidden.") }),
        s if s.is_server_error() => json!({ "errors": "Internal server error" }),
        _ => json!({ "errors": info.unwrap_or("Bad request") }),
    };
    (status, body)
}

/// Renders rejections as JSON bodies with the matching status.
pub async fn recover(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, body) = if let Some(rejection) = err.find::<ApiRejection>() {
        match rejection {
            ApiRejection::Status { code, info } => status_body(*code, info.as_deref()),
            ApiRejection::Validation(e) => (StatusCode::BAD_REQUEST, e.to_json()),
        }
    } else if err.find::<Unauthorized>().is_some() {
        (
            StatusCode::UNAUTHORIZED,
            json!({ "detail": "Authentication credentials were not provided." }),
        )
    } else if let Some(e) = err.find::<BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, json!({ "errors": e.to_string() }))
    } else if err.find::<reject::PayloadTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            json!({ "errors": "Request body is too large" }),
        )
    } else if err.find::<reject::UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            json!({ "errors": "Expected a JSON body" }),
        )
    } else if err.find::<reject::LengthRequired>().is_some() {
        (
            StatusCode::LENGTH_REQUIRED,
            json!({ "errors": "Content-Length header is required" }),
        )
    } else if err.find::<reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            json!({ "detail": "Method not allowed." }),
        )
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, json!({ "detail": "Not found." }))
    } else {
        log::error!("Unhandled rejection: {err:?}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "errors": "Internal server error" }),
        )
    };

    Ok(warp::reply::with_status(warp::reply::json(&body), status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{bad_request, forbidden};

    #[test]
    fn maps_potion_codes() {
        let (status, body) = match ApiRejection::from(forbidden("Not yours")) {
            ApiRejection::Status { code, info } => status_body(code, info.as_deref()),
            ApiRejection::Validation(_) => unreachable!(),
        };
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, json!({ "detail": "Not yours" }));

        let (status, body) = match ApiRejection::from(bad_request("Already subscribed")) {
            ApiRejection::Status { code, info } => status_body(code, info.as_deref()),
            ApiRejection::Validation(_) => unreachable!(),
        };
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "errors": "Already subscribed" }));
    }

    #[test]
    fn hides_internal_details() {
        let (status, body) = status_body(500, Some("relation \"recipes\" does not exist"));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "errors": "Internal server error" }));
    }
}
