use warp::{
    reject::{self, Rejection},
    Filter,
};

use super::jwt::{SessionData, SessionKeys};

#[derive(Debug)]
pub struct Unauthorized;

impl reject::Reject for Unauthorized {}

/// Accepts `Token <jwt>` as well as `Bearer <jwt>`.
fn parse_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    match scheme {
        "Token" | "Bearer" => Some(token.trim()),
        _ => None,
    }
}

fn session_from_header(keys: &SessionKeys, header: Option<String>) -> Option<SessionData> {
    header
        .as_deref()
        .and_then(parse_token)
        .and_then(|token| keys.verify_jwt_session(token).ok())
        .map(SessionData::from)
}

pub fn with_session(
    keys: SessionKeys,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let session = session_from_header(&keys, header);
        async move { session.ok_or_else(|| warp::reject::custom(Unauthorized)) }
    })
}

/// Anonymous callers and callers with a stale token both resolve to `None`.
pub fn with_possible_session(
    keys: SessionKeys,
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .map(move |header: Option<String>| session_from_header(&keys, header))
}
