use std::{convert::Infallible, sync::Arc};

use sqlx::{Pool, Postgres};
use warp::Filter;

use crate::{config::Config, jwt::SessionKeys, media::MediaStorage};

/// Everything a handler needs, shared between requests.
pub struct AppState {
    pub pool: Pool<Postgres>,
    pub media: MediaStorage,
    pub keys: SessionKeys,
    pub body_limit: u64,
}

impl AppState {
    pub fn new(pool: Pool<Postgres>, config: &Config) -> Result<Arc<Self>, potion::Error> {
        let keys = SessionKeys::new(&config.jwt_secret, config.session_hours)?;

        Ok(Arc::new(Self {
            pool,
            media: MediaStorage::new(&config.media_root, &config.media_url),
            keys,
            body_limit: config.body_limit_bytes,
        }))
    }
}

pub fn with_state(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Arc<AppState>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}
