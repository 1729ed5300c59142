use std::{convert::Infallible, sync::Arc};

use serde::de::DeserializeOwned;
use warp::{Filter, Rejection, Reply};

use super::{
    handlers,
    rejection::recover,
    state::{with_state, AppState},
};
use crate::{
    actions::Ledger,
    middleware::{with_possible_session, with_session},
    schema::Uuid,
};

/// The raw query string, empty when the request has none.
fn raw_query() -> impl Filter<Extract = (String,), Error = Infallible> + Clone {
    warp::query::raw()
        .or(warp::any().map(String::new))
        .unify()
}

fn json_body<T: DeserializeOwned + Send>(
    limit: u64,
) -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(limit).and(warp::body::json())
}

fn with_ledger(ledger: Ledger) -> impl Filter<Extract = (Ledger,), Error = Infallible> + Clone {
    warp::any().map(move || ledger)
}

fn recipes(
    state: Arc<AppState>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let keys = state.keys.clone();
    let limit = state.body_limit;

    let list = warp::path!("recipes")
        .and(warp::get())
        .and(raw_query())
        .and(with_possible_session(keys.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::list_recipes);

    let create = warp::path!("recipes")
        .and(warp::post())
        .and(with_session(keys.clone()))
        .and(json_body(limit))
        .and(with_state(state.clone()))
        .and_then(handlers::create_recipe);

    let download = warp::path!("recipes" / "download_shopping_cart")
        .and(warp::get())
        .and(with_session(keys.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::download_shopping_cart);

    let get = warp::path!("recipes" / Uuid)
        .and(warp::get())
        .and(with_possible_session(keys.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::get_recipe);

    let update = warp::path!("recipes" / Uuid)
        .and(warp::patch())
        .and(with_session(keys.clone()))
        .and(json_body(limit))
        .and(with_state(state.clone()))
        .and_then(handlers::update_recipe);

    let delete = warp::path!("recipes" / Uuid)
        .and(warp::delete())
        .and(with_session(keys.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::delete_recipe);

    let favorite = ledger_routes("favorite", Ledger::Favorites, state.clone());
    let cart = ledger_routes("shopping_cart", Ledger::ShoppingCart, state);

    list.or(create)
        .or(download)
        .or(get)
        .or(update)
        .or(delete)
        .or(favorite)
        .or(cart)
}

fn ledger_routes(
    name: &'static str,
    ledger: Ledger,
    state: Arc<AppState>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let keys = state.keys.clone();
    let path = warp::path("recipes")
        .and(warp::path::param::<Uuid>())
        .and(warp::path(name))
        .and(warp::path::end());

    let add = with_ledger(ledger)
        .and(path.clone())
        .and(warp::post())
        .and(with_session(keys.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::add_to_ledger);

    let remove = with_ledger(ledger)
        .and(path)
        .and(warp::delete())
        .and(with_session(keys))
        .and(with_state(state))
        .and_then(handlers::remove_from_ledger);

    add.or(remove)
}

fn catalog(state: Arc<AppState>) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let list_tags = warp::path!("tags")
        .and(warp::get())
        .and(raw_query())
        .and(with_state(state.clone()))
        .and_then(handlers::list_tags);

    let get_tag = warp::path!("tags" / Uuid)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handlers::get_tag);

    let list_ingredients = warp::path!("ingredients")
        .and(warp::get())
        .and(raw_query())
        .and(with_state(state.clone()))
        .and_then(handlers::list_ingredients);

    let get_ingredient = warp::path!("ingredients" / Uuid)
        .and(warp::get())
        .and(with_state(state))
        .and_then(handlers::get_ingredient);

    list_tags.or(get_tag).or(list_ingredients).or(get_ingredient)
}

fn users(state: Arc<AppState>) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let keys = state.keys.clone();
    let limit = state.body_limit;

    let register = warp::path!("users")
        .and(warp::post())
        .and(json_body(limit))
        .and(with_state(state.clone()))
        .and_then(handlers::register);

    let list = warp::path!("users")
        .and(warp::get())
        .and(raw_query())
        .and(with_possible_session(keys.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::list_users);

    let me = warp::path!("users" / "me")
        .and(warp::get())
        .and(with_session(keys.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::me);

    let subscriptions = warp::path!("users" / "subscriptions")
        .and(warp::get())
        .and(raw_query())
        .and(with_session(keys.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::list_subscriptions);

    let set_password = warp::path!("users" / "set_password")
        .and(warp::post())
        .and(with_session(keys.clone()))
        .and(json_body(limit))
        .and(with_state(state.clone()))
        .and_then(handlers::set_password);

    let get = warp::path!("users" / Uuid)
        .and(warp::get())
        .and(with_possible_session(keys.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::get_user);

    let subscribe = warp::path!("users" / Uuid / "subscribe")
        .and(warp::post())
        .and(raw_query())
        .and(with_session(keys.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::subscribe);

    let unsubscribe = warp::path!("users" / Uuid / "subscribe")
        .and(warp::delete())
        .and(with_session(keys.clone()))
        .and(with_state(state.clone()))
        .and_then(handlers::unsubscribe);

    let login = warp::path!("auth" / "token" / "login")
        .and(warp::post())
        .and(json_body(limit))
        .and(with_state(state))
        .and_then(handlers::login);

    let logout = warp::path!("auth" / "token" / "logout")
        .and(warp::post())
        .and(with_session(keys))
        .and_then(handlers::logout);

    register
        .or(list)
        .or(me)
        .or(subscriptions)
        .or(set_password)
        .or(get)
        .or(subscribe)
        .or(unsubscribe)
        .or(login)
        .or(logout)
}

/// Every route of the service, with rejections rendered as JSON.
pub fn routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let media = warp::path("media").and(warp::fs::dir(state.media.root().clone()));

    let api = warp::path("api").and(
        recipes(state.clone())
            .or(catalog(state.clone()))
            .or(users(state)),
    );

    api.or(media)
        .recover(recover)
        .with(warp::log("foodgram::api"))
}
