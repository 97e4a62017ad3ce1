//! The public read API: six endpoints over the record store, serving the
//! contest/rating data the pipeline has already computed. Nothing here
//! writes; every handler is a thin `StoreGateway` lookup.

pub mod routes;

use axum::routing::{get, post};
use axum::Router;

use crate::app::App;

pub fn route() -> Router<App> {
    Router::<App>::new()
        .route("/contests", get(routes::list_contests))
        .route("/contests/count", get(routes::count_contests))
        .route("/contests/{contest_slug}/records", get(routes::list_records))
        .route(
            "/contests/{contest_slug}/records/{region}/{username}",
            get(routes::get_user_record),
        )
        .route(
            "/contests/{contest_slug}/rank/{region}/{username}",
            get(routes::real_time_rank),
        )
        .route("/users/ratings", post(routes::bulk_ratings))
}
