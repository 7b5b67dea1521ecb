use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, post, put},
    Router,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/api/chart", get(handlers::get_chart))
        .route(
            "/trafficStats",
            get(handlers::list_stats)
                .post(handlers::create_stats)
                .delete(handlers::delete_stats),
        )
        .route("/trafficStat", post(handlers::create_stat))
        .route(
            "/trafficStats/:id",
            put(handlers::update_stat).delete(handlers::delete_stat),
        )
        .with_state(state)
}
