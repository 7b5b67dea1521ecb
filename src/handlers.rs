use crate::aggregate::aggregate;
use crate::errors::{AppError, StatsError};
use crate::models::{
    parse_date, AppData, ChartResponse, CreateManyRequest, CreateManyResponse, DeleteManyRequest,
    DeleteManyResponse, Granularity, ListResponse, Record, StatDoc, StatPatch,
};
use crate::state::AppState;
use crate::ui::render_dashboard;
use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::Html,
    Json,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct ChartQuery {
    pub granularity: Option<String>,
}

impl ChartQuery {
    fn granularity(&self) -> Result<Granularity, AppError> {
        match &self.granularity {
            Some(value) => value.parse::<Granularity>().map_err(AppError::bad_request),
            None => Ok(Granularity::default()),
        }
    }
}

pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<ChartQuery>,
) -> Result<Html<String>, AppError> {
    let granularity = query.granularity()?;
    let records = state.records().await;
    let buckets = aggregate(&records, granularity)?;
    Ok(Html(render_dashboard(granularity, &buckets, &records)))
}

pub async fn get_chart(
    State(state): State<AppState>,
    Query(query): Query<ChartQuery>,
) -> Result<Json<ChartResponse>, AppError> {
    let granularity = query.granularity()?;
    let buckets = aggregate(&state.records().await, granularity)?;
    Ok(Json(ChartResponse {
        granularity,
        buckets,
    }))
}

pub async fn list_stats(State(state): State<AppState>) -> Json<ListResponse> {
    Json(ListResponse {
        stats: state.records().await,
    })
}

pub async fn create_stat(
    State(state): State<AppState>,
    payload: Result<Json<StatDoc>, JsonRejection>,
) -> Result<(StatusCode, Json<Record>), AppError> {
    let Json(doc) = payload?;
    let doc = doc.normalized()?;
    let record = state.mutate(|data| insert_doc(data, doc)).await?;

    info!(id = %record.id, date = %record.date, visits = record.visits, "created traffic stat");
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn create_stats(
    State(state): State<AppState>,
    payload: Result<Json<CreateManyRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateManyResponse>), AppError> {
    let Json(request) = payload?;
    let docs = request
        .docs
        .iter()
        .map(StatDoc::normalized)
        .collect::<Result<Vec<_>, _>>()?;
    let all_stats = state
        .mutate(|data| {
            docs.into_iter()
                .map(|doc| insert_doc(data, doc))
                .collect::<Result<Vec<_>, _>>()
        })
        .await?;

    info!(count = all_stats.len(), "created traffic stats");
    Ok((StatusCode::CREATED, Json(CreateManyResponse { all_stats })))
}

pub async fn update_stat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<StatPatch>, JsonRejection>,
) -> Result<Json<Record>, AppError> {
    let Json(patch) = payload?;
    let patch = patch.normalized()?;
    let record = state
        .mutate(|data| {
            if !data.stats.contains_key(&id) {
                return Err(StatsError::NotFound(id.clone()).into());
            }
            if let Some(date) = patch.date.as_deref().and_then(parse_date) {
                if data.has_date(date, Some(&id)) {
                    return Err(StatsError::DuplicateDate(date.to_string()).into());
                }
            }
            let doc = data
                .stats
                .get_mut(&id)
                .ok_or_else(|| AppError::from(StatsError::NotFound(id.clone())))?;
            patch.apply(doc);
            Ok(doc.clone().into_record(id.clone()))
        })
        .await?;

    info!(id = %record.id, date = %record.date, visits = record.visits, "updated traffic stat");
    Ok(Json(record))
}

pub async fn delete_stat(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let removed = state
        .mutate(|data| Ok(data.stats.remove(&id).is_some()))
        .await?;

    info!(id = %id, removed, "deleted traffic stat");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_stats(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<DeleteManyResponse>, AppError> {
    let ids = parse_ids(&body).ok_or_else(|| AppError::bad_request("ids array is required"))?;
    state
        .mutate(|data| {
            for id in &ids {
                data.stats.remove(id);
            }
            Ok(())
        })
        .await?;

    info!(count = ids.len(), "deleted traffic stats");
    Ok(Json(DeleteManyResponse {
        deleted: ids.len(),
        ids,
    }))
}

fn insert_doc(data: &mut AppData, doc: StatDoc) -> Result<Record, AppError> {
    let date = doc.parsed_date()?;
    if data.has_date(date, None) {
        return Err(StatsError::DuplicateDate(doc.date).into());
    }
    let id = Uuid::new_v4().simple().to_string();
    data.stats.insert(id.clone(), doc.clone());
    Ok(doc.into_record(id))
}

fn parse_ids(body: &[u8]) -> Option<Vec<String>> {
    serde_json::from_slice::<DeleteManyRequest>(body)
        .ok()
        .map(|request| request.ids)
}
