//! `/api/db`: report data read straight from the GLPI database.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::CookieJar;
use derive_more::From;
use futures::future::try_join_all;
use itertools::Itertools as _;
use serde::Deserialize;

use crate::{
    api::{self, entity::MyEntities},
    db::{self, ticket::Page},
    filter::{self, parse_id, Filter, InvalidParam},
    glpi,
    report::Breakdown,
    session::{self, GlpiSession, Source},
};

use super::SharedAppState;

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 1000;

#[derive(Deserialize)]
pub struct TicketsQuery {
    #[serde(flatten)]
    filter: filter::Params,
    limit: Option<String>,
    offset: Option<String>,
}

#[tracing::instrument(skip_all)]
pub async fn list_tickets(
    State(state): State<SharedAppState>,
    Query(TicketsQuery {
        filter,
        limit,
        offset,
    }): Query<TicketsQuery>,
) -> Result<Json<api::ticket::Page>, TicketQueryError> {
    let filter = Filter::try_from(&filter)?.to_where();
    let page = parse_page(limit.as_deref(), offset.as_deref())?;

    let page_fut = state.db_client.get_tickets_page(&filter, page);
    let total_fut = state.db_client.get_tickets_count(&filter);
    let (rows, total) = tokio::try_join!(page_fut, total_fut)?;
    tracing::debug!(rows = rows.len(), total, "tickets listed");

    Ok(Json(api::ticket::Page {
        success: true,
        total,
        data: rows.into_iter().map(Into::into).collect(),
    }))
}

#[tracing::instrument(skip_all)]
pub async fn get_nps_summary(
    State(state): State<SharedAppState>,
    Query(params): Query<filter::Params>,
) -> Result<Json<api::Data<api::ticket::Nps>>, TicketQueryError> {
    let filter = Filter::try_from(&params)?.to_where();
    let tally = state.db_client.get_nps_tally(filter).await?;
    Ok(Json(api::Data::new(tally.into())))
}

#[tracing::instrument(skip_all)]
pub async fn get_tma_summary(
    State(state): State<SharedAppState>,
    Query(params): Query<filter::Params>,
) -> Result<Json<api::Data<api::ticket::Tma>>, TicketQueryError> {
    let filter = Filter::try_from(&params)?.to_where();
    let summary = state.db_client.get_tma_summary(filter).await?;
    Ok(Json(api::Data::new(summary.into())))
}

/// Chart breakdowns over every ticket the filter selects.
#[tracing::instrument(skip_all)]
pub async fn get_report(
    State(state): State<SharedAppState>,
    Query(params): Query<filter::Params>,
) -> Result<Json<api::Data<Breakdown>>, TicketQueryError> {
    let filter = Filter::try_from(&params)?.to_where();
    let tickets = state.db_client.get_tickets_page(&filter, Page::All).await?;
    Ok(Json(api::Data::new(Breakdown::of(&tickets))))
}

/// `limit` defaults to [`DEFAULT_LIMIT`] and is capped at [`MAX_LIMIT`];
/// `0` or `all` (any case) lifts it entirely.
fn parse_page(
    limit: Option<&str>,
    offset: Option<&str>,
) -> Result<Page, InvalidParam> {
    let invalid = |name, value: &str| InvalidParam {
        name,
        value: value.to_owned(),
    };

    let limit = match limit.map(str::trim) {
        None | Some("") => DEFAULT_LIMIT,
        Some(v) if v == "0" || v.eq_ignore_ascii_case("all") => {
            return Ok(Page::All)
        }
        Some(v) => v
            .parse::<i64>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| invalid("limit", v))?
            .min(MAX_LIMIT),
    };
    let offset = match offset.map(str::trim) {
        None | Some("") => 0,
        Some(v) => v
            .parse::<i64>()
            .ok()
            .filter(|n| *n >= 0)
            .ok_or_else(|| invalid("offset", v))?,
    };
    Ok(Page::Rows { limit, offset })
}

#[derive(Debug, From)]
pub enum TicketQueryError {
    #[from]
    DbError(db::Error),
    #[from]
    InvalidParam(InvalidParam),
}

impl IntoResponse for TicketQueryError {
    fn into_response(self) -> Response {
        match self {
            Self::InvalidParam(e) => bad_request(e.to_string()),
            Self::DbError(e) => db_failure(&e),
        }
    }
}

#[derive(Deserialize)]
pub struct DetailsQuery {
    id: Option<String>,
}

#[tracing::instrument(skip_all)]
pub async fn get_ticket_details(
    State(state): State<SharedAppState>,
    Query(DetailsQuery { id }): Query<DetailsQuery>,
) -> Result<Json<api::Data<api::ticket::Details>>, GetTicketDetailsError> {
    use GetTicketDetailsError as E;

    let id = parse_id("id", id.as_deref())?.ok_or(E::MissingId)?;

    let (details, followups) = tokio::join!(
        state.db_client.get_ticket_by_id(id),
        state.db_client.get_followups(id),
    );
    let details = details?.ok_or(E::TicketNotFound)?;
    let followups = followups.unwrap_or_else(|e| {
        tracing::warn!(id, "failed to load followups: {e}");
        Vec::new()
    });

    Ok(Json(api::Data::new(api::ticket::Details {
        ticket: details.ticket.into(),
        content: details.content,
        followups: followups.into_iter().map(Into::into).collect(),
    })))
}

#[derive(Debug, From)]
pub enum GetTicketDetailsError {
    #[from]
    DbError(db::Error),
    #[from]
    InvalidParam(InvalidParam),
    MissingId,
    TicketNotFound,
}

impl IntoResponse for GetTicketDetailsError {
    fn into_response(self) -> Response {
        match self {
            Self::InvalidParam(e) => bad_request(e.to_string()),
            Self::MissingId => bad_request("id required"),
            Self::TicketNotFound => (
                StatusCode::NOT_FOUND,
                Json(api::Failure::new("ticket not found")),
            )
                .into_response(),
            Self::DbError(e) => db_failure(&e),
        }
    }
}

#[tracing::instrument(skip_all)]
pub async fn list_entities(
    State(state): State<SharedAppState>,
) -> Result<Json<api::Data<Vec<api::Entity>>>, LookupError> {
    let entities = state.db_client.get_entities().await?;
    Ok(Json(api::Data::new(
        entities.into_iter().map(Into::into).collect(),
    )))
}

#[tracing::instrument(skip_all)]
pub async fn list_entity_children(
    State(state): State<SharedAppState>,
    Path(parent_id): Path<String>,
) -> Result<Json<api::Data<Vec<api::Entity>>>, LookupError> {
    let parent_id = parse_id("parentId", Some(parent_id.as_str()))?
        .ok_or(LookupError::MissingParam("parentId"))?;
    let children = state.db_client.get_entity_children(parent_id).await?;
    Ok(Json(api::Data::new(
        children.into_iter().map(Into::into).collect(),
    )))
}

#[tracing::instrument(skip_all)]
pub async fn list_entity_computers(
    State(state): State<SharedAppState>,
    Path(id): Path<String>,
) -> Result<Json<api::Data<Vec<api::Computer>>>, LookupError> {
    let id = parse_id("id", Some(id.as_str()))?
        .ok_or(LookupError::MissingParam("id"))?;
    let computers = state.db_client.get_computers_by_entity(id).await?;
    Ok(Json(api::Data::new(
        computers.into_iter().map(Into::into).collect(),
    )))
}

#[derive(Deserialize)]
pub struct CountComputersQuery {
    #[serde(rename = "entityId")]
    entity_id: Option<String>,
}

#[tracing::instrument(skip_all)]
pub async fn count_computers(
    State(state): State<SharedAppState>,
    Query(CountComputersQuery { entity_id }): Query<CountComputersQuery>,
) -> Result<Json<api::Count>, LookupError> {
    let entity_id =
        parse_id("entityId", entity_id.as_deref())?.filter(|id| *id > 0);
    let count = state.db_client.count_computers(entity_id).await?;
    Ok(Json(api::Count {
        success: true,
        count,
    }))
}

#[derive(Deserialize)]
pub struct SearchComputersQuery {
    name: Option<String>,
}

#[tracing::instrument(skip_all)]
pub async fn search_computers(
    State(state): State<SharedAppState>,
    Query(SearchComputersQuery { name }): Query<SearchComputersQuery>,
) -> Result<Json<api::Data<Vec<api::Computer>>>, LookupError> {
    let name = name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or(LookupError::MissingParam("name"))?;
    let computers = state.db_client.search_computers(name).await?;
    tracing::debug!(name, found = computers.len(), "computers searched");
    Ok(Json(api::Data::new(
        computers.into_iter().map(Into::into).collect(),
    )))
}

#[tracing::instrument(skip_all)]
pub async fn list_categories(
    State(state): State<SharedAppState>,
) -> Result<Json<api::Data<Vec<api::entity::Category>>>, LookupError> {
    let categories = state.db_client.get_categories().await?;
    Ok(Json(api::Data::new(
        categories.into_iter().map(Into::into).collect(),
    )))
}

#[tracing::instrument(skip_all)]
pub async fn list_technicians(
    State(state): State<SharedAppState>,
) -> Result<Json<api::Data<Vec<api::ticket::Technician>>>, LookupError> {
    let technicians = state.db_client.get_technicians().await?;
    Ok(Json(api::Data::new(
        technicians.into_iter().map(Into::into).collect(),
    )))
}

#[derive(Debug, From)]
pub enum LookupError {
    #[from]
    DbError(db::Error),
    #[from]
    InvalidParam(InvalidParam),
    MissingParam(&'static str),
}

impl IntoResponse for LookupError {
    fn into_response(self) -> Response {
        match self {
            Self::InvalidParam(e) => bad_request(e.to_string()),
            Self::MissingParam(name) => bad_request(format!("{name} required")),
            Self::DbError(e) => db_failure(&e),
        }
    }
}

#[derive(Deserialize)]
pub struct MyEntitiesQuery {
    email: Option<String>,
}

/// Entities the caller may report on: as GLPI lists them for the caller's
/// session, or else as the profiles of the user owning `email` grant them.
#[tracing::instrument(skip_all)]
pub async fn my_entities(
    State(state): State<SharedAppState>,
    session: Option<GlpiSession>,
    jar: CookieJar,
    Query(MyEntitiesQuery { email }): Query<MyEntitiesQuery>,
) -> Result<Json<MyEntities>, GetMyEntitiesError> {
    use GetMyEntitiesError as E;

    if let Some(session) = session {
        match state.glpi.get_my_entities(&session.token).await {
            Ok(listed) if !listed.is_empty() => {
                let ids = listed.iter().map(|e| e.id).unique().collect_vec();
                let entities = state.db_client.get_entities_by_ids(&ids).await?;
                return Ok(Json(MyEntities {
                    source: Some(api::entity::Source::GlpiApiToken),
                    ..MyEntities::new(
                        entities.into_iter().map(Into::into).collect(),
                    )
                }));
            }
            Ok(_) => {
                tracing::warn!("GLPI lists no entities for the session");
            }
            Err(glpi::Error::Unauthorized)
                if session.source != Source::DevBypass =>
            {
                return Err(E::SessionExpired(jar));
            }
            Err(e) => {
                tracing::warn!(
                    "failed to fetch entities via GLPI, trying e-mail: {e}"
                );
            }
        }
    }

    let email = email
        .map(|e| e.trim().to_owned())
        .filter(|e| !e.is_empty())
        .ok_or(E::NotAuthenticated)?;

    let Some(user_id) = state.db_client.find_user_id_by_email(&email).await?
    else {
        tracing::warn!(email = %email, "user not found in GLPI");
        return Ok(Json(MyEntities::none("User not found in GLPI")));
    };

    let profiles = state.db_client.get_profile_entities(user_id).await?;
    if profiles.is_empty() {
        tracing::warn!(user_id, "no profiles found for user");
        return Ok(Json(MyEntities::none("No profiles found for user")));
    }

    let descendants = try_join_all(
        profiles
            .iter()
            .filter(|p| p.is_recursive)
            .map(|p| state.db_client.get_entity_descendants(p.entity_id)),
    )
    .await?;
    let ids = profiles
        .iter()
        .map(|p| p.entity_id)
        .chain(descendants.into_iter().flatten())
        .unique()
        .collect_vec();
    let entities = state.db_client.get_entities_by_ids(&ids).await?;

    Ok(Json(MyEntities {
        source: Some(api::entity::Source::Email),
        user_email: Some(email),
        user_id: Some(user_id),
        ..MyEntities::new(entities.into_iter().map(Into::into).collect())
    }))
}

#[derive(Debug, From)]
pub enum GetMyEntitiesError {
    #[from]
    DbError(db::Error),
    NotAuthenticated,
    /// GLPI rejected the session token; its cookies are dropped.
    SessionExpired(CookieJar),
}

impl IntoResponse for GetMyEntitiesError {
    fn into_response(self) -> Response {
        match self {
            Self::NotAuthenticated => (
                StatusCode::UNAUTHORIZED,
                Json(api::Failure::require_login(
                    "Not authenticated - no session token or email provided",
                )),
            )
                .into_response(),
            Self::SessionExpired(jar) => (
                StatusCode::UNAUTHORIZED,
                session::clear(jar),
                Json(api::Failure::require_login(
                    "Session expired or invalid",
                )),
            )
                .into_response(),
            Self::DbError(e) => db_failure(&e),
        }
    }
}

fn bad_request(message: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, Json(api::Failure::new(message))).into_response()
}

fn db_failure(e: &db::Error) -> Response {
    tracing::error!("database query failed: {e}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(api::Failure::new("database query failed")),
    )
        .into_response()
}
