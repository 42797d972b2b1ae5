use axum::{body::Body, extract::State, response::IntoResponse, routing, Json};
use tracing::instrument;

use super::{loader::Loaded, Organisation, OrganisationPayload, OrganisationPopulated};
use crate::{
    auth::{
        policy::{check, check_authenticated, Action},
        Caller,
    },
    error::StoreResultExt,
    errors::WrapReport,
    extract::read_json_body,
    server::ServerState,
    Error,
};

#[instrument(skip_all)]
async fn list(
    State(state): State<ServerState>,
    caller: Caller,
) -> Result<impl IntoResponse, WrapReport<Error>> {
    check(Action::List, caller.info(), None)?;

    let results = state
        .organisations
        .find_all_populated()
        .await
        .into_client_error()?;
    Ok(Json(results))
}

#[instrument(skip_all)]
async fn get(
    Loaded(organisation): Loaded,
    caller: Caller,
) -> Result<impl IntoResponse, WrapReport<Error>> {
    check(Action::Read, caller.info(), Some(&organisation))?;
    Ok(Json(organisation.view_for(caller.user_id())))
}

#[instrument(skip_all)]
async fn create(
    State(state): State<ServerState>,
    caller: Caller,
    body: Body,
) -> Result<impl IntoResponse, WrapReport<Error>> {
    let info = check_authenticated(Action::Create, caller.info())?;

    let payload: OrganisationPayload = read_json_body(body).await?;
    let update = payload.validate()?;

    let organisation = Organisation::new(info.user_id, update);
    state
        .organisations
        .insert(&organisation)
        .await
        .into_client_error()?;

    Ok(Json(organisation.populate(Some(info.summary()))))
}

#[instrument(skip_all)]
async fn update(
    State(state): State<ServerState>,
    Loaded(organisation): Loaded,
    caller: Caller,
    body: Body,
) -> Result<impl IntoResponse, WrapReport<Error>> {
    check(Action::Update, caller.info(), Some(&organisation))?;

    let payload: OrganisationPayload = read_json_body(body).await?;
    let update = payload.validate()?;

    let saved = state
        .organisations
        .save(organisation.id, &update)
        .await
        .into_client_error()?;
    if !saved {
        return Err(Error::NotFound.into());
    }

    Ok(Json(OrganisationPopulated {
        title: update.title,
        content: update.content,
        ..organisation
    }))
}

#[instrument(skip_all)]
async fn delete(
    State(state): State<ServerState>,
    Loaded(organisation): Loaded,
    caller: Caller,
) -> Result<impl IntoResponse, WrapReport<Error>> {
    check(Action::Delete, caller.info(), Some(&organisation))?;

    let removed = state
        .organisations
        .remove(organisation.id)
        .await
        .into_client_error()?;
    if !removed {
        return Err(Error::NotFound.into());
    }

    Ok(Json(organisation))
}

pub fn create_routes() -> axum::Router<ServerState> {
    axum::Router::new()
        .route("/organisations", routing::get(list).post(create))
        .route(
            "/organisations/:id",
            routing::get(get).put(update).delete(delete),
        )
}
