//! Series API endpoints
//!
//! `latest`, `all`, `summary` and `daily` for every metric domain, per chain
//! or across all chains configured for the domain.

use std::collections::{BTreeMap, HashMap};

use actix_web::{get, web, Responder};
use serde::Deserialize;

use crate::{
    configuration::{AppState, State},
    engine::RefreshMode,
    error::Error,
    handler::fan_out,
    model::MetricDomain,
};

#[derive(Debug, Deserialize)]
pub struct SeriesQuery {
    pub chain: Option<String>,
    #[serde(alias = "collateral_type")]
    pub key: Option<String>,
}

fn resolve<'a>(
    state: &'a State,
    domain: &str,
    query: &SeriesQuery,
) -> Result<(&'a MetricDomain, Option<String>), Error> {
    let domain = state.get_domain(domain)?;
    if let Some(chain) = &query.chain {
        domain.validate_chain(chain)?;
    }
    let key = domain.validate_key(query.key.as_deref())?;
    Ok((domain, key))
}

fn non_empty<T>(
    domain: &MetricDomain,
    values: HashMap<String, T>,
) -> Result<BTreeMap<String, T>, Error> {
    if values.is_empty() {
        return Err(Error::NotFound(format!("no {} data", domain.name)));
    }
    Ok(values.into_iter().collect())
}

#[get("/{domain}/latest")]
pub async fn latest(
    state: web::Data<AppState<State>>,
    path: web::Path<String>,
    query: web::Query<SeriesQuery>,
) -> Result<impl Responder, Error> {
    let (domain, key) = resolve(&state, &path, &query)?;
    let key = key.as_deref();

    let values = fan_out::run(&domain.chains, query.chain.as_deref(), |chain| {
        let engine = state.engine();
        async move {
            engine
                .get_latest(domain, &chain, key, RefreshMode::Serve)
                .await
        }
    })
    .await?;

    let values = values
        .into_iter()
        .filter_map(|(chain, point)| point.map(|p| (chain, p)))
        .collect();

    Ok(web::Json(non_empty(domain, values)?))
}

#[get("/{domain}/all")]
pub async fn all(
    state: web::Data<AppState<State>>,
    path: web::Path<String>,
    query: web::Query<SeriesQuery>,
) -> Result<impl Responder, Error> {
    let (domain, key) = resolve(&state, &path, &query)?;
    let key = key.as_deref();

    let mut values =
        fan_out::run(&domain.chains, query.chain.as_deref(), |chain| {
            let engine = state.engine();
            async move {
                engine
                    .get_series(domain, &chain, key, RefreshMode::Serve)
                    .await
            }
        })
        .await?;
    values.retain(|_, series| !series.is_empty());

    Ok(web::Json(non_empty(domain, values)?))
}

#[get("/{domain}/summary")]
pub async fn summary(
    state: web::Data<AppState<State>>,
    path: web::Path<String>,
    query: web::Query<SeriesQuery>,
) -> Result<impl Responder, Error> {
    let (domain, key) = resolve(&state, &path, &query)?;
    let key = key.as_deref();

    let values = fan_out::run(&domain.chains, query.chain.as_deref(), |chain| {
        let engine = state.engine();
        async move {
            engine
                .get_summary(domain, &chain, key, RefreshMode::Serve)
                .await
        }
    })
    .await?;

    let values = values
        .into_iter()
        .filter_map(|(chain, summary)| summary.map(|s| (chain, s)))
        .collect();

    Ok(web::Json(non_empty(domain, values)?))
}

#[get("/{domain}/daily")]
pub async fn daily(
    state: web::Data<AppState<State>>,
    path: web::Path<String>,
    query: web::Query<SeriesQuery>,
) -> Result<impl Responder, Error> {
    let (domain, key) = resolve(&state, &path, &query)?;
    if domain.daily.is_none() {
        return Err(Error::NotFound(format!(
            "{} has no daily series",
            domain.name
        )));
    }
    let key = key.as_deref();

    let mut values =
        fan_out::run(&domain.chains, query.chain.as_deref(), |chain| {
            let engine = state.engine();
            async move {
                engine
                    .get_daily(domain, &chain, key, RefreshMode::Serve)
                    .await
            }
        })
        .await?;
    values.retain(|_, series| !series.is_empty());

    Ok(web::Json(non_empty(domain, values)?))
}
