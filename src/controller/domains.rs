use actix_web::{get, web, Responder};
use serde::Serialize;

use crate::{
    configuration::{AppState, State},
    error::Error,
    model::SecondaryKey,
};

#[derive(Debug, Serialize)]
pub struct DomainInfo<'a> {
    pub name: &'a str,
    pub chains: &'a [String],
    pub secondary_key: Option<&'a SecondaryKey>,
    pub summary_field: &'a str,
    pub daily: bool,
}

#[get("/domains")]
async fn index(
    state: web::Data<AppState<State>>,
) -> Result<impl Responder, Error> {
    let mut domains: Vec<DomainInfo> = state
        .domains
        .values()
        .map(|domain| DomainInfo {
            name: &domain.name,
            chains: &domain.chains,
            secondary_key: domain.secondary_key.as_ref(),
            summary_field: &domain.summary_field,
            daily: domain.daily.is_some(),
        })
        .collect();
    domains.sort_by(|a, b| a.name.cmp(b.name));

    Ok(web::Json(serde_json::to_value(domains)?))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::{test, App};
    use serde_json::Value;

    use super::*;
    use crate::{configuration::tests::test_config, engine::test_support::MemorySource};

    #[actix_web::test]
    async fn test_lists_domains() {
        let state = State::new(test_config(&[("TVL_KEYS", "USDC")]), Arc::new(MemorySource::new()));
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(AppState::new(state)))
                .service(web::scope("/api").service(index)),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/domains").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        let names: Vec<&str> = body.as_array().unwrap().iter().filter_map(|d| d["name"].as_str()).collect();
        assert_eq!(names, vec!["delegations", "perp_stats", "rewards", "tvl", "yield"]);
        assert_eq!(body[3]["secondary_key"]["allowed"], serde_json::json!(["USDC"]));
        assert_eq!(body[3]["daily"], serde_json::json!(true));
    }
}
