use actix_web::{web, HttpResponse, Responder};
use chrono::Utc;
use validator::Validate;

use crate::models::{
    CallerIdentity, ErrorResponse, FeedQuery, FeedResponse, HealthResponse, MatchesResponse,
    RatingResponse, SubmitRatingRequest,
};
use crate::routes::{engine_error_response, AppState};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").route(web::get().to(health_check)))
        .service(web::resource("/matching-records").route(web::post().to(submit_rating)))
        .service(web::resource("/pets/matching").route(web::get().to(candidate_feed)))
        .service(web::resource("/matches").route(web::get().to(get_matches)));
}

async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let healthy = state.store.health_check().await;
    let status = if healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    })
}

async fn submit_rating(
    state: web::Data<AppState>,
    caller: CallerIdentity,
    body: web::Json<SubmitRatingRequest>,
) -> impl Responder {
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "Validation failed".to_string(),
            message: e.to_string(),
            status_code: 400,
        });
    }

    match state
        .engine
        .submit_rating(caller, body.pet_id, body.rating)
        .await
    {
        Ok(record) => HttpResponse::Ok().json(RatingResponse {
            message: "OK".to_string(),
            id: record.id,
        }),
        Err(e) => engine_error_response(e),
    }
}

async fn candidate_feed(
    state: web::Data<AppState>,
    caller: CallerIdentity,
    query: web::Query<FeedQuery>,
) -> impl Responder {
    match state.engine.candidate_feed(caller, query.limit).await {
        Ok(pets) => HttpResponse::Ok().json(FeedResponse { pets }),
        Err(e) => engine_error_response(e),
    }
}

async fn get_matches(state: web::Data<AppState>, caller: CallerIdentity) -> impl Responder {
    match state.engine.matches_for(caller).await {
        Ok(matches) => HttpResponse::Ok().json(MatchesResponse { matches }),
        Err(e) => engine_error_response(e),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use serde_json::json;

    use super::*;
    use crate::config::AuthSettings;
    use crate::core::{FeedLimits, MatchingEngine};
    use crate::services::{IdentityVerifier, SqliteStore};

    async fn test_state() -> AppState {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let engine = Arc::new(MatchingEngine::new(store.clone(), FeedLimits::default()));
        let identity = Arc::new(IdentityVerifier::new(&AuthSettings {
            jwt_secret: "test-secret".to_string(),
            issuer: "pawmatch".to_string(),
            audience: "pawmatch-app".to_string(),
            token_expiry_hours: None,
        }));

        AppState {
            engine,
            store,
            identity,
        }
    }

    #[actix_web::test]
    async fn test_submit_rating_round_trip() {
        let state = test_state().await;
        let alice = state.store.create_user(Some("Alice")).await.unwrap();
        let bob = state.store.create_user(Some("Bob")).await.unwrap();
        let pet = state.store.create_pet(bob.id, "Rex").await.unwrap();
        let token = state.identity.issue_token(alice.id).unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(crate::routes::configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/matching-records")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .set_json(json!({"pet_id": pet.id, "rating": 1}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "OK");
        assert!(body["id"].as_i64().is_some());
    }

    #[actix_web::test]
    async fn test_missing_token_is_rejected() {
        let state = test_state().await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(crate::routes::configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/matches").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_out_of_range_rating_is_rejected() {
        let state = test_state().await;
        let alice = state.store.create_user(Some("Alice")).await.unwrap();
        let bob = state.store.create_user(Some("Bob")).await.unwrap();
        let pet = state.store.create_pet(bob.id, "Rex").await.unwrap();
        let token = state.identity.issue_token(alice.id).unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(crate::routes::configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/matching-records")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .set_json(json!({"pet_id": pet.id, "rating": 5}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_feed_route_takes_precedence_over_pet_detail() {
        let state = test_state().await;
        let alice = state.store.create_user(Some("Alice")).await.unwrap();
        let bob = state.store.create_user(Some("Bob")).await.unwrap();
        state.store.create_pet(bob.id, "Rex").await.unwrap();
        let token = state.identity.issue_token(alice.id).unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(crate::routes::configure_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/pets/matching")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(resp).await;
        let pets = body["pets"].as_array().unwrap();
        assert_eq!(pets.len(), 1);
        assert_eq!(pets[0]["name"], "Rex");
        assert_eq!(pets[0]["profile_image_url"], "");
    }

    #[actix_web::test]
    async fn test_health_check() {
        let state = test_state().await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(crate::routes::configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/health").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "healthy");
    }

    #[actix_web::test]
    async fn test_mutual_likes_surface_as_a_match() {
        let state = test_state().await;
        let alice = state.store.create_user(Some("Alice")).await.unwrap();
        let bob = state.store.create_user(Some("Bob")).await.unwrap();
        let rex = state.store.create_pet(alice.id, "Rex").await.unwrap();
        let muffin = state.store.create_pet(bob.id, "Muffin").await.unwrap();
        let alice_token = state.identity.issue_token(alice.id).unwrap();
        let bob_token = state.identity.issue_token(bob.id).unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(crate::routes::configure_routes),
        )
        .await;

        for (token, pet_id) in [(&alice_token, muffin.id), (&bob_token, rex.id)] {
            let req = test::TestRequest::post()
                .uri("/api/matching-records")
                .insert_header(("Authorization", format!("Bearer {}", token)))
                .set_json(json!({"pet_id": pet_id, "rating": 1}))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::OK);
        }

        let req = test::TestRequest::get()
            .uri("/api/matches")
            .insert_header(("Authorization", format!("Bearer {}", alice_token)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(resp).await;
        let matches = body["matches"].as_array().unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0]["user_a"]["id"].as_i64(), Some(alice.id));
        assert_eq!(matches[0]["user_b"]["id"].as_i64(), Some(bob.id));
        assert_eq!(matches[0]["user_a_liked_pets"][0]["name"], "Muffin");
        assert_eq!(matches[0]["user_b_liked_pets"][0]["name"], "Rex");
        assert!(matches[0]["creation_time"].as_i64().is_some());
    }
}
