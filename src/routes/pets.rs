use actix_web::{web, HttpResponse, Responder};
use validator::Validate;

use crate::models::{
    CallerIdentity, CreatedPet, ErrorResponse, NewPetRequest, NewPetResponse, PetDetailResponse,
    PetWithImages, UpdatePetRequest,
};
use crate::routes::{engine_error_response, store_error_response, AppState};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/pets/new").route(web::post().to(create_pet)))
        .service(
            web::resource("/pets/{pet_id}")
                .route(web::get().to(get_pet))
                .route(web::post().to(update_pet)),
        )
        .service(
            web::resource("/pets/{pet_id}/set_profile_image/{image_id}")
                .route(web::post().to(set_profile_image)),
        );
}

fn bad_request(message: String) -> HttpResponse {
    HttpResponse::BadRequest().json(ErrorResponse {
        error: "Invalid target".to_string(),
        message,
        status_code: 400,
    })
}

fn detail_response(detail: &PetWithImages, caller_id: i64) -> PetDetailResponse {
    PetDetailResponse {
        id: detail.pet.id,
        name: detail.pet.name.clone(),
        owner_id: detail.pet.user_id,
        can_edit: detail.pet.user_id == caller_id,
        description: detail.pet.description.clone(),
        profile_image_id: detail.pet.profile_picture_id,
        profile_image_url: detail.profile_image_url.clone(),
        images: detail.images.clone(),
    }
}

async fn create_pet(
    state: web::Data<AppState>,
    caller: CallerIdentity,
    body: web::Json<NewPetRequest>,
) -> impl Responder {
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "Validation failed".to_string(),
            message: e.to_string(),
            status_code: 400,
        });
    }

    let name = body.name.trim();
    if name.is_empty() {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "Validation failed".to_string(),
            message: "pet name must not be blank".to_string(),
            status_code: 400,
        });
    }

    let user = match state.engine.authorize(caller).await {
        Ok(user) => user,
        Err(e) => return engine_error_response(e),
    };

    match state.store.create_pet(user.id, name).await {
        Ok(pet) => HttpResponse::Ok().json(NewPetResponse {
            message: "OK".to_string(),
            pet: CreatedPet { id: pet.id },
        }),
        Err(e) => store_error_response(e),
    }
}

async fn get_pet(
    state: web::Data<AppState>,
    caller: CallerIdentity,
    path: web::Path<i64>,
) -> impl Responder {
    let pet_id = path.into_inner();

    let user = match state.engine.authorize(caller).await {
        Ok(user) => user,
        Err(e) => return engine_error_response(e),
    };

    match state.store.get_pet_detail(pet_id).await {
        Ok(Some(detail)) => HttpResponse::Ok().json(detail_response(&detail, user.id)),
        Ok(None) => bad_request(format!("pet {} not found", pet_id)),
        Err(e) => store_error_response(e),
    }
}

/// Edit a pet's listing. Any accepted edit advances the pet's version,
/// which puts it back into feeds that already rated the old version.
async fn update_pet(
    state: web::Data<AppState>,
    caller: CallerIdentity,
    path: web::Path<i64>,
    body: web::Json<UpdatePetRequest>,
) -> impl Responder {
    let pet_id = path.into_inner();

    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "Validation failed".to_string(),
            message: e.to_string(),
            status_code: 400,
        });
    }
    if let Some(name) = body.name.as_deref() {
        if name.trim().is_empty() {
            return HttpResponse::BadRequest().json(ErrorResponse {
                error: "Validation failed".to_string(),
                message: "pet name must not be blank".to_string(),
                status_code: 400,
            });
        }
    }

    let user = match state.engine.authorize(caller).await {
        Ok(user) => user,
        Err(e) => return engine_error_response(e),
    };

    let pet = match state.store.get_pet(pet_id).await {
        Ok(Some(pet)) => pet,
        Ok(None) => return bad_request(format!("pet {} not found", pet_id)),
        Err(e) => return store_error_response(e),
    };
    if pet.user_id != user.id {
        return bad_request("you can only edit your own pets".to_string());
    }

    let name = body.name.as_deref().map(str::trim);
    if let Err(e) = state
        .store
        .update_pet(pet_id, name, body.description.as_deref())
        .await
    {
        return store_error_response(e);
    }

    match state.store.get_pet_detail(pet_id).await {
        Ok(Some(detail)) => HttpResponse::Ok().json(detail_response(&detail, user.id)),
        Ok(None) => bad_request(format!("pet {} not found", pet_id)),
        Err(e) => store_error_response(e),
    }
}

async fn set_profile_image(
    state: web::Data<AppState>,
    caller: CallerIdentity,
    path: web::Path<(i64, i64)>,
) -> impl Responder {
    let (pet_id, image_id) = path.into_inner();

    let user = match state.engine.authorize(caller).await {
        Ok(user) => user,
        Err(e) => return engine_error_response(e),
    };

    let pet = match state.store.get_pet(pet_id).await {
        Ok(Some(pet)) => pet,
        Ok(None) => return bad_request(format!("pet {} not found", pet_id)),
        Err(e) => return store_error_response(e),
    };
    if pet.user_id != user.id {
        return bad_request("you can only edit your own pets".to_string());
    }
    if !pet.active {
        return bad_request(format!("pet {} is not active", pet_id));
    }

    if let Err(e) = state.store.set_profile_picture(pet_id, image_id).await {
        return store_error_response(e);
    }

    match state.store.get_pet_detail(pet_id).await {
        Ok(Some(detail)) => HttpResponse::Ok().json(detail_response(&detail, user.id)),
        Ok(None) => bad_request(format!("pet {} not found", pet_id)),
        Err(e) => store_error_response(e),
    }
}
