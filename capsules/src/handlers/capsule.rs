use actix_web::{
    delete, get, post,
    web::{self, Json},
};
use common::{
    context::Context,
    entities::capsule::{CreateCapsule, PublicCapsule},
    error,
};

use crate::service::capsule::CapsuleService;

#[post("/api/capsule")]
pub async fn post_capsule(
    context: Context,
    Json(data): Json<CreateCapsule>,
) -> error::Result<Json<PublicCapsule>> {
    Ok(Json(CapsuleService::new(context).create(data).await?))
}

#[get("/api/capsule")]
pub async fn get_capsules(context: Context) -> error::Result<Json<Vec<PublicCapsule>>> {
    Ok(Json(CapsuleService::new(context).list().await?))
}

#[get("/api/capsule/{id}")]
pub async fn get_capsule(
    context: Context,
    id: web::Path<String>,
) -> error::Result<Json<PublicCapsule>> {
    Ok(Json(CapsuleService::new(context).find(&id).await?))
}

#[delete("/api/capsule/{id}")]
pub async fn delete_capsule(
    context: Context,
    id: web::Path<String>,
) -> error::Result<Json<PublicCapsule>> {
    Ok(Json(CapsuleService::new(context).delete(&id).await?))
}
