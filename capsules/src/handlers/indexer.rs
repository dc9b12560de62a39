use actix_web::{get, HttpResponse};

#[get("/api/capsule/ping")]
pub async fn ping() -> HttpResponse {
    HttpResponse::Ok().finish()
}
