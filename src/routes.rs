mod run;

pub use run::{WorkRoot, run_handler};

use actix_web::{HttpResponse, Responder};

pub const GREETING: &str = "Hi there!!";

/// Liveness probe, answers every path the router does not claim
pub async fn greeting() -> impl Responder {
    HttpResponse::Ok().body(GREETING)
}
