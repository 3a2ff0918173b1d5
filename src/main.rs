mod api;
mod database;
mod middleware;
mod models;
mod services;
mod utils;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::env;
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::middleware::auth::{AuthMiddleware, RequireRole};
use crate::models::Role;
use crate::services::{PaymentGateway, RazorpayGateway};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenv().ok();

    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = env::var("PORT").unwrap_or_else(|_| "5000".to_string());
    let frontend_url = env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
    let database_url = env::var("DATABASE_URL").map_err(|_| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "DATABASE_URL must be set")
    })?;

    log::info!("🚀 Starting MediMate Service...");

    let db = database::MongoDB::new(&database_url).await.map_err(|e| {
        log::error!("❌ Failed to connect to MongoDB: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
    })?;
    let db_data = web::Data::new(db);

    log::info!("✅ MongoDB connected successfully");

    let gateway: Arc<dyn PaymentGateway> = Arc::new(RazorpayGateway::from_env());
    let gateway_data = web::Data::from(gateway);

    log::info!("🌐 Server starting on {}:{}", host, port);
    log::info!("📚 Swagger UI available at: http://{}:{}/swagger-ui/", host, port);
    log::info!("📄 OpenAPI spec at: http://{}:{}/api-docs/openapi.json", host, port);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&frontend_url)
            .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                actix_web::http::header::AUTHORIZATION,
                actix_web::http::header::CONTENT_TYPE,
                actix_web::http::header::ACCEPT,
            ])
            .expose_headers(vec![actix_web::http::header::CONTENT_TYPE])
            .supports_credentials()
            .max_age(3600);

        let openapi = api::swagger::ApiDoc::openapi();

        App::new()
            .app_data(db_data.clone())
            .app_data(gateway_data.clone())
            .wrap(cors)
            .wrap(middleware::SecurityHeaders)
            .wrap(Logger::default())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone())
            )
            // Health check
            .route("/health", web::get().to(api::health::health_check))
            .route("/metrics", web::get().to(api::metrics::get_metrics))
            // Auth endpoints
            .service(
                web::scope("/api/auth")
                    .route("/login", web::post().to(api::auth::login))
                    .route("/register", web::post().to(api::auth::register))
                    .service(
                        web::resource("/verify")
                            .wrap(AuthMiddleware)
                            .route(web::get().to(api::auth::verify_token))
                    )
                    .service(
                        web::resource("/me")
                            .wrap(AuthMiddleware)
                            .route(web::get().to(api::auth::get_me))
                            .route(web::put().to(api::auth::update_me))
                    )
            )

            // Doctor directory (public)
            .service(
                web::scope("/api/doctors")
                    .route("", web::get().to(api::doctors::list_doctors))
                    .route("/{user_id}", web::get().to(api::doctors::get_doctor))
            )

            // Appointments - Requires JWT
            .service(
                web::scope("/api/appointments")
                    .wrap(AuthMiddleware)
                    .route("", web::post().to(api::appointments::create_appointment))
                    .route("", web::get().to(api::appointments::list_appointments))
                    .route("/{id}", web::get().to(api::appointments::get_appointment))
                    .route("/{id}/status", web::patch().to(api::appointments::update_status))
                    .route("/{id}/cancel", web::post().to(api::appointments::cancel_appointment))
            )

            // Payments - Requires JWT
            .service(
                web::scope("/api/payments")
                    .wrap(AuthMiddleware)
                    .route("/order", web::post().to(api::payments::create_order))
                    .route("/verify", web::post().to(api::payments::verify_payment))
            )

            // Messages - Requires JWT
            .service(
                web::scope("/api/messages")
                    .wrap(AuthMiddleware)
                    .route("/conversations", web::get().to(api::messages::list_conversations))
                    .route("/conversations", web::post().to(api::messages::create_conversation))
                    .route("/conversations/{id}", web::get().to(api::messages::get_conversation))
                    .route("/conversations/{id}", web::post().to(api::messages::send_message))
                    .route("/conversations/{id}/read", web::post().to(api::messages::mark_read))
            )

            // Medical reports - Requires JWT
            .service(
                web::scope("/api/reports")
                    .wrap(AuthMiddleware)
                    .route("", web::post().to(api::reports::upload_report))
                    .route("", web::get().to(api::reports::list_reports))
                    .route("/{id}", web::get().to(api::reports::get_report))
                    .route("/{id}/review", web::post().to(api::reports::review_report))
            )

            // Video consultations - Requires JWT
            .service(
                web::scope("/api/video")
                    .wrap(AuthMiddleware)
                    .route("/token", web::post().to(api::video::issue_token))
            )

            // Admin - Requires JWT with admin role
            .service(
                web::scope("/api/admin")
                    .wrap(RequireRole(&[Role::Admin]))
                    .wrap(AuthMiddleware)
                    .route("/users", web::get().to(api::admin::list_users))
                    .route("/users/{user_id}/active", web::post().to(api::admin::set_active))
                    .route("/doctors/{user_id}/verify", web::post().to(api::admin::verify_doctor))
                    .route("/stats", web::get().to(api::admin::get_stats))
            )
    })
    .bind(format!("{}:{}", host, port))?
    .run()
    .await
}
