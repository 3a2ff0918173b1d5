use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    web, Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;

use crate::database::MongoDB;
use crate::models::Role;
use crate::services::auth_service;
use crate::utils::AppError;

pub use crate::services::auth_service::Claims;

/// Extracts the token from an `Authorization: Bearer <token>` header value
pub fn bearer_token(header_value: &str) -> Option<&str> {
    header_value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Verifies the bearer token and stores its `Claims` in the request
/// extensions, so handlers can take `web::ReqData<Claims>`. When the app
/// carries a database handle the account must also still be active.
pub struct AuthMiddleware;

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let token = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token)
            .map(str::to_string);

        let token = match token {
            Some(token) => token,
            None => {
                log::warn!("❌ {} {} - missing bearer token", req.method(), req.path());
                return Box::pin(async move {
                    Err(AppError::Unauthorized("Missing authorization token".to_string()).into())
                });
            }
        };

        let claims = match auth_service::verify_token(&token) {
            Ok(claims) => claims,
            Err(e) => {
                log::warn!("❌ {} {} - {}", req.method(), req.path(), e);
                return Box::pin(async move {
                    Err(AppError::Unauthorized("Invalid or expired token".to_string()).into())
                });
            }
        };

        let db = req.app_data::<web::Data<MongoDB>>().cloned();
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            if let Some(db) = db {
                if let Err(e) = auth_service::ensure_active(&db, &claims.sub).await {
                    log::warn!("❌ {} {} - user {}: {}", req.method(), req.path(), claims.sub, e);
                    return Err(e.into());
                }
            }

            req.extensions_mut().insert(claims);
            service.call(req).await
        })
    }
}

/// Rejects authenticated requests whose role is not in the allowed list.
/// Wrap it inside `AuthMiddleware` so the claims are already present.
pub struct RequireRole(pub &'static [Role]);

impl<S, B> Transform<S, ServiceRequest> for RequireRole
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequireRoleService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequireRoleService {
            service,
            roles: self.0,
        }))
    }
}

pub struct RequireRoleService<S> {
    service: S,
    roles: &'static [Role],
}

impl<S, B> Service<ServiceRequest> for RequireRoleService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let allowed = match req.extensions().get::<Claims>() {
            Some(claims) => auth_service::require_role(claims, self.roles),
            None => Err(AppError::Unauthorized("Missing authorization token".to_string())),
        };

        if let Err(e) = allowed {
            log::warn!("🚫 {} {} - {}", req.method(), req.path(), e);
            return Box::pin(async move { Err(e.into()) });
        }

        let fut = self.service.call(req);
        Box::pin(async move { fut.await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test as actix_test, App, HttpResponse};

    async fn whoami(claims: web::ReqData<Claims>) -> HttpResponse {
        HttpResponse::Ok().json(serde_json::json!({
            "sub": claims.sub,
            "role": claims.role
        }))
    }

    fn bearer(user_id: &str, role: Role) -> String {
        let token = auth_service::generate_jwt(user_id, "user@example.com", role).unwrap();
        format!("Bearer {}", token)
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("Bearer   "), None);
        assert_eq!(bearer_token("Basic abc"), None);
    }

    #[actix_web::test]
    async fn test_rejects_missing_and_bad_tokens() {
        let app = actix_test::init_service(
            App::new().service(
                web::scope("/api")
                    .wrap(AuthMiddleware)
                    .route("/whoami", web::get().to(whoami)),
            ),
        )
        .await;

        let req = actix_test::TestRequest::get().uri("/api/whoami").to_request();
        let err = actix_test::try_call_service(&app, req).await.err().unwrap();
        assert_eq!(err.as_response_error().status_code(), StatusCode::UNAUTHORIZED);

        let req = actix_test::TestRequest::get()
            .uri("/api/whoami")
            .insert_header((AUTHORIZATION, "Bearer not-a-jwt"))
            .to_request();
        let err = actix_test::try_call_service(&app, req).await.err().unwrap();
        assert_eq!(err.as_response_error().status_code(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_valid_token_exposes_claims() {
        let app = actix_test::init_service(
            App::new().service(
                web::scope("/api")
                    .wrap(AuthMiddleware)
                    .route("/whoami", web::get().to(whoami)),
            ),
        )
        .await;

        let req = actix_test::TestRequest::get()
            .uri("/api/whoami")
            .insert_header((AUTHORIZATION, bearer("user-1", Role::Doctor)))
            .to_request();
        let body: serde_json::Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["sub"], "user-1");
        assert_eq!(body["role"], "doctor");
    }

    #[actix_web::test]
    async fn test_admin_endpoints_reject_other_roles() {
        let app = actix_test::init_service(
            App::new().service(
                web::scope("/api/admin")
                    .wrap(RequireRole(&[Role::Admin]))
                    .wrap(AuthMiddleware)
                    .route("/stats", web::get().to(crate::api::admin::get_stats)),
            ),
        )
        .await;

        for role in [Role::Patient, Role::Doctor] {
            let req = actix_test::TestRequest::get()
                .uri("/api/admin/stats")
                .insert_header((AUTHORIZATION, bearer("user-1", role)))
                .to_request();
            let err = actix_test::try_call_service(&app, req).await.err().unwrap();
            assert_eq!(err.as_response_error().status_code(), StatusCode::FORBIDDEN);
        }
    }

    #[actix_web::test]
    async fn test_role_gate_lets_allowed_role_through() {
        let app = actix_test::init_service(
            App::new().service(
                web::scope("/api/admin")
                    .wrap(RequireRole(&[Role::Admin]))
                    .wrap(AuthMiddleware)
                    .route("/whoami", web::get().to(whoami)),
            ),
        )
        .await;

        let req = actix_test::TestRequest::get()
            .uri("/api/admin/whoami")
            .insert_header((AUTHORIZATION, bearer("admin-1", Role::Admin)))
            .to_request();
        let body: serde_json::Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["role"], "admin");
    }

    #[actix_web::test]
    #[ignore] // Requires MongoDB to be running
    async fn test_deactivated_account_is_rejected() {
        let db = crate::database::tests::test_db().await;
        let user_id = uuid::Uuid::new_v4().to_string();
        let mut user = auth_service::tests::user_for(&user_id, Role::Patient);
        user.is_active = false;
        db.collection::<crate::models::User>(crate::database::USERS)
            .insert_one(&user)
            .await
            .unwrap();

        let app = actix_test::init_service(
            App::new().app_data(web::Data::new(db)).service(
                web::scope("/api")
                    .wrap(AuthMiddleware)
                    .route("/whoami", web::get().to(whoami)),
            ),
        )
        .await;

        let req = actix_test::TestRequest::get()
            .uri("/api/whoami")
            .insert_header((AUTHORIZATION, bearer(&user_id, Role::Patient)))
            .to_request();
        let err = actix_test::try_call_service(&app, req).await.err().unwrap();
        assert_eq!(err.as_response_error().status_code(), StatusCode::UNAUTHORIZED);
    }
}
