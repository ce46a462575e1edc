//! An in-process client that plays the part of an HTTP adapter.
//!
//! Requests go through the runtime's [`RouteTable`](trellis::runtime::RouteTable):
//! the route is looked up, `protected` routes get the caller authenticated into
//! the [`Context`], and the handler's payload or error is mapped to a status.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info};
use trellis::runtime::{DispatchError, TrellisRuntime};
use trellis::{BindError, Context};

use crate::requests::RequestResolver;
use crate::service::{ServiceError, UserService};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Status and JSON body of a handled request.
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    pub status: u16,
    pub body: Value,
}

impl Response {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    fn error(status: u16, code: &str, message: impl ToString) -> Self {
        Self {
            status,
            body: json!({ "error": code, "message": message.to_string() }),
        }
    }

    fn from_service_error(err: &ServiceError) -> Self {
        let status = match err {
            ServiceError::NotFound => 404,
            ServiceError::AlreadyExists => 409,
            ServiceError::InvalidPassword | ServiceError::Unauthenticated => 401,
            ServiceError::Forbidden(_) => 403,
            ServiceError::InvalidRole(_) | ServiceError::Validation(_) => 400,
        };
        Self::error(status, err.code(), err)
    }

    fn from_dispatch_error(err: &DispatchError) -> Self {
        match err {
            DispatchError::NotFound { .. } => Self::error(404, err.kind(), err),
            DispatchError::MethodNotAllowed { .. } => Self::error(405, err.kind(), err),
            DispatchError::Handler(inner) => {
                if let Some(service) = inner.downcast_ref::<ServiceError>() {
                    Self::from_service_error(service)
                } else if inner.downcast_ref::<BindError>().is_some() {
                    Self::error(400, err.kind(), err)
                } else {
                    Self::error(500, err.kind(), err)
                }
            }
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub struct Client<'a> {
    runtime: &'a TrellisRuntime,
    service: Arc<dyn UserService>,
    token: Option<String>,
}

impl<'a> Client<'a> {
    pub fn new(runtime: &'a TrellisRuntime, service: Arc<dyn UserService>) -> Self {
        Self {
            runtime,
            service,
            token: None,
        }
    }

    /// Sends later requests with `token`, or anonymously with `None`.
    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub async fn send(&self, method: &str, path: &str, body: Value) -> Response {
        let found = match self.runtime.table().lookup(method, path) {
            Ok(found) => found,
            Err(err) => return Response::from_dispatch_error(&err),
        };

        let mut ctx = Context::new().with_timeout(REQUEST_TIMEOUT);
        if found.route.option("protected") == Some("true") {
            let current = self
                .token
                .as_deref()
                .ok_or(ServiceError::Unauthenticated)
                .and_then(|token| self.service.authenticate(token));
            match current {
                Ok(current) => {
                    debug!(user = current.id, route = %found.route.path(), "Authenticated");
                    ctx = ctx.with_value(current);
                }
                Err(err) => return Response::from_service_error(&err),
            }
        }

        let resolver = RequestResolver::new(&body, &found.params);
        let result = self.runtime.dispatch(method, path, ctx, &resolver).await;

        let response = match result {
            Ok(payload) => match payload.to_json() {
                Ok(body) => Response::ok(body),
                Err(err) => Response::error(500, "internal", err),
            },
            Err(err) => Response::from_dispatch_error(&err),
        };
        info!(%method, %path, status = response.status, "Request handled");
        response
    }
}

#[cfg(test)]
mod tests {
    use trellis::runtime::config::TrellisConfig;

    use super::*;
    use crate::requests::dependencies;
    use crate::routes::user_routes;
    use crate::service::{InMemoryUserService, seed};

    fn setup() -> (TrellisRuntime, Arc<dyn UserService>) {
        let runtime = TrellisRuntime::from_config(TrellisConfig::default());
        runtime.register_group(user_routes());

        let service: Arc<dyn UserService> = Arc::new(InMemoryUserService::new());
        seed(service.as_ref()).unwrap();
        runtime.bind(&dependencies(Arc::clone(&service))).unwrap();
        (runtime, service)
    }

    async fn login(client: &mut Client<'_>, username: &str, password: &str) -> u64 {
        let res = client
            .send(
                "POST",
                "/users/login",
                json!({ "username": username, "password": password }),
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.body);
        client.set_token(res.body["token"].as_str().map(str::to_string));
        res.body["user"]["id"].as_u64().unwrap()
    }

    #[tokio::test]
    async fn test_register_login_and_profile() {
        let (runtime, service) = setup();
        let mut client = Client::new(&runtime, service);

        let res = client
            .send(
                "POST",
                "/users/register",
                json!({
                    "username": "alice",
                    "email": "alice@example.com",
                    "password": "Alice1234",
                    "full_name": "Alice",
                    "role": "viewer",
                }),
            )
            .await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["role"], "viewer");

        let id = login(&mut client, "alice", "Alice1234").await;
        let me = client.send("GET", "/api/v1/users/me", Value::Null).await;
        assert_eq!(me.status, 200);
        assert_eq!(me.body["id"], id);
    }

    #[tokio::test]
    async fn test_protected_route_requires_token() {
        let (runtime, service) = setup();
        let client = Client::new(&runtime, service);

        let res = client.send("GET", "/api/v1/users", Value::Null).await;
        assert_eq!(res.status, 401);
        assert_eq!(res.body["error"], "unauthorized");
    }

    #[tokio::test]
    async fn test_path_params_reach_handlers() {
        let (runtime, service) = setup();
        let mut client = Client::new(&runtime, service);
        login(&mut client, "admin", "Admin123!").await;

        let res = client.send("GET", "/api/v1/users/2", Value::Null).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["username"], "user");

        let res = client
            .send("PUT", "/api/v1/users/2", json!({ "full_name": "Renamed" }))
            .await;
        assert_eq!(res.body["full_name"], "Renamed");

        let res = client.send("GET", "/api/v1/users/99", Value::Null).await;
        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn test_list_users_with_query_and_huge_offset() {
        let (runtime, service) = setup();
        let mut client = Client::new(&runtime, service);
        login(&mut client, "admin", "Admin123!").await;

        let res = client
            .send("GET", "/api/v1/users?limit=1", json!({ "limit": 1 }))
            .await;
        assert_eq!(res.status, 200, "{}", res.body);
        assert_eq!(res.body["has_more"], true);

        let res = client
            .send("GET", "/api/v1/users", json!({ "offset": u64::MAX }))
            .await;
        assert_eq!(res.status, 200, "{}", res.body);
        assert_eq!(res.body["users"], json!([]));
        assert_eq!(res.body["has_more"], false);
    }

    #[tokio::test]
    async fn test_users_cannot_modify_others() {
        let (runtime, service) = setup();
        let mut client = Client::new(&runtime, service);
        login(&mut client, "user", "User1234!").await;

        let res = client.send("DELETE", "/api/v1/users/1", Value::Null).await;
        assert_eq!(res.status, 403);
    }

    #[tokio::test]
    async fn test_routing_errors() {
        let (runtime, service) = setup();
        let client = Client::new(&runtime, service);

        let res = client.send("PATCH", "/api/v1/users/1", Value::Null).await;
        assert_eq!(res.status, 405);

        let res = client.send("GET", "/nowhere", Value::Null).await;
        assert_eq!(res.status, 404);
        assert_eq!(res.body["error"], "not_found");

        let res = client.send("POST", "/users/login", json!("not an object")).await;
        assert_eq!(res.status, 400);
    }
}
