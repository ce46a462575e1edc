//! Route groups for the user API.
//!
//! | Group     | Options                              | Routes                                   |
//! |-----------|--------------------------------------|------------------------------------------|
//! | public    | `public=true`                        | register, login                          |
//! | protected | `protected=true`, `prefix=/api/v1`   | me, get, update, delete, change password, list |

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use trellis::{Context, Groups, RouteGroup, define_group_with, options, register};

use crate::service::{
    ChangePasswordRequest, CreateUserRequest, ListUsersRequest, LoginRequest, UpdateUserRequest,
    UserService, authorize,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPath {
    pub id: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateUserParams {
    pub id: u64,
    #[serde(flatten)]
    pub req: UpdateUserRequest,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangePasswordParams {
    pub id: u64,
    #[serde(flatten)]
    pub req: ChangePasswordRequest,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

impl SuccessResponse {
    fn new(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
        }
    }
}

/// Both user groups, bound in declaration order.
pub fn user_routes() -> Groups {
    let groups = Groups::new();
    groups.register(public_routes()).register(protected_routes());
    groups
}

/// Routes reachable without a token.
pub fn public_routes() -> RouteGroup<Arc<dyn UserService>> {
    define_group_with(
        |router, svc: Arc<dyn UserService>| {
            let users = Arc::clone(&svc);
            register(router, "POST", "/users/register", move |ctx: Context, p: CreateUserRequest| {
                let result = users.create_user(&ctx, p);
                async move { result }
            });

            let users = svc;
            register(router, "POST", "/users/login", move |ctx: Context, p: LoginRequest| {
                let result = users.login(&ctx, p);
                async move { result }
            });
        },
        vec![options([("public", "true")])],
    )
}

/// Routes that need an authenticated caller in the [`Context`].
pub fn protected_routes() -> RouteGroup<Arc<dyn UserService>> {
    define_group_with(
        |router, svc: Arc<dyn UserService>| {
            let users = Arc::clone(&svc);
            register(router, "GET", "/users/me", move |ctx: Context, _: ()| {
                let result = users.profile(&ctx);
                async move { result }
            });

            let users = Arc::clone(&svc);
            register(router, "GET", "/users/:id", move |ctx: Context, p: UserPath| {
                let result = users.get_user(&ctx, p.id);
                async move { result }
            });

            let users = Arc::clone(&svc);
            register(router, "PUT", "/users/:id", move |ctx: Context, p: UpdateUserParams| {
                let result =
                    authorize(&ctx, p.id).and_then(|()| users.update_user(&ctx, p.id, p.req));
                async move { result }
            });

            let users = Arc::clone(&svc);
            register(router, "DELETE", "/users/:id", move |ctx: Context, p: UserPath| {
                let result = authorize(&ctx, p.id)
                    .and_then(|()| users.delete_user(&ctx, p.id))
                    .map(|()| SuccessResponse::new("User deleted successfully"));
                async move { result }
            });

            let users = Arc::clone(&svc);
            register(
                router,
                "POST",
                "/users/:id/change-password",
                move |ctx: Context, p: ChangePasswordParams| {
                    let result = authorize(&ctx, p.id)
                        .and_then(|()| users.change_password(&ctx, p.id, p.req))
                        .map(|()| SuccessResponse::new("Password changed successfully"));
                    async move { result }
                },
            );

            let users = svc;
            register(router, "GET", "/users", move |ctx: Context, p: ListUsersRequest| {
                let result = users.list_users(&ctx, p);
                async move { result }
            });
        },
        vec![options([("protected", "true"), ("prefix", "/api/v1")])],
    )
}
