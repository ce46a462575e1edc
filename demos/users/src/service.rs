//! User business logic, independent of any router.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use trellis::Context;

const DEFAULT_PAGE_SIZE: usize = 10;
const MAX_PAGE_SIZE: usize = 100;
const MIN_PASSWORD_LEN: usize = 8;

// ─── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("user not found")]
    NotFound,

    #[error("user already exists")]
    AlreadyExists,

    #[error("invalid password")]
    InvalidPassword,

    #[error("invalid role '{0}'")]
    InvalidRole(String),

    #[error("{0}")]
    Validation(String),

    #[error("authentication required")]
    Unauthenticated,

    #[error("not allowed to modify user {0}")]
    Forbidden(u64),
}

impl ServiceError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::AlreadyExists => "conflict",
            Self::InvalidPassword | Self::Unauthenticated => "unauthorized",
            Self::InvalidRole(_) | Self::Validation(_) => "bad_request",
            Self::Forbidden(_) => "forbidden",
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

// ─── Models ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
    Viewer,
}

impl std::str::FromStr for Role {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            "viewer" => Ok(Self::Viewer),
            other => Err(ServiceError::InvalidRole(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
struct User {
    id: u64,
    username: String,
    email: String,
    password: String,
    full_name: String,
    role: Role,
}

impl User {
    fn update_profile(&mut self, full_name: Option<String>, email: Option<String>) {
        if let Some(full_name) = full_name.filter(|s| !s.is_empty()) {
            self.full_name = full_name;
        }
        if let Some(email) = email.filter(|s| !s.is_empty()) {
            self.email = email;
        }
    }
}

/// The authenticated caller, stored in the request [`Context`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: u64,
    pub role: Role,
}

/// Admins may modify anyone, other users only themselves.
pub fn authorize(ctx: &Context, target: u64) -> ServiceResult<()> {
    let current = ctx
        .value::<CurrentUser>()
        .ok_or(ServiceError::Unauthenticated)?;
    if current.role == Role::Admin || current.id == target {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(target))
    }
}

// ─── Request / response types ─────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ListUsersRequest {
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: Role,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            role: user.role,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserResponse,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListUsersResponse {
    pub users: Vec<UserResponse>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
    pub has_more: bool,
}

// ─── UserService trait ────────────────────────────────────────────────────────

/// User operations exposed over HTTP.
pub trait UserService: Send + Sync {
    fn create_user(&self, ctx: &Context, req: CreateUserRequest) -> ServiceResult<UserResponse>;

    fn get_user(&self, ctx: &Context, id: u64) -> ServiceResult<UserResponse>;

    fn update_user(
        &self,
        ctx: &Context,
        id: u64,
        req: UpdateUserRequest,
    ) -> ServiceResult<UserResponse>;

    fn delete_user(&self, ctx: &Context, id: u64) -> ServiceResult<()>;

    fn list_users(&self, ctx: &Context, req: ListUsersRequest) -> ServiceResult<ListUsersResponse>;

    fn change_password(
        &self,
        ctx: &Context,
        id: u64,
        req: ChangePasswordRequest,
    ) -> ServiceResult<()>;

    /// Checks credentials, accepting either the username or the email.
    fn login(&self, ctx: &Context, req: LoginRequest) -> ServiceResult<LoginResponse>;

    /// Maps a token issued by [`login`](Self::login) back to its user.
    fn authenticate(&self, token: &str) -> ServiceResult<CurrentUser>;

    /// Profile of the caller stored in `ctx`.
    fn profile(&self, ctx: &Context) -> ServiceResult<UserResponse> {
        let current = ctx
            .value::<CurrentUser>()
            .ok_or(ServiceError::Unauthenticated)?;
        self.get_user(ctx, current.id)
    }
}

// ─── InMemoryUserService ──────────────────────────────────────────────────────

const TOKEN_PREFIX: &str = "demo-token-";

/// [`UserService`] backed by a map. Passwords are kept in plain text.
pub struct InMemoryUserService {
    users: RwLock<BTreeMap<u64, User>>,
    next_id: AtomicU64,
}

impl InMemoryUserService {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn with_user<T>(
        &self,
        id: u64,
        f: impl FnOnce(&mut User) -> ServiceResult<T>,
    ) -> ServiceResult<T> {
        let mut users = self.users.write();
        let user = users.get_mut(&id).ok_or(ServiceError::NotFound)?;
        f(user)
    }
}

impl Default for InMemoryUserService {
    fn default() -> Self {
        Self::new()
    }
}

fn check_password(password: &str) -> ServiceResult<()> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ServiceError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

impl UserService for InMemoryUserService {
    fn create_user(&self, _ctx: &Context, req: CreateUserRequest) -> ServiceResult<UserResponse> {
        let role: Role = req.role.parse()?;
        if req.username.len() < 3 {
            return Err(ServiceError::Validation(
                "username must be at least 3 characters".into(),
            ));
        }
        if !req.email.contains('@') {
            return Err(ServiceError::Validation("email is invalid".into()));
        }
        check_password(&req.password)?;

        let mut users = self.users.write();
        if users
            .values()
            .any(|u| u.username == req.username || u.email == req.email)
        {
            return Err(ServiceError::AlreadyExists);
        }

        let user = User {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            username: req.username,
            email: req.email,
            password: req.password,
            full_name: req.full_name,
            role,
        };
        debug!(id = user.id, username = %user.username, "User created");

        let response = UserResponse::from(&user);
        users.insert(user.id, user);
        Ok(response)
    }

    fn get_user(&self, _ctx: &Context, id: u64) -> ServiceResult<UserResponse> {
        self.users
            .read()
            .get(&id)
            .map(UserResponse::from)
            .ok_or(ServiceError::NotFound)
    }

    fn update_user(
        &self,
        _ctx: &Context,
        id: u64,
        req: UpdateUserRequest,
    ) -> ServiceResult<UserResponse> {
        self.with_user(id, |user| {
            user.update_profile(req.full_name, req.email);
            Ok(UserResponse::from(&*user))
        })
    }

    fn delete_user(&self, _ctx: &Context, id: u64) -> ServiceResult<()> {
        self.users
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or(ServiceError::NotFound)
    }

    fn list_users(&self, _ctx: &Context, req: ListUsersRequest) -> ServiceResult<ListUsersResponse> {
        if req.limit > MAX_PAGE_SIZE {
            return Err(ServiceError::Validation(format!(
                "limit must be at most {MAX_PAGE_SIZE}"
            )));
        }
        let limit = if req.limit == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            req.limit
        };

        let users = self.users.read();
        let total = users.len();
        let page = users
            .values()
            .skip(req.offset)
            .take(limit)
            .map(UserResponse::from)
            .collect();

        Ok(ListUsersResponse {
            users: page,
            total,
            limit,
            offset: req.offset,
            has_more: req.offset.saturating_add(limit) < total,
        })
    }

    fn change_password(
        &self,
        _ctx: &Context,
        id: u64,
        req: ChangePasswordRequest,
    ) -> ServiceResult<()> {
        check_password(&req.new_password)?;
        self.with_user(id, |user| {
            if user.password != req.old_password {
                return Err(ServiceError::InvalidPassword);
            }
            user.password = req.new_password;
            Ok(())
        })
    }

    fn login(&self, _ctx: &Context, req: LoginRequest) -> ServiceResult<LoginResponse> {
        let users = self.users.read();
        let user = users
            .values()
            .find(|u| u.username == req.username)
            .or_else(|| users.values().find(|u| u.email == req.username))
            .ok_or(ServiceError::NotFound)?;

        if user.password != req.password {
            return Err(ServiceError::InvalidPassword);
        }

        Ok(LoginResponse {
            token: format!("{TOKEN_PREFIX}{}", user.id),
            user: UserResponse::from(user),
        })
    }

    fn authenticate(&self, token: &str) -> ServiceResult<CurrentUser> {
        let id = token
            .strip_prefix(TOKEN_PREFIX)
            .and_then(|id| id.parse::<u64>().ok())
            .ok_or(ServiceError::Unauthenticated)?;

        self.users
            .read()
            .get(&id)
            .map(|u| CurrentUser { id, role: u.role })
            .ok_or(ServiceError::Unauthenticated)
    }
}

/// Creates the accounts the demo starts with.
pub fn seed(service: &dyn UserService) -> ServiceResult<()> {
    let ctx = Context::new();
    let accounts = [
        ("admin", "admin@example.com", "Admin123!", "System Administrator", "admin"),
        ("user", "user@example.com", "User1234!", "Regular User", "user"),
    ];

    for (username, email, password, full_name, role) in accounts {
        match service.create_user(
            &ctx,
            CreateUserRequest {
                username: username.into(),
                email: email.into(),
                password: password.into(),
                full_name: full_name.into(),
                role: role.into(),
            },
        ) {
            Ok(_) | Err(ServiceError::AlreadyExists) => {}
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> InMemoryUserService {
        let service = InMemoryUserService::new();
        seed(&service).unwrap();
        service
    }

    #[test]
    fn test_seed_is_idempotent() {
        let service = seeded();
        seed(&service).unwrap();

        let page = service
            .list_users(&Context::new(), ListUsersRequest::default())
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.limit, DEFAULT_PAGE_SIZE);
        assert!(!page.has_more);
    }

    #[test]
    fn test_list_past_the_end_is_empty() {
        let service = seeded();
        let ctx = Context::new();

        let page = service
            .list_users(
                &ctx,
                ListUsersRequest {
                    limit: 1,
                    offset: 0,
                },
            )
            .unwrap();
        assert_eq!(page.users.len(), 1);
        assert!(page.has_more);

        let page = service
            .list_users(
                &ctx,
                ListUsersRequest {
                    limit: 0,
                    offset: usize::MAX,
                },
            )
            .unwrap();
        assert!(page.users.is_empty());
        assert_eq!(page.offset, usize::MAX);
        assert!(!page.has_more);
    }

    #[test]
    fn test_login_by_email_and_authenticate() {
        let service = seeded();
        let ctx = Context::new();

        let login = service
            .login(
                &ctx,
                LoginRequest {
                    username: "user@example.com".into(),
                    password: "User1234!".into(),
                },
            )
            .unwrap();
        assert_eq!(login.user.username, "user");

        let current = service.authenticate(&login.token).unwrap();
        assert_eq!(current.id, login.user.id);
        assert_eq!(current.role, Role::User);

        let ctx = ctx.with_value(current);
        assert_eq!(service.profile(&ctx).unwrap().username, "user");
    }

    #[test]
    fn test_profile_requires_current_user() {
        let service = seeded();
        assert!(matches!(
            service.profile(&Context::new()),
            Err(ServiceError::Unauthenticated)
        ));
    }

    #[test]
    fn test_change_password_checks_old_password() {
        let service = seeded();
        let ctx = Context::new();

        let err = service
            .change_password(
                &ctx,
                1,
                ChangePasswordRequest {
                    old_password: "wrong".into(),
                    new_password: "NewPass123".into(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidPassword));

        service
            .change_password(
                &ctx,
                1,
                ChangePasswordRequest {
                    old_password: "Admin123!".into(),
                    new_password: "NewPass123".into(),
                },
            )
            .unwrap();
    }

    #[test]
    fn test_authorize() {
        let admin = Context::new().with_value(CurrentUser {
            id: 1,
            role: Role::Admin,
        });
        let user = Context::new().with_value(CurrentUser {
            id: 2,
            role: Role::User,
        });

        assert!(authorize(&admin, 2).is_ok());
        assert!(authorize(&user, 2).is_ok());
        assert!(matches!(authorize(&user, 1), Err(ServiceError::Forbidden(1))));
        assert!(matches!(
            authorize(&Context::new(), 1),
            Err(ServiceError::Unauthenticated)
        ));
    }

    #[test]
    fn test_create_rejects_unknown_role_and_duplicates() {
        let service = seeded();
        let ctx = Context::new();
        let req = CreateUserRequest {
            username: "carol".into(),
            email: "carol@example.com".into(),
            password: "Carol1234".into(),
            full_name: "Carol".into(),
            role: "owner".into(),
        };

        let err = service.create_user(&ctx, req.clone()).unwrap_err();
        assert_eq!(err.code(), "bad_request");

        let dup = CreateUserRequest {
            username: "admin".into(),
            role: "viewer".into(),
            ..req
        };
        assert!(matches!(
            service.create_user(&ctx, dup),
            Err(ServiceError::AlreadyExists)
        ));
    }
}
