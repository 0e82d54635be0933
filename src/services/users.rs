use crate::{
    auth::{Principal, TokenIssuer},
    error::{Error, Result},
    lifecycle::LifecycleManager,
    models::{
        CreateUserRequest, LoginRequest, LoginResponse, NewUser, UpdateUserRequest, User,
        UserFilter, UserPatch, UserView,
    },
    observe::{Event, ObserverState},
    passwords::{UNKNOWN_USER_HASH, hash_password, verify_password},
    roles::Role,
    validation::{PASSWORD_LEN, ValidationErrors},
};

const BAD_LOGIN: &str = "Invalid username or password.";

/// UserService
///
/// Account management and login. Every value it returns is a `UserView` or a
/// `LoginResponse`; a `User` with its password hash never leaves this type.
#[derive(Clone)]
pub struct UserService {
    users: LifecycleManager<User>,
    issuer: TokenIssuer,
    observer: ObserverState,
}

impl UserService {
    pub fn new(users: LifecycleManager<User>, issuer: TokenIssuer, observer: ObserverState) -> Self {
        Self {
            users,
            issuer,
            observer,
        }
    }

    pub async fn list(&self, filter: &UserFilter) -> Result<Vec<UserView>> {
        let users = self.users.find_live(filter).await?;
        Ok(users.iter().map(UserView::from).collect())
    }

    pub async fn get_by_id(&self, id: i64) -> Result<UserView> {
        let user = self.users.get_live(id).await?;
        Ok(UserView::from(&user))
    }

    /// register
    ///
    /// Anonymous self-registration. Only the `User` role can be requested
    /// this way; Admin accounts are created by an Admin through `create`.
    pub async fn register(&self, req: CreateUserRequest) -> Result<UserView> {
        let role: Role = req.role.parse()?;
        if role == Role::Admin {
            return Err(Error::Forbidden(
                "Admin accounts can only be created by an Admin".to_string(),
            ));
        }
        self.create_with_role(req, role).await
    }

    /// create
    ///
    /// Creates an account with any registered role. An unknown role is
    /// rejected before anything is hashed or stored.
    pub async fn create(&self, req: CreateUserRequest) -> Result<UserView> {
        let role: Role = req.role.parse()?;
        self.create_with_role(req, role).await
    }

    async fn create_with_role(&self, req: CreateUserRequest, role: Role) -> Result<UserView> {
        check_password(&req.password)?;
        let password_hash = hash_password(&req.password)?;

        let user = self
            .users
            .create(NewUser {
                username: req.username,
                password_hash,
                role,
            })
            .await?;
        Ok(UserView::from(&user))
    }

    /// update
    ///
    /// The actor must be the account's owner or an Admin. Only an Admin may
    /// change a role.
    pub async fn update(
        &self,
        actor: &Principal,
        id: i64,
        req: UpdateUserRequest,
    ) -> Result<UserView> {
        actor.require_self_or_admin(id)?;

        let role = match req.role.as_deref() {
            Some(raw) => {
                let role: Role = raw.parse()?;
                actor.require_role(Role::Admin)?;
                Some(role)
            }
            None => None,
        };

        let password_hash = match req.password.as_deref() {
            Some(password) => {
                check_password(password)?;
                Some(hash_password(password)?)
            }
            None => None,
        };

        let existing = self.users.get_live(id).await?;
        let updated = self
            .users
            .update(
                existing,
                UserPatch {
                    username: req.username,
                    password_hash,
                    role,
                },
            )
            .await?;
        Ok(UserView::from(&updated))
    }

    /// Logical delete; Admin only.
    pub async fn delete(&self, actor: &Principal, id: i64) -> Result<()> {
        actor.require_role(Role::Admin)?;
        self.users.soft_delete(id).await
    }

    /// login
    ///
    /// Looks up a live user by username and checks the password. Unknown
    /// user and wrong password produce the same `NotFound`, and no token.
    pub async fn login(&self, req: LoginRequest) -> Result<LoginResponse> {
        let candidate = self
            .users
            .find_live(&UserFilter {
                username: Some(req.username.clone()),
            })
            .await?
            .into_iter()
            .next();

        let verified = match &candidate {
            Some(user) => verify_password(&req.password, &user.password_hash)?,
            None => {
                verify_password(&req.password, UNKNOWN_USER_HASH)?;
                false
            }
        };

        let user = match candidate {
            Some(user) if verified => user,
            _ => {
                self.observer.observe(&Event::LoginFailed {
                    username: req.username,
                });
                return Err(Error::NotFound(BAD_LOGIN.to_string()));
            }
        };

        let issued = self
            .issuer
            .issue(user.id, user.role.as_str(), self.users.now())?;
        Ok(LoginResponse::authenticated(issued.token))
    }

    /// Logout is client-side only; there is nothing to revoke.
    pub fn logout(&self) -> LoginResponse {
        LoginResponse::logged_out()
    }
}

fn check_password(password: &str) -> Result<()> {
    let mut errors = ValidationErrors::new();
    errors.check_length("password", password, PASSWORD_LEN.0, PASSWORD_LEN.1);
    errors.into_result().map_err(Error::Validation)
}
