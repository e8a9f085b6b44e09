//! Session provider boundary and the in-memory provider used in demo mode.

use std::collections::HashMap;

use chrono::{TimeDelta, Utc};
use parking_lot::Mutex;
use taskdeck_shared::{PasswordChange, ProfileUpdate, Session, SignIn, SignUp, User};
use tracing::{info, warn};
use uuid::Uuid;

use crate::backend::mock::{DEMO_EMAIL, DEMO_NAME, DEMO_USER_ID};
use crate::error::{TaskError, TaskResult};
use crate::validation;

pub const DEMO_PASSWORD: &str = "demo-password";
pub const SESSION_TTL_DAYS: i64 = 7;

#[allow(async_fn_in_trait)]
pub trait SessionProvider {
    /// The signed-in session, if any.
    async fn current_session(&self) -> Option<Session>;

    async fn sign_in(&self, req: &SignIn) -> TaskResult<Session>;

    async fn sign_up(&self, req: &SignUp) -> TaskResult<Session>;

    async fn sign_out(&self) -> TaskResult<()>;

    async fn change_password(&self, req: &PasswordChange) -> TaskResult<()>;

    async fn update_profile(&self, req: &ProfileUpdate) -> TaskResult<User>;
}

#[derive(Debug, Clone)]
struct DemoAccount {
    user: User,
    password: String,
}

#[derive(Debug, Default)]
struct DemoSessionState {
    // keyed by lowercased email
    accounts: HashMap<String, DemoAccount>,
    current: Option<Session>,
}

/// Accounts and the current session held in memory only.
#[derive(Debug, Default)]
pub struct DemoSessions {
    state: Mutex<DemoSessionState>,
}

impl DemoSessions {
    /// Provider with the demo account registered and nobody signed in.
    pub fn seeded() -> Self {
        let sessions = Self::default();
        sessions.state.lock().accounts.insert(
            DEMO_EMAIL.to_string(),
            DemoAccount {
                user: User {
                    id: DEMO_USER_ID.to_string(),
                    email: DEMO_EMAIL.to_string(),
                    name: Some(DEMO_NAME.to_string()),
                    created_at: Utc::now() - TimeDelta::days(30),
                },
                password: DEMO_PASSWORD.to_string(),
            },
        );
        sessions
    }

    /// Signs in as the seeded demo account.
    pub async fn sign_in_demo(&self) -> TaskResult<Session> {
        self.sign_in(&SignIn {
            email: DEMO_EMAIL.to_string(),
            password: DEMO_PASSWORD.to_string(),
        })
        .await
    }

    fn open_session(state: &mut DemoSessionState, user: User) -> Session {
        let session = Session {
            user,
            token: Uuid::new_v4().to_string(),
            expires_at: Utc::now() + TimeDelta::days(SESSION_TTL_DAYS),
        };
        state.current = Some(session.clone());
        session
    }
}

fn invalid_credentials() -> TaskError {
    TaskError::Remote {
        code: "INVALID_CREDENTIALS".to_string(),
        message: "Invalid email or password".to_string(),
    }
}

impl SessionProvider for DemoSessions {
    async fn current_session(&self) -> Option<Session> {
        let state = self.state.lock();
        state
            .current
            .clone()
            .filter(|session| session.expires_at > Utc::now())
    }

    async fn sign_in(&self, req: &SignIn) -> TaskResult<Session> {
        validation::validate_sign_in(req)?;
        let mut state = self.state.lock();
        let email = req.email.trim().to_lowercase();
        let Some(account) = state.accounts.get(&email) else {
            warn!("sign in for unknown email");
            return Err(invalid_credentials());
        };
        if account.password != req.password {
            warn!(user_id = %account.user.id, "sign in with wrong password");
            return Err(invalid_credentials());
        }
        let user = account.user.clone();
        info!(user_id = %user.id, "signed in");
        Ok(Self::open_session(&mut state, user))
    }

    async fn sign_up(&self, req: &SignUp) -> TaskResult<Session> {
        validation::validate_sign_up(req)?;
        let mut state = self.state.lock();
        let email = req.email.trim().to_lowercase();
        if state.accounts.contains_key(&email) {
            return Err(TaskError::Remote {
                code: "CONFLICT".to_string(),
                message: "An account with this email already exists".to_string(),
            });
        }
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: email.clone(),
            name: Some(req.name.trim().to_string()),
            created_at: Utc::now(),
        };
        state.accounts.insert(
            email,
            DemoAccount {
                user: user.clone(),
                password: req.password.clone(),
            },
        );
        info!(user_id = %user.id, "account created");
        Ok(Self::open_session(&mut state, user))
    }

    async fn sign_out(&self) -> TaskResult<()> {
        if let Some(session) = self.state.lock().current.take() {
            info!(user_id = %session.user.id, "signed out");
        }
        Ok(())
    }

    async fn change_password(&self, req: &PasswordChange) -> TaskResult<()> {
        validation::validate_password_change(req)?;
        let mut state = self.state.lock();
        let email = state
            .current
            .as_ref()
            .map(|session| session.user.email.to_lowercase())
            .ok_or(TaskError::Unauthorized)?;
        let account = state
            .accounts
            .get_mut(&email)
            .ok_or(TaskError::Unauthorized)?;
        if account.password != req.current_password {
            return Err(TaskError::Remote {
                code: "INVALID_CREDENTIALS".to_string(),
                message: "Current password is incorrect".to_string(),
            });
        }
        account.password = req.new_password.clone();
        info!(user_id = %account.user.id, "password changed");
        Ok(())
    }

    async fn update_profile(&self, req: &ProfileUpdate) -> TaskResult<User> {
        validation::validate_profile_update(req)?;
        let mut state = self.state.lock();
        let Some(session) = state.current.as_mut() else {
            return Err(TaskError::Unauthorized);
        };
        session.user.name = Some(req.name.trim().to_string());
        let user = session.user.clone();
        let email = user.email.to_lowercase();
        if let Some(account) = state.accounts.get_mut(&email) {
            account.user = user.clone();
        }
        Ok(user)
    }
}
