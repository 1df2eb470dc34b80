use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Logged-in user as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub name: String,
}

/// Persisted credential state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthState {
    pub token: Option<String>,
    pub user: Option<UserProfile>,
}

/// Process-wide credential holder, created once at startup and handed to
/// everything that talks to the backend.
///
/// `hydrate` is the init boundary and `clear` the teardown boundary.
#[derive(Debug)]
pub struct AuthContext {
    state: RwLock<AuthState>,
    storage_path: Option<PathBuf>,
}

impl AuthContext {
    /// In-memory context, never written to disk.
    pub fn in_memory() -> Self {
        Self {
            state: RwLock::new(AuthState::default()),
            storage_path: None,
        }
    }

    /// Loads persisted credentials from `path`, if the file exists.
    pub fn hydrate(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = if path.exists() {
            let content = fs::read_to_string(&path)
                .context("Failed to read auth state")?;
            serde_json::from_str(&content)
                .context("Failed to parse auth state")?
        } else {
            AuthState::default()
        };

        tracing::debug!(path = %path.display(), authenticated = state.token.is_some(), "auth state hydrated");

        Ok(Self {
            state: RwLock::new(state),
            storage_path: Some(path),
        })
    }

    /// Whether this context is backed by a credential file.
    pub fn is_persistent(&self) -> bool {
        self.storage_path.is_some()
    }

    pub fn token(&self) -> Option<String> {
        self.state.read().ok().and_then(|s| s.token.clone())
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.state.read().ok().and_then(|s| s.user.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    pub fn snapshot(&self) -> AuthState {
        self.state.read().map(|s| s.clone()).unwrap_or_default()
    }

    /// Stores a fresh credential after login.
    pub fn set_auth(&self, token: String, user: UserProfile) -> Result<()> {
        self.update(|state| {
            state.token = Some(token);
            state.user = Some(user);
        })
    }

    /// Replaces the stored profile and keeps the current token.
    pub fn set_user(&self, user: UserProfile) -> Result<()> {
        self.update(|state| state.user = Some(user))
    }

    /// Forgets the credential (logout, or a rejected token).
    pub fn clear(&self) -> Result<()> {
        self.update(|state| *state = AuthState::default())?;
        tracing::info!("credentials cleared");
        Ok(())
    }

    fn update(&self, apply: impl FnOnce(&mut AuthState)) -> Result<()> {
        {
            let mut state = self
                .state
                .write()
                .map_err(|_| anyhow!("Auth state lock poisoned"))?;
            apply(&mut state);
        }
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        let Some(path) = &self.storage_path else {
            return Ok(());
        };
        write_state(path, &self.snapshot())
    }
}

fn write_state(path: &Path, state: &AuthState) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .context("Failed to create auth state directory")?;
    }
    let content = serde_json::to_string_pretty(state)
        .context("Failed to serialize auth state")?;
    fs::write(path, content)
        .context("Failed to write auth state")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserProfile {
        UserProfile {
            id: "u1".into(),
            email: "trader@example.com".into(),
            name: "Trader".into(),
        }
    }

    #[test]
    fn credentials_survive_rehydration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.json");

        let auth = AuthContext::hydrate(&path).unwrap();
        assert!(auth.is_persistent());
        assert!(!auth.is_authenticated());
        auth.set_auth("tok-123".into(), user()).unwrap();

        let reloaded = AuthContext::hydrate(&path).unwrap();
        assert_eq!(reloaded.token().as_deref(), Some("tok-123"));
        assert_eq!(reloaded.user(), Some(user()));
    }

    #[test]
    fn clear_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("auth.json");

        let auth = AuthContext::hydrate(&path).unwrap();
        auth.set_auth("tok".into(), user()).unwrap();
        auth.clear().unwrap();

        let reloaded = AuthContext::hydrate(&path).unwrap();
        assert_eq!(reloaded.snapshot(), AuthState::default());
    }

    #[test]
    fn renamed_user_keeps_the_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.json");
        let auth = AuthContext::hydrate(&path).unwrap();
        auth.set_auth("tok".into(), user()).unwrap();

        auth.set_user(UserProfile {
            name: "Swing Trader".into(),
            ..user()
        })
        .unwrap();

        let reloaded = AuthContext::hydrate(&path).unwrap();
        assert_eq!(reloaded.token().as_deref(), Some("tok"));
        assert_eq!(reloaded.user().unwrap().name, "Swing Trader");
    }

    #[test]
    fn poisoned_state_is_an_error() {
        let auth = std::sync::Arc::new(AuthContext::in_memory());
        let poisoner = auth.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.state.write().unwrap();
            panic!("poison the lock");
        })
        .join();

        assert!(auth.set_auth("tok".into(), user()).is_err());
        assert!(auth.clear().is_err());
        assert!(!auth.is_persistent());
    }
}
