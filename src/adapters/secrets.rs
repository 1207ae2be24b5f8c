use crate::ports::SecretStore;

/// Secrets from the process environment, after `.env` has been loaded
#[derive(Debug, Clone, Default)]
pub struct EnvSecretStore {
    prefix: Option<String>,
}

impl EnvSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look names up as `{prefix}{name}` first, then bare
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Load `.env` from the working directory if present
    pub fn load_dotenv() {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }
    }
}

impl SecretStore for EnvSecretStore {
    fn secret(&self, name: &str) -> Option<String> {
        let prefixed = self
            .prefix
            .as_ref()
            .and_then(|p| std::env::var(format!("{}{}", p, name)).ok());
        prefixed
            .or_else(|| std::env::var(name).ok())
            .filter(|v| !v.trim().is_empty())
    }
}
