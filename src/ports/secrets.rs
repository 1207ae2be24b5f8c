/// Named secret lookup (API keys, endpoints with embedded tokens)
pub trait SecretStore: Send + Sync {
    fn secret(&self, name: &str) -> Option<String>;
}
