#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Env {
    Dev,
    Staging,
    Production,
}

pub struct ServerConfig {
    pub env: Env,

    /// Port the API binds to
    pub port: u16,

    /// HMAC key for the `X-Signature` response header. Signing is skipped
    /// when unset.
    pub api_secret: Option<String>,

    pub hf: HfConfig,
}

/// Hugging Face inference configuration for the enricher.
pub struct HfConfig {
    /// Ordered credential pool, rotated per upstream call.
    pub tokens: Vec<String>,

    /// When true, model identifiers may be full dedicated-endpoint URLs.
    pub use_endpoints: bool,

    /// Enrichment cap per request; items past it are passed through.
    pub max_enrich: usize,

    /// TTL of cached enrichment results, in seconds.
    pub enrich_ttl_secs: u64,
}

fn var(key: &str) -> Option<String> {
    match std::env::var(key) {
        Ok(val) => Some(val),
        Err(std::env::VarError::NotPresent) => None,
        Err(std::env::VarError::NotUnicode(_)) => {
            tracing::warn!("Environment variable `{key}` is not valid unicode, ignoring");
            None
        }
    }
}

/// Credential pool: either a JSON list in `HF_TOKENS_JSON` or lettered
/// scalars `HF_TOKEN_A`, `HF_TOKEN_B`, ... read in order until the first
/// missing one.
fn hf_tokens() -> Vec<String> {
    if let Some(raw) = var("HF_TOKENS_JSON") {
        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(tokens) => return tokens,
            Err(err) => {
                tracing::warn!(?err, "HF_TOKENS_JSON is not a JSON string list, ignoring");
            }
        }
    }

    let mut tokens = Vec::new();
    for suffix in 'A'..='Z' {
        match var(&format!("HF_TOKEN_{suffix}")) {
            Some(token) => tokens.push(token),
            None => break,
        }
    }
    tokens
}

impl ServerConfig {
    pub fn new_from_env() -> Self {
        let env = match var("ENVIRONMENT").as_deref() {
            Some("staging") => Env::Staging,
            Some("production") => Env::Production,
            _ => Env::Dev,
        };

        let port = var("PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(8787);

        let api_secret = var("API_SECRET").filter(|s| !s.is_empty());
        if api_secret.is_none() {
            tracing::warn!("API_SECRET not set, responses will not be signed");
        }

        let tokens = hf_tokens();
        if tokens.is_empty() {
            tracing::warn!("No HF tokens configured, enrichment will return items unchanged");
        }

        let hf = HfConfig {
            tokens,
            use_endpoints: var("HF_USE_ENDPOINTS").as_deref() == Some("true"),
            max_enrich: var("MAX_HF_ENRICH")
                .and_then(|v| v.parse().ok())
                .unwrap_or(25),
            enrich_ttl_secs: var("ENRICH_TTL_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(3600),
        };

        ServerConfig {
            env,
            port,
            api_secret,
            hf,
        }
    }
}
