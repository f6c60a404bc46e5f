use std::env;
use std::time::Duration;

use chrono_tz::Tz;

const DEFAULT_CLINIC_TZ: Tz = chrono_tz::Europe::Madrid;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub public_base_url: String,
    pub cors_origin: Option<String>,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub openai_api_key: String,
    pub openai_model: String,
    pub ai_timeout: Duration,
    pub ai_max_output_tokens: u32,
    pub resend_api_key: String,
    pub email_from: String,
    pub email_timeout: Duration,
    /// Zone of the clinic wall clock the slot grid is expressed in.
    pub clinic_tz: Tz,
    pub script_path: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "vetchat.db".to_string()),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            cors_origin: env::var("CORS_ORIGIN").ok().filter(|v| !v.is_empty()),
            gemini_api_key: env::var("GEMINI_API_KEY").unwrap_or_default(),
            gemini_model: env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-2.0-flash".to_string()),
            openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
            openai_model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            ai_timeout: secs_var("AI_TIMEOUT_SECS", 8),
            ai_max_output_tokens: env::var("AI_MAX_OUTPUT_TOKENS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(220),
            resend_api_key: env::var("RESEND_API_KEY").unwrap_or_default(),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "Demo VetChat <demo@vetchat.local>".to_string()),
            email_timeout: secs_var("EMAIL_TIMEOUT_SECS", 10),
            clinic_tz: env::var("CLINIC_TZ")
                .ok()
                .filter(|v| !v.is_empty())
                .map(|v| parse_clinic_tz(&v))
                .unwrap_or(DEFAULT_CLINIC_TZ),
            script_path: env::var("SCRIPT_PATH").ok().filter(|v| !v.is_empty()),
        }
    }
}

/// Outbound HTTP timeouts; zero would disable the bound, so it is ignored.
fn secs_var(name: &str, default: u64) -> Duration {
    let secs = env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(default);
    Duration::from_secs(secs)
}

fn parse_clinic_tz(name: &str) -> Tz {
    name.parse().unwrap_or_else(|_| {
        tracing::warn!(name, "unknown CLINIC_TZ, falling back to Europe/Madrid");
        DEFAULT_CLINIC_TZ
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeouts_are_always_bounded() {
        env::set_var("VETCHAT_TEST_ZERO_TIMEOUT", "0");
        env::set_var("VETCHAT_TEST_BAD_TIMEOUT", "soon");
        env::set_var("VETCHAT_TEST_TIMEOUT", "3");

        assert_eq!(secs_var("VETCHAT_TEST_UNSET_TIMEOUT", 10), Duration::from_secs(10));
        assert_eq!(secs_var("VETCHAT_TEST_ZERO_TIMEOUT", 10), Duration::from_secs(10));
        assert_eq!(secs_var("VETCHAT_TEST_BAD_TIMEOUT", 10), Duration::from_secs(10));
        assert_eq!(secs_var("VETCHAT_TEST_TIMEOUT", 10), Duration::from_secs(3));
    }

    #[test]
    fn test_parse_clinic_tz() {
        assert_eq!(parse_clinic_tz("Atlantic/Canary"), chrono_tz::Atlantic::Canary);
        assert_eq!(parse_clinic_tz("Mars/Olympus"), DEFAULT_CLINIC_TZ);
    }
}
