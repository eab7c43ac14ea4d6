use std::env;
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_CALENDAR_VISIBLE_LIMIT: usize = 3;
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";

/// Which Record Store backs the appointment cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Supabase,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" | "in_memory" | "in-memory" => Ok(StoreBackend::Memory),
            "supabase" | "postgrest" => Ok(StoreBackend::Supabase),
            other => Err(format!("unknown appointment store backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub store_backend: StoreBackend,
    pub calendar_visible_limit: usize,
    pub bind_address: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let supabase_url = env::var("SUPABASE_URL")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_URL not set, using empty value");
                String::new()
            });
        let supabase_anon_key = env::var("SUPABASE_ANON_PUBLIC_KEY")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                String::new()
            });
        let supabase_jwt_secret = env::var("SUPABASE_JWT_SECRET")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_JWT_SECRET not set, using empty value");
                String::new()
            });

        let supabase_ready = !supabase_url.is_empty() && !supabase_anon_key.is_empty();

        let store_backend = match env::var("APPOINTMENT_STORE") {
            Ok(value) => value.parse().unwrap_or_else(|e: String| {
                warn!("{}, falling back to in-memory store", e);
                StoreBackend::Memory
            }),
            Err(_) if supabase_ready => StoreBackend::Supabase,
            Err(_) => {
                warn!("APPOINTMENT_STORE not set and Supabase not configured, using in-memory store");
                StoreBackend::Memory
            }
        };

        let calendar_visible_limit = env::var("CALENDAR_VISIBLE_LIMIT")
            .ok()
            .and_then(|value| match value.parse::<usize>() {
                Ok(limit) if limit > 0 => Some(limit),
                _ => {
                    warn!("CALENDAR_VISIBLE_LIMIT={} is not a positive integer, using default", value);
                    None
                }
            })
            .unwrap_or(DEFAULT_CALENDAR_VISIBLE_LIMIT);

        let bind_address = env::var("BIND_ADDRESS")
            .unwrap_or_else(|_| DEFAULT_BIND_ADDRESS.to_string());

        let config = Self {
            supabase_url,
            supabase_anon_key,
            supabase_jwt_secret,
            store_backend,
            calendar_visible_limit,
            bind_address,
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_jwt_secret: String::new(),
            store_backend: StoreBackend::Memory,
            calendar_visible_limit: DEFAULT_CALENDAR_VISIBLE_LIMIT,
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
        }
    }
}
