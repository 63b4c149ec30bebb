use std::env;
use std::str::FromStr;
use tracing::warn;

/// Which persistence backend the scheduling store runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Supabase,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "supabase" => Ok(StoreBackend::Supabase),
            other => Err(format!("unknown store backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub store_backend: StoreBackend,
    pub booking_lookahead_days: u32,
    pub workday_start_hour: u32,
    pub workday_end_hour: u32,
    pub slot_minutes: u32,
    pub request_timeout_secs: u64,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_service_role_key: String::new(),
            store_backend: StoreBackend::Memory,
            booking_lookahead_days: 14,
            workday_start_hour: 9,
            workday_end_hour: 17,
            slot_minutes: 30,
            request_timeout_secs: 10,
            port: 3000,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_ROLE_KEY not set, using empty value");
                    String::new()
                }),
            store_backend: parse_var("STORE_BACKEND", defaults.store_backend),
            booking_lookahead_days: parse_var("BOOKING_LOOKAHEAD_DAYS", defaults.booking_lookahead_days),
            workday_start_hour: parse_var("WORKDAY_START_HOUR", defaults.workday_start_hour),
            workday_end_hour: parse_var("WORKDAY_END_HOUR", defaults.workday_end_hour),
            slot_minutes: parse_var("SLOT_MINUTES", defaults.slot_minutes),
            request_timeout_secs: parse_var("REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs),
            port: parse_var("PORT", defaults.port),
        };

        if config.store_backend == StoreBackend::Supabase && !config.is_supabase_configured() {
            warn!("Supabase backend selected but SUPABASE_URL / keys are missing");
        }

        if config.workday_start_hour >= config.workday_end_hour || config.workday_end_hour > 24 {
            warn!(
                "Working hours {}..{} are not a valid range, falling back to {}..{}",
                config.workday_start_hour, config.workday_end_hour,
                defaults.workday_start_hour, defaults.workday_end_hour
            );
            return Self {
                workday_start_hour: defaults.workday_start_hour,
                workday_end_hour: defaults.workday_end_hour,
                ..config
            };
        }

        config
    }

    pub fn is_supabase_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && (!self.supabase_service_role_key.is_empty() || !self.supabase_anon_key.is_empty())
    }
}

fn parse_var<T>(name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {:?}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_backend_parses_case_insensitively() {
        assert_eq!("Memory".parse::<StoreBackend>(), Ok(StoreBackend::Memory));
        assert_eq!(" supabase ".parse::<StoreBackend>(), Ok(StoreBackend::Supabase));
        assert!("postgres".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn defaults_match_clinic_policy() {
        let config = AppConfig::default();
        assert_eq!(config.booking_lookahead_days, 14);
        assert_eq!((config.workday_start_hour, config.workday_end_hour), (9, 17));
        assert_eq!(config.slot_minutes, 30);
        assert!(!config.is_supabase_configured());
    }
}
