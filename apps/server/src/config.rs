use anyhow::{bail, Context};
use chrono::{FixedOffset, NaiveDate, Utc};
use std::path::PathBuf;

use crate::auth::AdminCredential;
use crate::schedule::{WeeklySchedule, DEFAULT_SHOP_HOURS, DEFAULT_SLOT_MINUTES};

const DEFAULT_BARBERS: &str = "Barbeiro1,Barbeiro2,Barbeiro3";
/// Brasília time.
const DEFAULT_UTC_OFFSET_HOURS: i32 = -3;

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub bookings_path: PathBuf,
    pub clients_path: PathBuf,
    pub barbers: Vec<String>,
    pub schedule: WeeklySchedule,
    pub utc_offset: FixedOffset,
    pub admin: AdminCredential,
    /// Front-end origin allowed by CORS. Any origin when unset.
    pub webapp_url: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key → value source. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match get("PORT") {
            Some(p) => p.trim().parse().context("PORT must be a port number")?,
            None => 3000,
        };

        let slot_minutes = match get("SLOT_MINUTES") {
            Some(m) => m.trim().parse().context("SLOT_MINUTES must be a whole number")?,
            None => DEFAULT_SLOT_MINUTES,
        };
        let hours = get("SHOP_HOURS").unwrap_or_else(|| DEFAULT_SHOP_HOURS.to_string());
        let schedule =
            WeeklySchedule::parse(&hours, slot_minutes).context("invalid SHOP_HOURS / SLOT_MINUTES")?;

        let barbers = parse_barbers(&get("BARBERS").unwrap_or_else(|| DEFAULT_BARBERS.to_string()))?;

        let offset_hours: i32 = match get("SHOP_UTC_OFFSET_HOURS") {
            Some(h) => h
                .trim()
                .parse()
                .context("SHOP_UTC_OFFSET_HOURS must be a whole number of hours")?,
            None => DEFAULT_UTC_OFFSET_HOURS,
        };
        let utc_offset = offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .context("SHOP_UTC_OFFSET_HOURS is out of range")?;

        let admin = if let Some(digest) = get("ADMIN_PASSWORD_SHA256") {
            AdminCredential::from_sha256_hex(&digest).context("invalid ADMIN_PASSWORD_SHA256")?
        } else if let Some(password) = get("ADMIN_PASSWORD") {
            AdminCredential::from_password(&password)
        } else {
            bail!("ADMIN_PASSWORD or ADMIN_PASSWORD_SHA256 must be set");
        };

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            bookings_path: get("BOOKINGS_CSV")
                .unwrap_or_else(|| "agendamentos.csv".into())
                .into(),
            clients_path: get("CLIENTS_CSV")
                .unwrap_or_else(|| "clientes.csv".into())
                .into(),
            barbers,
            schedule,
            utc_offset,
            admin,
            webapp_url: get("WEBAPP_URL"),
        })
    }

    /// Today's date in the shop's time zone.
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.utc_offset).date_naive()
    }

    pub fn is_known_barber(&self, name: &str) -> bool {
        self.barbers.iter().any(|b| b == name)
    }
}

fn parse_barbers(list: &str) -> anyhow::Result<Vec<String>> {
    let mut barbers: Vec<String> = Vec::new();
    for name in list.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        if barbers.iter().any(|b| b == name) {
            bail!("BARBERS lists {name} twice");
        }
        barbers.push(name.to_string());
    }
    if barbers.is_empty() {
        bail!("BARBERS must name at least one barber");
    }
    Ok(barbers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[("ADMIN_PASSWORD", "admin123")]).unwrap();
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.bookings_path, PathBuf::from("agendamentos.csv"));
        assert_eq!(cfg.clients_path, PathBuf::from("clientes.csv"));
        assert_eq!(cfg.barbers, vec!["Barbeiro1", "Barbeiro2", "Barbeiro3"]);
        assert_eq!(cfg.schedule.step_minutes(), 30);
        assert!(cfg.schedule.hours_for(Weekday::Sun).is_none());
        assert_eq!(cfg.utc_offset.local_minus_utc(), -3 * 3600);
        assert!(cfg.admin.verify("admin123"));
        assert!(cfg.webapp_url.is_none());
    }

    #[test]
    fn test_admin_secret_required() {
        let err = config(&[]).unwrap_err();
        assert!(err.to_string().contains("ADMIN_PASSWORD"));
        assert!(config(&[("ADMIN_PASSWORD", "   ")]).is_err());
    }

    #[test]
    fn test_hashed_secret_wins() {
        let cfg = config(&[
            ("ADMIN_PASSWORD", "ignored"),
            (
                "ADMIN_PASSWORD_SHA256",
                "240be518fabd2724ddb6f04eeb1da5967448d7e831c08c8fa822809f74c720a9",
            ),
        ])
        .unwrap();
        assert!(cfg.admin.verify("admin123"));
        assert!(!cfg.admin.verify("ignored"));
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[
            ("ADMIN_PASSWORD", "x"),
            ("PORT", "8080"),
            ("BARBERS", " Zé , Rafa "),
            ("SHOP_HOURS", "sat=08:00-12:00"),
            ("SLOT_MINUTES", "60"),
            ("SHOP_UTC_OFFSET_HOURS", "1"),
            ("BOOKINGS_CSV", "/data/b.csv"),
            ("WEBAPP_URL", "https://agenda.example.com"),
        ])
        .unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.barbers, vec!["Zé", "Rafa"]);
        assert!(cfg.is_known_barber("Rafa"));
        assert!(!cfg.is_known_barber("Barbeiro1"));
        assert_eq!(cfg.schedule.step_minutes(), 60);
        assert!(cfg.schedule.hours_for(Weekday::Mon).is_none());
        assert!(cfg.schedule.hours_for(Weekday::Sat).is_some());
        assert_eq!(cfg.utc_offset.local_minus_utc(), 3600);
        assert_eq!(cfg.bookings_path, PathBuf::from("/data/b.csv"));
        assert_eq!(cfg.webapp_url.as_deref(), Some("https://agenda.example.com"));
    }

    #[test]
    fn test_invalid_values_fail() {
        assert!(config(&[("ADMIN_PASSWORD", "x"), ("PORT", "http")]).is_err());
        assert!(config(&[("ADMIN_PASSWORD", "x"), ("SLOT_MINUTES", "0")]).is_err());
        assert!(config(&[("ADMIN_PASSWORD", "x"), ("SHOP_HOURS", "mon=nine-five")]).is_err());
        assert!(config(&[("ADMIN_PASSWORD", "x"), ("SHOP_UTC_OFFSET_HOURS", "30")]).is_err());
        assert!(config(&[("ADMIN_PASSWORD", "x"), ("SHOP_UTC_OFFSET_HOURS", "1000000")]).is_err());
        assert!(config(&[("ADMIN_PASSWORD", "x"), ("SHOP_UTC_OFFSET_HOURS", "-1000000")]).is_err());
        assert!(config(&[("ADMIN_PASSWORD", "x"), ("BARBERS", " , ")]).is_err());
        assert!(config(&[("ADMIN_PASSWORD", "x"), ("BARBERS", "Ana,Ana")]).is_err());
    }
}
