use axum::{http::StatusCode, Json};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::schedule::format_hhmm;
use crate::store::CsvRecord;

// ── Stored records ──

/// One row of the bookings file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    #[serde(rename = "Nome")]
    pub client_name: String,
    /// Absent in files written by the phone-less form.
    #[serde(rename = "Telefone", default)]
    pub phone: Option<String>,
    #[serde(rename = "Barbeiro")]
    pub barber: String,
    #[serde(rename = "Data")]
    pub date: NaiveDate,
    #[serde(rename = "Hora", with = "hhmm")]
    pub time: NaiveTime,
}

impl CsvRecord for Booking {
    const COLUMNS: &'static [&'static str] = &["Nome", "Telefone", "Barbeiro", "Data", "Hora"];
    const REQUIRED: &'static [&'static str] = &["Nome", "Barbeiro", "Data", "Hora"];
}

/// One row of the clients file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    #[serde(rename = "Telefone")]
    pub phone: String,
    #[serde(rename = "Nome")]
    pub name: String,
    #[serde(rename = "Observações", default)]
    pub notes: String,
}

impl CsvRecord for Client {
    const COLUMNS: &'static [&'static str] = &["Telefone", "Nome", "Observações"];
    const REQUIRED: &'static [&'static str] = &["Telefone", "Nome"];
}

/// Serde adapter storing times as "HH:MM". Reads "HH:MM:SS" too.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    use crate::schedule::{format_hhmm, parse_hhmm};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_hhmm(*time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_hhmm(&raw)
            .or_else(|| NaiveTime::parse_from_str(raw.trim(), "%H:%M:%S").ok())
            .ok_or_else(|| de::Error::custom(format!("invalid time `{raw}`")))
    }
}

// ── API request/response types ──

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    /// May be left empty by a client whose phone is already registered.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub barber: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub time: String,
}

/// Fields are optional so a missing parameter is rejected by the handler.
#[derive(Debug, Default, Deserialize)]
pub struct AvailableTimesQuery {
    pub date: Option<String>,
    pub barber: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AvailableTimesResponse {
    pub date: String,
    pub barber: String,
    pub closed: bool,
    pub times: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CalendarQuery {
    pub year: Option<String>,
    pub month: Option<String>,
    pub barber: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CalendarDay {
    pub date: String,
    pub total: usize,
    pub free: usize,
    pub bookable: bool,
}

#[derive(Debug, Serialize)]
pub struct ScheduleResponse {
    pub slot_minutes: u32,
    pub days: Vec<crate::schedule::DayHours>,
}

#[derive(Debug, Serialize)]
pub struct ClientInfo {
    pub phone: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct ClientDetail {
    pub phone: String,
    pub name: String,
    pub notes: String,
}

impl From<&Client> for ClientDetail {
    fn from(c: &Client) -> Self {
        Self {
            phone: c.phone.clone(),
            name: c.name.clone(),
            notes: c.notes.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminBookingsQuery {
    /// Comma-separated barber names. All barbers when absent.
    pub barbers: Option<String>,
    pub date: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingDetail {
    pub client_name: String,
    pub phone: Option<String>,
    pub barber: String,
    pub date: String,
    pub time: String,
}

impl From<&Booking> for BookingDetail {
    fn from(b: &Booking) -> Self {
        Self {
            client_name: b.client_name.clone(),
            phone: b.phone.clone(),
            barber: b.barber.clone(),
            date: b.date.format("%Y-%m-%d").to_string(),
            time: format_hhmm(b.time),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub ok: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

/// Error half of every handler result.
pub type ApiError = (StatusCode, Json<ApiResponse<()>>);

pub fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    (status, Json(ApiResponse::error(msg)))
}
