use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{Datelike, NaiveDate};
use std::sync::Arc;

use crate::{
    clients::Registration,
    ledger::LedgerError,
    models::*,
    schedule::{format_hhmm, parse_hhmm},
    AppState,
};

const INCOMPLETE_SUBMISSION: &str = "Preencha todos os campos obrigatórios.";
const SHOP_CLOSED: &str = "Barbearia fechada neste dia.";

/// Parse a "YYYY-MM-DD" request field.
pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        api_error(
            StatusCode::BAD_REQUEST,
            "Data inválida. Use o formato AAAA-MM-DD.",
        )
    })
}

/// Trimmed value of a query parameter that must be present and non-blank.
fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, ApiError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            api_error(
                StatusCode::BAD_REQUEST,
                format!("Parâmetro obrigatório ausente: {}", name),
            )
        })
}

pub(crate) fn require_barber(state: &AppState, barber: &str) -> Result<(), ApiError> {
    if state.config.is_known_barber(barber) {
        Ok(())
    } else {
        Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("Barbeiro desconhecido: {}", barber),
        ))
    }
}

// ── Endpoints ──

/// GET /api/barbers
pub async fn list_barbers(State(state): State<Arc<AppState>>) -> Json<ApiResponse<Vec<String>>> {
    Json(ApiResponse::success(state.config.barbers.clone()))
}

/// GET /api/schedule — weekly opening hours.
pub async fn schedule(State(state): State<Arc<AppState>>) -> Json<ApiResponse<ScheduleResponse>> {
    let schedule = &state.config.schedule;
    Json(ApiResponse::success(ScheduleResponse {
        slot_minutes: schedule.step_minutes(),
        days: schedule.week(),
    }))
}

/// GET /api/available-times?date=YYYY-MM-DD&barber=NAME
pub async fn available_times(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AvailableTimesQuery>,
) -> Result<Json<ApiResponse<AvailableTimesResponse>>, ApiError> {
    let barber = required(&query.barber, "barber")?;
    require_barber(&state, barber)?;
    let date = parse_date(required(&query.date, "date")?)?;

    let schedule = &state.config.schedule;
    let closed = schedule.slots_for(date).is_empty();
    let times = state
        .ledger
        .lock()
        .await
        .available_slots(schedule, date, barber)
        .into_iter()
        .map(format_hhmm)
        .collect();

    Ok(Json(ApiResponse::success(AvailableTimesResponse {
        date: date.format("%Y-%m-%d").to_string(),
        barber: barber.to_string(),
        closed,
        times,
    })))
}

/// GET /api/calendar?year=2025&month=1&barber=NAME — per-day slot counts from today on.
pub async fn calendar(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CalendarQuery>,
) -> Result<Json<ApiResponse<Vec<CalendarDay>>>, ApiError> {
    let barber = required(&query.barber, "barber")?;
    require_barber(&state, barber)?;
    let invalid_month = || api_error(StatusCode::BAD_REQUEST, "Mês inválido.");
    let year: i32 = required(&query.year, "year")?
        .parse()
        .map_err(|_| invalid_month())?;
    let month: u32 = required(&query.month, "month")?
        .parse()
        .map_err(|_| invalid_month())?;
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid_month)?;

    let today = state.config.today();
    let schedule = &state.config.schedule;
    let ledger = state.ledger.lock().await;

    let days: Vec<CalendarDay> = first
        .iter_days()
        .take_while(|d| d.month() == month)
        .filter(|d| *d >= today)
        .map(|d| {
            let total = schedule.slots_for(d).len();
            let free = ledger.available_slots(schedule, d, barber).len();
            CalendarDay {
                date: d.format("%Y-%m-%d").to_string(),
                total,
                free,
                bookable: free > 0,
            }
        })
        .collect();

    Ok(Json(ApiResponse::success(days)))
}

/// GET /api/clients/:phone — name of a returning client.
pub async fn lookup_client(
    State(state): State<Arc<AppState>>,
    Path(phone): Path<String>,
) -> Result<Json<ApiResponse<ClientInfo>>, ApiError> {
    let registry = state.clients.lock().await;
    let client = registry
        .lookup(&phone)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Cliente não encontrado."))?;

    Ok(Json(ApiResponse::success(ClientInfo {
        phone: client.phone.clone(),
        name: client.name.clone(),
    })))
}

/// POST /api/bookings — validate, then check-and-append under the ledger lock.
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateBookingRequest>,
) -> Result<Json<ApiResponse<BookingDetail>>, ApiError> {
    let phone = body.phone.trim();
    let barber = body.barber.trim();
    if [phone, barber, body.date.trim(), body.time.trim()]
        .iter()
        .any(|f| f.is_empty())
    {
        return Err(api_error(StatusCode::BAD_REQUEST, INCOMPLETE_SUBMISSION));
    }

    // Returning clients may leave the name blank
    let name = match body.name.trim() {
        "" => state
            .clients
            .lock()
            .await
            .lookup(phone)
            .map(|c| c.name.clone())
            .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, INCOMPLETE_SUBMISSION))?,
        name => name.to_string(),
    };

    require_barber(&state, barber)?;

    let date = parse_date(&body.date)?;
    if date < state.config.today() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "A data deve ser hoje ou posterior.",
        ));
    }

    let time = parse_hhmm(&body.time).ok_or_else(|| {
        api_error(StatusCode::BAD_REQUEST, "Horário inválido. Use o formato HH:MM.")
    })?;

    let slots = state.config.schedule.slots_for(date);
    if slots.is_empty() {
        return Err(api_error(StatusCode::UNPROCESSABLE_ENTITY, SHOP_CLOSED));
    }
    if !slots.contains(&time) {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Horário fora do expediente.",
        ));
    }

    let booking = Booking {
        client_name: name,
        phone: Some(phone.to_string()),
        barber: barber.to_string(),
        date,
        time,
    };
    let detail = BookingDetail::from(&booking);

    match state.ledger.lock().await.append(booking).await {
        Ok(()) => {}
        Err(LedgerError::Conflict { .. }) => {
            tracing::info!(
                "Slot conflict: {} on {} at {}",
                detail.barber,
                detail.date,
                detail.time
            );
            return Err(api_error(
                StatusCode::CONFLICT,
                "Horário já reservado para este barbeiro. Escolha outro horário.",
            ));
        }
        Err(LedgerError::Store(e)) => {
            tracing::error!("create_booking: failed to save booking: {}", e);
            return Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Erro ao salvar o agendamento. Tente novamente.",
            ));
        }
    }

    tracing::info!(
        "Booking created: {} on {} at {}",
        detail.barber,
        detail.date,
        detail.time
    );

    // The booking stands even if the client file cannot be written
    match state
        .clients
        .lock()
        .await
        .register(phone, &detail.client_name)
        .await
    {
        Ok(Registration::Registered) => tracing::info!("Registered new client"),
        Ok(Registration::AlreadyExists) => {}
        Err(e) => tracing::error!("Failed to register client: {}", e),
    }

    Ok(Json(ApiResponse::success(detail)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_accepts_iso() {
        assert_eq!(
            parse_date(" 2025-01-06 ").unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 6).unwrap()
        );
    }

    #[test]
    fn test_required_rejects_missing_and_blank() {
        assert_eq!(required(&Some(" Ana ".into()), "barber").unwrap(), "Ana");
        let (status, body) = required(&None, "date").unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.0.error.as_deref(), Some("Parâmetro obrigatório ausente: date"));
        assert!(required(&Some("  ".into()), "date").is_err());
    }

    #[test]
    fn test_parse_date_rejects_local_format() {
        let (status, _) = parse_date("06/01/2025").unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
