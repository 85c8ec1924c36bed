use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use super::client::{parse_date, require_barber};
use crate::{
    auth::{self, AdminAuthError},
    ledger::BookingFilter,
    models::*,
    store, AppState,
};

const EXPORT_ALL: &str = "agendamentos.csv";
const EXPORT_FILTERED: &str = "agendamentos_filtrados.csv";

/// Helper: reject the request unless it carries the admin password.
fn extract_admin(headers: &HeaderMap, state: &AppState) -> Result<(), ApiError> {
    auth::check_admin(headers, &state.config.admin).map_err(|e| match e {
        AdminAuthError::Missing => api_error(StatusCode::UNAUTHORIZED, "Informe a senha de admin."),
        AdminAuthError::Rejected => api_error(StatusCode::UNAUTHORIZED, "Senha incorreta."),
    })
}

/// Turn query parameters into a ledger filter. `date` pins both ends of the range.
fn build_filter(query: &AdminBookingsQuery, state: &AppState) -> Result<BookingFilter, ApiError> {
    let barbers = match &query.barbers {
        Some(list) => {
            let names: Vec<String> = list
                .split(',')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(String::from)
                .collect();
            for name in &names {
                require_barber(state, name)?;
            }
            Some(names)
        }
        None => None,
    };

    let (from, to) = if let Some(date) = &query.date {
        let date = parse_date(date)?;
        (Some(date), Some(date))
    } else {
        (
            query.from.as_deref().map(parse_date).transpose()?,
            query.to.as_deref().map(parse_date).transpose()?,
        )
    };
    if let (Some(from), Some(to)) = (from, to) {
        if from > to {
            return Err(api_error(StatusCode::BAD_REQUEST, "Intervalo de datas inválido."));
        }
    }

    Ok(BookingFilter { barbers, from, to })
}

/// Prefix cells a spreadsheet would evaluate as a formula.
fn neutralize_formula(value: &str) -> String {
    match value.trim_start().chars().next() {
        Some('=' | '+' | '-' | '@') => format!("'{}", value),
        _ => value.to_string(),
    }
}

/// GET /api/admin/bookings?barbers=A,B&date=&from=&to= — sorted by date, time.
pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<AdminBookingsQuery>,
) -> Result<Json<ApiResponse<Vec<BookingDetail>>>, ApiError> {
    extract_admin(&headers, &state)?;
    let filter = build_filter(&query, &state)?;

    let bookings: Vec<BookingDetail> = state
        .ledger
        .lock()
        .await
        .filtered(&filter)
        .iter()
        .map(BookingDetail::from)
        .collect();

    Ok(Json(ApiResponse::success(bookings)))
}

/// GET /api/admin/bookings/export — CSV download of the filtered rows.
pub async fn export_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<AdminBookingsQuery>,
) -> Result<Response, ApiError> {
    extract_admin(&headers, &state)?;
    let filter = build_filter(&query, &state)?;

    let rows: Vec<Booking> = state
        .ledger
        .lock()
        .await
        .filtered(&filter)
        .into_iter()
        .map(|mut b| {
            b.client_name = neutralize_formula(&b.client_name);
            b.phone = b.phone.as_deref().map(neutralize_formula);
            b
        })
        .collect();

    let body = store::to_csv_bytes(&rows).map_err(|e| {
        tracing::error!("export_bookings: {}", e);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "Erro ao gerar o CSV.")
    })?;

    let filename = if filter.is_empty() { EXPORT_ALL } else { EXPORT_FILTERED };
    tracing::info!("Exported {} bookings as {}", rows.len(), filename);

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response())
}

/// GET /api/admin/clients — everyone in the client registry.
pub async fn list_clients(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<Vec<ClientDetail>>>, ApiError> {
    extract_admin(&headers, &state)?;
    let clients: Vec<ClientDetail> = state
        .clients
        .lock()
        .await
        .clients()
        .iter()
        .map(ClientDetail::from)
        .collect();
    Ok(Json(ApiResponse::success(clients)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neutralize_formula() {
        assert_eq!(neutralize_formula("=HYPERLINK(\"x\")"), "'=HYPERLINK(\"x\")");
        assert_eq!(neutralize_formula("  +5511"), "'  +5511");
        assert_eq!(neutralize_formula("@cmd"), "'@cmd");
        assert_eq!(neutralize_formula("-1"), "'-1");
        assert_eq!(neutralize_formula("Ana"), "Ana");
        assert_eq!(neutralize_formula("11999990000"), "11999990000");
        assert_eq!(neutralize_formula(""), "");
    }
}
