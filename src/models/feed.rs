use sqlx::FromRow;

/// One configured telemetry source. Rows are managed by the admin surface
/// and read-only here; any of the three URLs may be unset.
#[derive(Debug, Clone, FromRow)]
pub struct Feed {
    pub id: i64,
    pub company_name: String,
    /// IANA timezone name, e.g. "America/New_York".
    pub timezone: String,
    pub vehicle_position_url: Option<String>,
    pub trip_update_url: Option<String>,
    pub service_alert_url: Option<String>,
}
