use chrono::NaiveDate;

/// Opaque collection-unique id for a new entity.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// The calendar day before `date`. `NaiveDate` can only fail at the edge of
/// the representable range, so this saturates there instead of panicking.
pub fn previous_day(date: NaiveDate) -> NaiveDate {
    date.pred_opt().unwrap_or(date)
}
