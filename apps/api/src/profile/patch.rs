//! Partial profile updates.
//!
//! A key absent from the body leaves the column alone; an explicit `null`
//! clears a nullable column.

use chrono::Utc;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::errors::AppError;
use crate::models::user::ProfileRow;
use crate::validation::parse_date;

/// Distinguishes a present `null` (`Some(None)`) from an absent key (`None`).
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Unknown keys, `role` included, are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct ProfilePatch {
    pub full_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub target_province: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub target_city: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub planned_arrival_date: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub current_location: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub immigration_status: Option<Option<String>>,
    pub language_preference: Option<String>,
    pub notification_settings: Option<Value>,
}

impl ProfilePatch {
    pub fn apply(self, mut row: ProfileRow) -> Result<ProfileRow, AppError> {
        if let Some(full_name) = self.full_name {
            let full_name = full_name.trim().to_string();
            if full_name.is_empty() {
                return Err(AppError::Validation("full_name cannot be empty".to_string()));
            }
            row.full_name = full_name;
        }
        if let Some(phone) = self.phone {
            row.phone = phone;
        }
        if let Some(province) = self.target_province {
            row.target_province = province;
        }
        if let Some(city) = self.target_city {
            row.target_city = city;
        }
        if let Some(date) = self.planned_arrival_date {
            row.planned_arrival_date = match date.as_deref().map(str::trim) {
                None | Some("") => None,
                Some(raw) => Some(parse_date("planned_arrival_date", raw)?),
            };
        }
        if let Some(location) = self.current_location {
            row.current_location = location;
        }
        if let Some(status) = self.immigration_status {
            row.immigration_status = status;
        }
        if let Some(language) = self.language_preference {
            row.language_preference = language;
        }
        if let Some(settings) = self.notification_settings {
            if !settings.is_object() {
                return Err(AppError::Validation(
                    "notification_settings must be an object".to_string(),
                ));
            }
            row.notification_settings = settings;
        }
        row.updated_at = Utc::now();
        Ok(row)
    }
}
