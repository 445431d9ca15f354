// src/models/product.rs
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;
use chrono::{DateTime, NaiveDate, Utc};
use strum::{AsRefStr, Display, EnumString};
use std::str::FromStr;

// ==================== PRODUCT ====================

#[derive(Debug, Serialize, sqlx::FromRow, Clone)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub quantity: i64,
    pub threshold: i64,
    pub expired_date: Option<NaiveDate>,
    pub section: String,
    // Dedup marker: internal only
    #[serde(skip_serializing)]
    pub last_notified_quantity: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Display-only condition, never triggers a notification.
    pub fn is_low_stock(&self) -> bool {
        self.quantity < self.threshold
    }
}

/// Storage section a product is shelved in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, Display, AsRefStr)]
pub enum Section {
    #[default]
    A,
    B,
    C,
}

/// Product form. Edits submit the whole form, so the same shape serves
/// both creation and update; every field is persisted as given.
#[derive(Debug, Deserialize, Validate, Clone)]
pub struct ProductRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be between 1 and 255 characters"))]
    pub name: String,

    #[validate(range(min = 0, max = 1000000000, message = "Quantity must be between 0 and 1000000000"))]
    pub quantity: i64,

    #[validate(range(min = 0, max = 1000000000, message = "Threshold must be between 0 and 1000000000"))]
    pub threshold: i64,

    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub expired_date: Option<NaiveDate>,

    #[validate(custom(function = "validate_section"))]
    pub section: Option<String>,
}

impl ProductRequest {
    pub fn section_or_default(&self) -> String {
        self.section
            .clone()
            .unwrap_or_else(|| Section::default().to_string())
    }
}

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    #[serde(flatten)]
    pub product: Product,
    pub low_stock: bool,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        let low_stock = product.is_low_stock();
        Self { product, low_stock }
    }
}

// === VALIDATORS ===

fn validate_section(value: &str) -> Result<(), validator::ValidationError> {
    if Section::from_str(value).is_ok() {
        Ok(())
    } else {
        let mut error = validator::ValidationError::new("invalid_section");
        error.message = Some("Section must be one of 'A', 'B' or 'C'".into());
        Err(error)
    }
}

/// Date inputs post "" when cleared and may carry a time part.
fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => {
            let date_part = value.split('T').next().unwrap_or(value);
            NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
                .map(Some)
                .map_err(serde::de::Error::custom)
        }
    }
}

// === TESTS ===

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: serde_json::Value) -> ProductRequest {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_low_stock_flag() {
        let now = Utc::now();
        let mut product = Product {
            id: "p1".into(),
            name: "Widget".into(),
            quantity: 4,
            threshold: 5,
            expired_date: None,
            section: "A".into(),
            last_notified_quantity: None,
            created_at: now,
            updated_at: now,
        };
        assert!(product.is_low_stock());
        product.quantity = 5;
        assert!(!product.is_low_stock());
    }

    #[test]
    fn test_marker_is_not_serialized() {
        let now = Utc::now();
        let product = Product {
            id: "p1".into(),
            name: "Widget".into(),
            quantity: 20,
            threshold: 5,
            expired_date: None,
            section: "B".into(),
            last_notified_quantity: Some(15),
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(ProductResponse::from(product)).unwrap();
        assert!(json.get("last_notified_quantity").is_none());
        assert_eq!(json["low_stock"], false);
        assert_eq!(json["name"], "Widget");
    }

    #[test]
    fn test_request_validation() {
        let valid = request(serde_json::json!({"name": "Widget", "quantity": 20, "threshold": 5}));
        assert!(valid.validate().is_ok());
        assert_eq!(valid.section_or_default(), "A");

        let negative = request(serde_json::json!({"name": "Widget", "quantity": -1, "threshold": 5}));
        assert!(negative.validate().is_err());

        let negative_threshold = request(serde_json::json!({"name": "Widget", "quantity": 1, "threshold": -5}));
        assert!(negative_threshold.validate().is_err());

        let empty_name = request(serde_json::json!({"name": "", "quantity": 1, "threshold": 0}));
        assert!(empty_name.validate().is_err());

        let bad_section = request(serde_json::json!({"name": "W", "quantity": 1, "threshold": 0, "section": "D"}));
        assert!(bad_section.validate().is_err());
    }

    #[test]
    fn test_non_numeric_quantity_is_rejected() {
        let result = serde_json::from_value::<ProductRequest>(
            serde_json::json!({"name": "Widget", "quantity": "lots", "threshold": 5}),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_expired_date_parsing() {
        let cleared = request(serde_json::json!({"name": "W", "quantity": 1, "threshold": 0, "expired_date": ""}));
        assert_eq!(cleared.expired_date, None);

        let with_time = request(serde_json::json!({
            "name": "W", "quantity": 1, "threshold": 0, "expired_date": "2026-03-01T00:00:00Z"
        }));
        assert_eq!(with_time.expired_date, NaiveDate::from_ymd_opt(2026, 3, 1));

        let bad = serde_json::from_value::<ProductRequest>(serde_json::json!({
            "name": "W", "quantity": 1, "threshold": 0, "expired_date": "tomorrow"
        }));
        assert!(bad.is_err());
    }

    #[test]
    fn test_section_round_trip() {
        assert_eq!(Section::from_str("C").unwrap(), Section::C);
        assert_eq!(Section::B.as_ref(), "B");
        assert!(Section::from_str("c").is_err());
    }
}
