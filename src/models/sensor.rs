// src/models/sensor.rs
use serde::{Deserialize, Serialize};
use validator::Validate;
use chrono::{DateTime, Utc};

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct SensorReading {
    pub id: String,
    pub temperature: f64,
    pub humidity: f64,
    pub product_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RecordReadingRequest {
    #[validate(range(min = -100.0, max = 150.0, message = "Temperature must be between -100 and 150 °C"))]
    pub temperature: f64,
    #[validate(range(min = 0.0, max = 100.0, message = "Humidity must be between 0 and 100 %"))]
    pub humidity: f64,
    #[validate(length(max = 64, message = "Product ID cannot exceed 64 characters"))]
    pub product_id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Latest reading with gauge positions, each a fraction of a 0..100 scale.
#[derive(Debug, Serialize)]
pub struct GaugeReading {
    #[serde(flatten)]
    pub reading: SensorReading,
    pub temperature_gauge: f64,
    pub humidity_gauge: f64,
}

impl From<SensorReading> for GaugeReading {
    fn from(reading: SensorReading) -> Self {
        let temperature_gauge = gauge_fraction(reading.temperature);
        let humidity_gauge = gauge_fraction(reading.humidity);
        Self { reading, temperature_gauge, humidity_gauge }
    }
}

fn gauge_fraction(value: f64) -> f64 {
    (value / 100.0).clamp(0.0, 1.0)
}
