use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Артикул предложения в каталоге маркетплейса
pub type OfferId = String;

/// Остаток для выгрузки в маркетплейс
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockEntry {
    pub offer_id: OfferId,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warehouse_id: Option<String>,
    pub observed_at: DateTime<Utc>,
}

/// Цена для выгрузки в маркетплейс (в копейках)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceEntry {
    pub offer_id: OfferId,
    pub price_minor_units: u64,
    pub currency: String,
}

impl PriceEntry {
    /// Цена в рублях для API, которые принимают основную единицу валюты.
    /// Целые суммы без дробной части: "5990", иначе "5990.50".
    pub fn major_units_string(&self) -> String {
        let major = self.price_minor_units / 100;
        let minor = self.price_minor_units % 100;
        if minor == 0 {
            major.to_string()
        } else {
            format!("{}.{:02}", major, minor)
        }
    }

    pub fn major_units(&self) -> f64 {
        self.price_minor_units as f64 / 100.0
    }
}
