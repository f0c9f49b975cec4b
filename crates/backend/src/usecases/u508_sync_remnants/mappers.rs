//! Правила пересчета полей прайса остатков.
//!
//! Это бизнес-правила, а не универсальный парсер чисел: "1" в прайсе означает
//! "последний экземпляр, не выставлять", ">10" выгружается как 100.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("invalid quantity '{0}'")]
    InvalidQuantity(String),

    #[error("invalid price '{0}'")]
    InvalidPrice(String),
}

/// Количество из прайса -> остаток для маркетплейса
pub fn map_quantity(descriptor: &str) -> Result<u32, MappingError> {
    match descriptor {
        ">10" => Ok(100),
        "1" => Ok(0),
        other => other
            .parse::<u32>()
            .map_err(|_| MappingError::InvalidQuantity(descriptor.to_string())),
    }
}

/// Цена из прайса -> целое число рублей.
///
/// Берется все до первой точки, из этого оставляются только цифры:
/// "5'990.00 руб." -> "5'990" -> 5990.
pub fn map_price(price_text: &str) -> Result<u64, MappingError> {
    let integer_part = price_text.split('.').next().unwrap_or_default();
    let digits: String = integer_part.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.is_empty() {
        return Err(MappingError::InvalidPrice(price_text.to_string()));
    }

    digits
        .parse::<u64>()
        .map_err(|_| MappingError::InvalidPrice(price_text.to_string()))
}
