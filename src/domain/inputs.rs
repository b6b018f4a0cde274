//! Quote inputs: the immutable snapshot the engine computes from.

use crate::domain::{lenient, Decimal, Overflow, QuoteError};
use serde::{Deserialize, Serialize};

/// A door/unit being sold.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SaleLineItem {
    #[serde(default, deserialize_with = "lenient::line_no")]
    pub line_no: Option<u32>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient::decimal")]
    pub qty: Decimal,
    /// Declared door value of the line before any distributed charge.
    #[serde(default, deserialize_with = "lenient::decimal")]
    pub door_value_usd: Decimal,
    /// Per-line one-off charge, only read under [`AdditionalMode::PerItem`].
    #[serde(
        default,
        deserialize_with = "lenient::optional_decimal",
        skip_serializing_if = "Option::is_none"
    )]
    pub additional_usd: Option<Decimal>,
}

/// A local-currency installation line.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InstallLineItem {
    #[serde(default, deserialize_with = "lenient::line_no")]
    pub line_no: Option<u32>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient::decimal")]
    pub qty: Decimal,
    #[serde(default, deserialize_with = "lenient::decimal")]
    pub unit_cost_gs: Decimal,
    #[serde(default, deserialize_with = "lenient::decimal")]
    pub unit_price_gs: Decimal,
}

/// How a customs line derives its amount.
///
/// Unrecognised type strings are kept as [`CustomsLineType::Unknown`] so that
/// saved quotes keep loading when new types are introduced; such lines
/// contribute zero.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CustomsLineType {
    #[default]
    FixedUsd,
    FixedGs,
    PercentOfImponible,
    IvaPercentOfBase,
    Unknown(String),
}

impl CustomsLineType {
    pub fn as_str(&self) -> &str {
        match self {
            CustomsLineType::FixedUsd => "FIXED_USD",
            CustomsLineType::FixedGs => "FIXED_GS",
            CustomsLineType::PercentOfImponible => "PERCENT_OF_IMPONIBLE_USD",
            CustomsLineType::IvaPercentOfBase => "IVA_PERCENT_OF_BASE_USD",
            CustomsLineType::Unknown(raw) => raw.as_str(),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, CustomsLineType::Unknown(_))
    }
}

impl From<String> for CustomsLineType {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "" | "FIXED_USD" => CustomsLineType::FixedUsd,
            "FIXED_GS" => CustomsLineType::FixedGs,
            "PERCENT_OF_IMPONIBLE_USD" | "PERCENT_OF_IMPONIBLE" => {
                CustomsLineType::PercentOfImponible
            }
            "IVA_PERCENT_OF_BASE_USD" | "IVA_PERCENT_OF_BASE" => CustomsLineType::IvaPercentOfBase,
            _ => CustomsLineType::Unknown(raw),
        }
    }
}

impl From<CustomsLineType> for String {
    fn from(value: CustomsLineType) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for CustomsLineType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the customs duty schedule, evaluated in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomsLine {
    #[serde(default, deserialize_with = "lenient::text")]
    pub name: String,
    #[serde(rename = "type", default, deserialize_with = "customs_line_type")]
    pub line_type: CustomsLineType,
    #[serde(default, deserialize_with = "lenient::decimal")]
    pub rate_decimal: Decimal,
    #[serde(default, deserialize_with = "lenient::decimal")]
    pub amount_usd: Decimal,
    #[serde(default, deserialize_with = "lenient::decimal")]
    pub amount_gs: Decimal,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub include_in_iva_base: bool,
    #[serde(default = "enabled_default", deserialize_with = "lenient::enabled_flag")]
    pub enabled: bool,
}

fn enabled_default() -> bool {
    true
}

fn customs_line_type<'de, D>(deserializer: D) -> Result<CustomsLineType, D::Error>
where
    D: serde::Deserializer<'de>,
{
    lenient::text(deserializer).map(CustomsLineType::from)
}

/// How the one-off additional charge is attributed to sale lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdditionalMode {
    /// `additional_global_usd` is prorated by participation share.
    ProratedAcrossItems,
    /// The whole amount lands on the first line (legacy spreadsheet layout).
    SingleFirstItem,
    /// Each line carries its own `additional_usd`, defaulting to the global amount.
    PerItem,
}

/// How the insurance rubro's profit is derived in the operation rollup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InsuranceProfitMode {
    /// profit = sell - buy
    Corrected,
    /// profit = sell (legacy spreadsheet layout)
    #[serde(alias = "COMPAT_SIMPLE")]
    Simple,
}

/// Complete input snapshot for one quote computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteInputs {
    #[serde(default)]
    pub items: Vec<SaleLineItem>,
    #[serde(default)]
    pub install_items: Vec<InstallLineItem>,
    #[serde(default)]
    pub customs_lines: Vec<CustomsLine>,

    #[serde(default = "default_rent_rate", deserialize_with = "lenient::decimal")]
    pub rent_rate: Decimal,
    #[serde(default, deserialize_with = "lenient::decimal")]
    pub freight_international_total_usd: Decimal,
    #[serde(default, deserialize_with = "lenient::decimal")]
    pub freight_buy_usd: Decimal,
    #[serde(default, deserialize_with = "lenient::decimal")]
    pub additional_global_usd: Decimal,
    pub additional_mode: AdditionalMode,

    #[serde(default, deserialize_with = "lenient::decimal")]
    pub insurance_sale_total_usd: Decimal,
    #[serde(default, deserialize_with = "lenient::decimal")]
    pub insurance_buy_rate: Decimal,
    pub insurance_profit_mode: InsuranceProfitMode,

    #[serde(default, deserialize_with = "lenient::decimal")]
    pub exchange_rate_customs_gs_per_usd: Decimal,
    #[serde(
        default = "default_customs_internal_rate",
        deserialize_with = "lenient::decimal"
    )]
    pub exchange_rate_customs_internal_gs_per_usd: Decimal,
    #[serde(default = "default_unit_rate", deserialize_with = "lenient::decimal")]
    pub exchange_rate_install_gs_per_usd: Decimal,
    #[serde(default = "default_unit_rate", deserialize_with = "lenient::decimal")]
    pub exchange_rate_operation_buy_usd: Decimal,
    #[serde(default = "default_unit_rate", deserialize_with = "lenient::decimal")]
    pub exchange_rate_operation_sell_usd: Decimal,

    #[serde(default, deserialize_with = "lenient::decimal")]
    pub financing_buy_annual_rate: Decimal,
    #[serde(default, deserialize_with = "lenient::decimal")]
    pub financing_sell_annual_rate: Decimal,
    #[serde(default, deserialize_with = "lenient::decimal")]
    pub financing_term_months: Decimal,
    #[serde(default, deserialize_with = "lenient::decimal")]
    pub financing_surcharge_rate: Decimal,

    /// Overrides the vendor commission rate; `None` means [`DEFAULT_VENDOR_PROFIT_PCT`].
    #[serde(
        default,
        deserialize_with = "lenient::optional_decimal",
        skip_serializing_if = "Option::is_none"
    )]
    pub vendor_profit_pct: Option<Decimal>,
}

/// Vendor commission taken from total profit when the quote does not override it.
pub const DEFAULT_VENDOR_PROFIT_PCT: &str = "0.15";

fn default_rent_rate() -> Decimal {
    Decimal::from_str_lenient("0.3")
}

fn default_customs_internal_rate() -> Decimal {
    Decimal::from_i64(7000)
}

fn default_unit_rate() -> Decimal {
    Decimal::one()
}

impl QuoteInputs {
    /// Build inputs from an arbitrary JSON document.
    ///
    /// Accepts either the inputs object itself or an envelope `{"inputs": {...}}`.
    ///
    /// # Errors
    /// Returns [`QuoteError::Malformed`] when the document is not an object or
    /// a compatibility mode is missing or unrecognised, and
    /// [`QuoteError::InvalidInput`] when a number does not fit the decimal range.
    pub fn from_value(value: serde_json::Value) -> Result<Self, QuoteError> {
        let body = match value {
            serde_json::Value::Object(mut map) if map.contains_key("inputs") => {
                map.remove("inputs").unwrap_or(serde_json::Value::Null)
            }
            other => other,
        };
        serde_json::from_value(body).map_err(|e| {
            let msg = e.to_string();
            if msg.contains(lenient::OUT_OF_RANGE) {
                QuoteError::InvalidInput(msg)
            } else {
                QuoteError::Malformed(msg)
            }
        })
    }

    /// Commission rate applied to total profit.
    pub fn vendor_profit_rate(&self) -> Decimal {
        self.vendor_profit_pct
            .unwrap_or_else(|| Decimal::from_str_lenient(DEFAULT_VENDOR_PROFIT_PCT))
    }

    /// Sum of declared door values across all sale lines.
    pub fn total_door_usd(&self) -> Result<Decimal, Overflow> {
        Decimal::checked_sum(self.items.iter().map(|it| it.door_value_usd))
    }
}
