//! Pre-invocation validation of quote inputs.
//!
//! The engine itself only refuses a non-positive door total. Everything else
//! it tolerates (unknown customs types, zero exchange rates, lines without a
//! quantity) is reported here so callers can surface it before computing.

use crate::domain::{CustomsLineType, QuoteInputs};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The engine will refuse these inputs.
    Error,
    /// The engine will compute, but part of the result is likely unintended.
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    /// Path of the offending field, e.g. `customs_lines[2].type`.
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// True when the engine will accept the inputs.
    pub fn is_computable(&self) -> bool {
        !self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }

    fn push(&mut self, severity: Severity, field: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            severity,
            field: field.into(),
            message: message.into(),
        });
    }
}

pub fn validate_inputs(inputs: &QuoteInputs) -> ValidationReport {
    let mut report = ValidationReport::default();

    if inputs.items.is_empty() {
        report.push(Severity::Error, "items", "at least one sale line is required");
    } else {
        match inputs.total_door_usd() {
            Ok(total) if !total.is_positive() => report.push(
                Severity::Error,
                "items",
                format!("total_door_usd must be > 0 to prorate costs, got {total}"),
            ),
            Ok(_) => {}
            Err(_) => report.push(
                Severity::Error,
                "items",
                "total_door_usd is out of range",
            ),
        }
    }

    for (idx, item) in inputs.items.iter().enumerate() {
        if item.door_value_usd.is_negative() {
            report.push(
                Severity::Warning,
                format!("items[{idx}].door_value_usd"),
                "negative door value produces a negative participation share",
            );
        }
        if !item.qty.is_positive() {
            report.push(
                Severity::Warning,
                format!("items[{idx}].qty"),
                "line has no quantity; its unit price will be empty",
            );
        }
    }

    let mut needs_declared_rate = false;
    for (idx, line) in inputs.customs_lines.iter().enumerate() {
        if !line.enabled {
            continue;
        }
        match &line.line_type {
            CustomsLineType::Unknown(raw) => report.push(
                Severity::Warning,
                format!("customs_lines[{idx}].type"),
                format!("unknown customs type '{raw}' ({}) contributes 0", line.name),
            ),
            CustomsLineType::FixedGs => needs_declared_rate = true,
            _ => {}
        }
        if line.rate_decimal.is_negative() {
            report.push(
                Severity::Warning,
                format!("customs_lines[{idx}].rate_decimal"),
                "negative rate",
            );
        }
    }

    let has_customs = inputs.customs_lines.iter().any(|l| l.enabled);
    if has_customs && inputs.exchange_rate_customs_gs_per_usd.is_zero() {
        let message = if needs_declared_rate {
            "customs rate is 0: local-currency lines convert to 0 USD"
        } else {
            "customs rate is 0: lines carry no local-currency amount"
        };
        report.push(Severity::Warning, "exchange_rate_customs_gs_per_usd", message);
    }
    if has_customs && inputs.exchange_rate_customs_internal_gs_per_usd.is_zero() {
        report.push(
            Severity::Warning,
            "exchange_rate_customs_internal_gs_per_usd",
            "internal customs rate is 0: customs sale total will be 0",
        );
    }

    if !inputs.install_items.is_empty() {
        for (field, rate) in [
            ("exchange_rate_install_gs_per_usd", inputs.exchange_rate_install_gs_per_usd),
            ("exchange_rate_operation_buy_usd", inputs.exchange_rate_operation_buy_usd),
            ("exchange_rate_operation_sell_usd", inputs.exchange_rate_operation_sell_usd),
        ] {
            if !rate.is_positive() {
                report.push(
                    Severity::Warning,
                    field,
                    "installation lines present but exchange rate is not positive; USD amounts will be 0",
                );
            }
        }
    }

    for (field, value) in [
        ("rent_rate", inputs.rent_rate),
        ("insurance_buy_rate", inputs.insurance_buy_rate),
        ("financing_buy_annual_rate", inputs.financing_buy_annual_rate),
        ("financing_sell_annual_rate", inputs.financing_sell_annual_rate),
        ("financing_term_months", inputs.financing_term_months),
        ("financing_surcharge_rate", inputs.financing_surcharge_rate),
    ] {
        if value.is_negative() {
            report.push(Severity::Warning, field, "negative value");
        }
    }

    for issue in report.warnings() {
        tracing::warn!(field = %issue.field, "{}", issue.message);
    }

    report
}
