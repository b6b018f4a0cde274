//! Pure computation engine for quote calculation.
//!
//! Stages are plain functions over immutable values. `compute_quote_exact`
//! wires them in dependency order:
//!
//! installation -> base aggregation -> customs -> financing -> offer -> operation

use crate::domain::{DespachoRates, Overflow, QuoteError, QuoteInputs, QuoteResult};

pub mod customs;
pub mod financing;
pub mod installation;
pub mod offer;
pub mod operation;
pub mod proration;
pub mod validation;

pub use financing::{FinancedAmounts, FinancingTerms};
pub use offer::DistributedCharges;
pub use proration::{BaseAggregate, Proration};
pub use validation::{validate_inputs, Severity, ValidationIssue, ValidationReport};

/// Compute a full quote and round it for display.
///
/// # Errors
/// Returns [`QuoteError::InvalidInput`] when the declared door total is not
/// positive or an amount leaves the decimal range. No partial result is ever
/// produced.
pub fn compute_quote(inputs: &QuoteInputs) -> Result<QuoteResult, QuoteError> {
    compute_quote_exact(inputs).map(|result| result.rounded())
}

/// Compute a full quote at full decimal precision.
pub fn compute_quote_exact(inputs: &QuoteInputs) -> Result<QuoteResult, QuoteError> {
    let out_of_range = |stage: &'static str| move |_: Overflow| QuoteError::out_of_range(stage);

    // Pre-flight: everything downstream prorates against the door total.
    let base = BaseAggregate::compute(
        &inputs.items,
        inputs.freight_international_total_usd,
        inputs.insurance_sale_total_usd,
    )?;

    let instalacion = installation::compute(
        &inputs.install_items,
        inputs.exchange_rate_install_gs_per_usd,
    )
    .map_err(out_of_range("installation"))?;

    let despacho = customs::compute(
        &inputs.customs_lines,
        base.imponible_usd,
        DespachoRates {
            exchange_rate_customs_gs_per_usd: inputs.exchange_rate_customs_gs_per_usd,
            exchange_rate_customs_internal_gs_per_usd: inputs
                .exchange_rate_customs_internal_gs_per_usd,
        },
    )
    .map_err(out_of_range("customs"))?;

    let freight_insurance_usd = inputs
        .freight_international_total_usd
        .checked_add(inputs.insurance_sale_total_usd)
        .map_err(out_of_range("freight and insurance"))?;
    let financiacion = financing::compute(
        &FinancedAmounts {
            door_usd: base.total_door_usd(),
            freight_insurance_usd,
            customs_sale_usd: despacho.totals.customs_total_sale_usd,
            installation_cost_usd: instalacion.totals.installation_total_cost_usd,
        },
        &FinancingTerms::from_inputs(inputs),
    )
    .map_err(out_of_range("financing"))?;

    let oferta = offer::finalize(
        inputs,
        &base,
        &DistributedCharges {
            customs_sale_usd: despacho.totals.customs_total_sale_usd,
            financing_sale_usd: financiacion.totals.financing_total_sale_usd,
            installation_sale_usd: instalacion.totals.installation_total_sale_usd,
        },
    )
    .map_err(out_of_range("offer"))?;

    let operacion = operation::rollup(
        inputs,
        &oferta,
        &despacho.totals,
        &financiacion.totals,
        &instalacion.totals,
    )
    .map_err(out_of_range("operation"))?;

    tracing::debug!(
        lines = oferta.items.len(),
        total_sales_usd = %oferta.totals.total_sales_usd,
        profit_total_usd = %operacion.totals.profit_total_usd,
        "quote computed"
    );

    Ok(QuoteResult {
        oferta,
        despacho,
        instalacion,
        financiacion,
        operacion,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Decimal, Rubro};
    use serde_json::json;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn full_inputs() -> QuoteInputs {
        QuoteInputs::from_value(json!({
            "items": [
                {"description": "Puerta seccional", "qty": 2, "door_value_usd": 6000},
                {"description": "Puerta rapida", "qty": 1, "door_value_usd": 4000},
            ],
            "install_items": [
                {"description": "Montaje", "qty": 3, "unit_cost_gs": 1500000, "unit_price_gs": 2400000},
            ],
            "customs_lines": [
                {"name": "Derecho Aduanero", "type": "PERCENT_OF_IMPONIBLE_USD", "rate_decimal": 0.1, "include_in_iva_base": true},
                {"name": "Tasa Consular", "type": "FIXED_USD", "amount_usd": 55},
                {"name": "I.V.A.", "type": "IVA_PERCENT_OF_BASE_USD", "rate_decimal": 0.1},
            ],
            "rent_rate": 0.3,
            "freight_international_total_usd": 1000,
            "freight_buy_usd": 800,
            "insurance_sale_total_usd": 200,
            "insurance_buy_rate": 0.01,
            "additional_global_usd": 100,
            "additional_mode": "PRORATED_ACROSS_ITEMS",
            "insurance_profit_mode": "CORRECTED",
            "exchange_rate_customs_gs_per_usd": 7500,
            "exchange_rate_customs_internal_gs_per_usd": 7000,
            "exchange_rate_install_gs_per_usd": 7200,
            "exchange_rate_operation_buy_usd": 7200,
            "exchange_rate_operation_sell_usd": 7300,
            "financing_buy_annual_rate": 0.12,
            "financing_sell_annual_rate": 0.24,
            "financing_term_months": 6,
            "financing_surcharge_rate": 0.1,
        }))
        .unwrap()
    }

    #[test]
    fn test_zero_base_rejected() {
        let mut inputs = full_inputs();
        for item in &mut inputs.items {
            item.door_value_usd = Decimal::zero();
        }
        let err = compute_quote(&inputs).unwrap_err();
        assert!(matches!(err, QuoteError::InvalidInput(msg) if msg.contains("total_door_usd")));
    }

    #[test]
    fn test_large_inputs_compute_or_reject_without_panic() {
        let mut inputs = full_inputs();
        let big = Decimal::parse_number("1e15").unwrap();
        inputs.items[0].door_value_usd = big;
        inputs.freight_international_total_usd = big;
        let result = compute_quote(&inputs).unwrap();
        assert_eq!(
            result.operacion.totals.total_sell_usd,
            result.oferta.totals.total_sales_usd
        );

        inputs.financing_term_months = Decimal::parse_number("1e20").unwrap();
        let err = compute_quote(&inputs).unwrap_err();
        assert!(
            matches!(&err, QuoteError::InvalidInput(msg) if msg.contains("financing amounts are out of range")),
            "unexpected error {err:?}"
        );
    }

    #[test]
    fn test_sell_totals_reconcile() {
        let exact = compute_quote_exact(&full_inputs()).unwrap();
        assert_eq!(
            exact.operacion.totals.total_sell_usd,
            exact.oferta.totals.total_sales_usd
        );

        let rounded = compute_quote(&full_inputs()).unwrap();
        assert_eq!(
            rounded.operacion.totals.total_sell_usd,
            rounded.oferta.totals.total_sales_usd
        );
    }

    #[test]
    fn test_stage_wiring() {
        let result = compute_quote_exact(&full_inputs()).unwrap();

        // imponible = 10000 + 1000 + 200
        assert_eq!(result.despacho.totals.valor_imponible_usd, d("11200"));
        // 1120 + 55 + (11200 + 1120) * 0.1
        assert_eq!(result.despacho.totals.customs_total_usd_theoretical, d("2407"));

        let customs_sale = result.despacho.totals.customs_total_sale_usd;
        assert_eq!(result.oferta.totals.total_despacho_usd, customs_sale);

        let install_cost_usd = result.instalacion.totals.installation_total_cost_usd;
        assert_eq!(
            result.financiacion.totals.base_usd,
            d("10000") + d("1200") + customs_sale + install_cost_usd
        );
        assert_eq!(
            result.oferta.totals.total_finan_usd,
            result.financiacion.totals.financing_total_sale_usd
        );
        assert_eq!(
            result.oferta.totals.total_instal_usd,
            result.instalacion.totals.installation_total_sale_usd
        );
        assert_eq!(result.oferta.totals.total_additional_usd, d("100"));

        let flete = result.operacion.rubro(Rubro::Flete).unwrap();
        assert_eq!(flete.buy_usd, d("800"));
        assert_eq!(flete.sell_usd, d("1000"));
    }

    #[test]
    fn test_participation_closes() {
        let result = compute_quote_exact(&full_inputs()).unwrap();
        let total: Decimal = result.oferta.items.iter().map(|l| l.participation).sum();
        assert_eq!(total, Decimal::one());
        assert_eq!(result.oferta.items[0].participation, d("0.6"));
    }

    #[test]
    fn test_rounded_result_is_display_ready() {
        let result = compute_quote(&full_inputs()).unwrap();
        for line in &result.oferta.items {
            assert!(line.total_sales.inner().scale() <= 2);
        }
        assert_eq!(result.instalacion.totals.installation_total_cost_gs, d("4500000"));
        assert_eq!(result.oferta.items[0].flete, d("600"));
    }
}
