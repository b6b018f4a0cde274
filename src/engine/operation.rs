//! Operation (operacion) rollup: buy vs sell per rubro and profit distribution.

use crate::domain::{
    Decimal, DespachoTotals, FinanciacionTotals, InstalacionTotals, InsuranceProfitMode, Oferta,
    Operacion, OperacionTotals, Overflow, ProfitDistribution, QuoteInputs, Rubro, RubroLine,
};

fn rubro(rubro: Rubro, buy_usd: Decimal, sell_usd: Decimal) -> Result<RubroLine, Overflow> {
    Ok(RubroLine {
        rubro,
        buy_usd,
        sell_usd,
        profit_usd: sell_usd.checked_sub(buy_usd)?,
    })
}

/// Reconcile buy-side against sell-side totals.
///
/// The sell total is the offer's bottom-up `total_sales_usd`, reused as is so
/// that both sheets always report the same figure.
pub fn rollup(
    inputs: &QuoteInputs,
    oferta: &Oferta,
    despacho: &DespachoTotals,
    financiacion: &FinanciacionTotals,
    instalacion: &InstalacionTotals,
) -> Result<Operacion, Overflow> {
    let offer = &oferta.totals;
    let total_door = offer.total_door_usd;

    let mut seguro = rubro(
        Rubro::Seguro,
        total_door.checked_mul(inputs.insurance_buy_rate)?,
        offer.total_seguro_usd,
    )?;
    if inputs.insurance_profit_mode == InsuranceProfitMode::Simple {
        seguro.profit_usd = seguro.sell_usd;
    }

    let rubros = vec![
        rubro(
            Rubro::Puertas,
            total_door,
            total_door.checked_add(offer.total_rent_usd)?,
        )?,
        rubro(Rubro::Flete, inputs.freight_buy_usd, offer.total_flete_usd)?,
        rubro(
            Rubro::Despacho,
            despacho.customs_total_usd_theoretical,
            despacho.customs_total_sale_usd,
        )?,
        rubro(Rubro::Adicional, Decimal::zero(), offer.total_additional_usd)?,
        rubro(
            Rubro::Financiacion,
            financiacion.financing_total_buy_usd,
            financiacion.financing_total_sale_usd,
        )?,
        rubro(
            Rubro::Locales,
            instalacion
                .installation_total_cost_gs
                .div_or_zero(inputs.exchange_rate_operation_buy_usd)?,
            instalacion
                .installation_total_sale_gs
                .div_or_zero(inputs.exchange_rate_operation_sell_usd)?,
        )?,
        seguro,
    ];

    let total_buy_usd = Decimal::checked_sum(rubros.iter().map(|r| r.buy_usd))?;
    let total_sell_usd = offer.total_sales_usd;
    let profit_total_usd = total_sell_usd.checked_sub(total_buy_usd)?;

    let vendor_profit_pct = inputs.vendor_profit_rate();
    let vendor_profit_usd = profit_total_usd.checked_mul(vendor_profit_pct)?;

    tracing::debug!(
        total_buy_usd = %total_buy_usd,
        total_sell_usd = %total_sell_usd,
        profit_total_usd = %profit_total_usd,
        "operation rollup computed"
    );

    Ok(Operacion {
        rubros,
        totals: OperacionTotals {
            total_buy_usd,
            total_sell_usd,
            profit_total_usd,
        },
        distribution: ProfitDistribution {
            vendor_profit_pct,
            vendor_profit_usd,
            final_profit_usd: profit_total_usd.checked_sub(vendor_profit_usd)?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AdditionalMode, OfertaTotals};

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn inputs(mode: InsuranceProfitMode) -> QuoteInputs {
        let mut inputs = QuoteInputs::from_value(serde_json::json!({
            "items": [{"qty": 1, "door_value_usd": 10000}],
            "additional_mode": AdditionalMode::ProratedAcrossItems,
            "insurance_profit_mode": mode,
        }))
        .unwrap();
        inputs.freight_buy_usd = d("800");
        inputs.insurance_buy_rate = d("0.01");
        inputs.exchange_rate_operation_buy_usd = d("7000");
        inputs.exchange_rate_operation_sell_usd = d("8000");
        inputs
    }

    fn oferta() -> Oferta {
        Oferta {
            items: Vec::new(),
            totals: OfertaTotals {
                total_door_usd: d("10000"),
                total_flete_usd: d("1000"),
                total_seguro_usd: d("150"),
                total_rent_usd: d("3000"),
                total_additional_usd: d("50"),
                total_sales_usd: d("16500"),
                ..Default::default()
            },
            cif_total_usd: d("11150"),
        }
    }

    fn despacho() -> DespachoTotals {
        DespachoTotals {
            customs_total_usd_theoretical: d("1200"),
            customs_total_sale_usd: d("1300"),
            ..Default::default()
        }
    }

    fn financiacion() -> FinanciacionTotals {
        FinanciacionTotals {
            financing_total_buy_usd: d("100"),
            financing_total_sale_usd: d("250"),
            ..Default::default()
        }
    }

    fn instalacion() -> InstalacionTotals {
        InstalacionTotals {
            installation_total_cost_gs: d("7000000"),
            installation_total_sale_gs: d("12000000"),
            ..Default::default()
        }
    }

    #[test]
    fn test_rubros_and_distribution() {
        let op = rollup(
            &inputs(InsuranceProfitMode::Corrected),
            &oferta(),
            &despacho(),
            &financiacion(),
            &instalacion(),
        )
        .unwrap();

        let puertas = op.rubro(Rubro::Puertas).unwrap();
        assert_eq!(puertas.sell_usd, d("13000"));
        assert_eq!(puertas.profit_usd, d("3000"));

        let flete = op.rubro(Rubro::Flete).unwrap();
        assert_eq!(flete.profit_usd, d("200"));

        let locales = op.rubro(Rubro::Locales).unwrap();
        assert_eq!(locales.buy_usd, d("1000"));
        assert_eq!(locales.sell_usd, d("1500"));

        let seguro = op.rubro(Rubro::Seguro).unwrap();
        assert_eq!(seguro.buy_usd, d("100"));
        assert_eq!(seguro.profit_usd, d("50"));

        // 10000 + 800 + 1200 + 0 + 100 + 1000 + 100
        assert_eq!(op.totals.total_buy_usd, d("13200"));
        assert_eq!(op.totals.total_sell_usd, d("16500"));
        assert_eq!(op.totals.profit_total_usd, d("3300"));
        assert_eq!(op.distribution.vendor_profit_usd, d("495"));
        assert_eq!(op.distribution.final_profit_usd, d("2805"));
    }

    #[test]
    fn test_simple_insurance_mode_reports_raw_sell() {
        let op = rollup(
            &inputs(InsuranceProfitMode::Simple),
            &oferta(),
            &despacho(),
            &financiacion(),
            &instalacion(),
        )
        .unwrap();
        let seguro = op.rubro(Rubro::Seguro).unwrap();
        assert_eq!(seguro.profit_usd, d("150"));
        // Buy side still counts the insurance cost.
        assert_eq!(op.totals.total_buy_usd, d("13200"));
    }

    #[test]
    fn test_vendor_rate_override() {
        let mut inp = inputs(InsuranceProfitMode::Corrected);
        inp.vendor_profit_pct = Some(d("0.2"));
        let op = rollup(&inp, &oferta(), &despacho(), &financiacion(), &instalacion()).unwrap();
        assert_eq!(op.distribution.vendor_profit_usd, d("660"));
        assert_eq!(op.distribution.final_profit_usd, d("2640"));
    }
}
