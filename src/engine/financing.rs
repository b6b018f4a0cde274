//! Financing stage: simple interest over the financed base plus a flat surcharge.

use crate::domain::{
    Decimal, Financiacion, FinanciacionBase, FinanciacionParams, FinanciacionTotals,
    FinancingComponent, Overflow, QuoteInputs,
};

/// Amounts being financed. Needs the customs and installation stages first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FinancedAmounts {
    pub door_usd: Decimal,
    pub freight_insurance_usd: Decimal,
    pub customs_sale_usd: Decimal,
    pub installation_cost_usd: Decimal,
}

impl FinancedAmounts {
    fn components(&self) -> [(FinancingComponent, Decimal); 4] {
        [
            (FinancingComponent::Puertas, self.door_usd),
            (FinancingComponent::FleteSeguro, self.freight_insurance_usd),
            (FinancingComponent::Despacho, self.customs_sale_usd),
            (FinancingComponent::Instalacion, self.installation_cost_usd),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FinancingTerms {
    pub buy_annual_rate: Decimal,
    pub sell_annual_rate: Decimal,
    pub term_months: Decimal,
    pub surcharge_rate: Decimal,
}

impl FinancingTerms {
    pub fn from_inputs(inputs: &QuoteInputs) -> Self {
        Self {
            buy_annual_rate: inputs.financing_buy_annual_rate,
            sell_annual_rate: inputs.financing_sell_annual_rate,
            term_months: inputs.financing_term_months,
            surcharge_rate: inputs.financing_surcharge_rate,
        }
    }

    fn monthly(annual: Decimal) -> Result<Decimal, Overflow> {
        annual.div_or_zero(Decimal::from_i64(12))
    }

    fn params(&self) -> Result<FinanciacionParams, Overflow> {
        Ok(FinanciacionParams {
            monthly_buy: Self::monthly(self.buy_annual_rate)?,
            monthly_sell: Self::monthly(self.sell_annual_rate)?,
            term_months: self.term_months,
            surcharge_rate: self.surcharge_rate,
        })
    }
}

fn financed(
    key: FinancingComponent,
    base: Decimal,
    params: &FinanciacionParams,
) -> Result<FinanciacionBase, Overflow> {
    let interest_buy = base
        .checked_mul(params.monthly_buy)?
        .checked_mul(params.term_months)?;
    let interest_sell = base
        .checked_mul(params.monthly_sell)?
        .checked_mul(params.term_months)?;
    let buy_surcharge = interest_buy.checked_mul(params.surcharge_rate)?;
    let sell_surcharge = interest_sell.checked_mul(params.surcharge_rate)?;

    Ok(FinanciacionBase {
        key,
        base,
        interest_buy,
        interest_sell,
        buy_surcharge,
        sell_surcharge,
        total_buy: interest_buy.checked_add(buy_surcharge)?,
        total_sell: interest_sell.checked_add(sell_surcharge)?,
    })
}

/// Buy and sell financing cost per financed component. The totals are the
/// column sums of `bases`.
pub fn compute(
    amounts: &FinancedAmounts,
    terms: &FinancingTerms,
) -> Result<Financiacion, Overflow> {
    let params = terms.params()?;

    let bases = amounts
        .components()
        .into_iter()
        .map(|(key, base)| financed(key, base, &params))
        .collect::<Result<Vec<_>, _>>()?;

    let column = |f: fn(&FinanciacionBase) -> Decimal| Decimal::checked_sum(bases.iter().map(f));
    let financing_total_buy_usd = column(|b| b.total_buy)?;
    let financing_total_sale_usd = column(|b| b.total_sell)?;

    let totals = FinanciacionTotals {
        base_usd: column(|b| b.base)?,
        interest_buy_usd: column(|b| b.interest_buy)?,
        interest_sell_usd: column(|b| b.interest_sell)?,
        buy_surcharge_usd: column(|b| b.buy_surcharge)?,
        sell_surcharge_usd: column(|b| b.sell_surcharge)?,
        financing_total_buy_usd,
        financing_total_sale_usd,
        financing_margin_usd: financing_total_sale_usd.checked_sub(financing_total_buy_usd)?,
    };

    tracing::debug!(
        base_usd = %totals.base_usd,
        buy_usd = %totals.financing_total_buy_usd,
        sale_usd = %totals.financing_total_sale_usd,
        "financing stage computed"
    );

    Ok(Financiacion {
        bases,
        totals,
        params,
    })
}
