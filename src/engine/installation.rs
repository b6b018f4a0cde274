//! Installation stage: a flat local-currency (Gs) ledger.

use crate::domain::{
    Decimal, InstallLineItem, Instalacion, InstalacionLine, InstalacionTotals, Overflow,
};

/// Cost, sale and profit per installation line, with USD totals at the
/// installation exchange rate. Independent of every other stage.
pub fn compute(
    items: &[InstallLineItem],
    rate_gs_per_usd: Decimal,
) -> Result<Instalacion, Overflow> {
    let lines = items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            let total_cost_gs = item.qty.checked_mul(item.unit_cost_gs)?;
            let total_sale_gs = item.qty.checked_mul(item.unit_price_gs)?;
            let profit_gs = total_sale_gs.checked_sub(total_cost_gs)?;

            Ok(InstalacionLine {
                line_no: item.line_no.unwrap_or(idx as u32 + 1),
                description: item.description.clone(),
                qty: item.qty,
                unit_cost_gs: item.unit_cost_gs,
                unit_price_gs: item.unit_price_gs,
                total_cost_gs,
                total_sale_gs,
                profit_gs,
                sale_usd: total_sale_gs.div_or_zero(rate_gs_per_usd)?,
                profit_usd: profit_gs.div_or_zero(rate_gs_per_usd)?,
            })
        })
        .collect::<Result<Vec<_>, Overflow>>()?;

    let cost_gs = Decimal::checked_sum(lines.iter().map(|l| l.total_cost_gs))?;
    let sale_gs = Decimal::checked_sum(lines.iter().map(|l| l.total_sale_gs))?;
    let profit_gs = sale_gs.checked_sub(cost_gs)?;

    let totals = InstalacionTotals {
        installation_total_cost_gs: cost_gs,
        installation_total_sale_gs: sale_gs,
        installation_total_profit_gs: profit_gs,
        installation_total_cost_usd: cost_gs.div_or_zero(rate_gs_per_usd)?,
        installation_total_sale_usd: sale_gs.div_or_zero(rate_gs_per_usd)?,
        installation_total_profit_usd: profit_gs.div_or_zero(rate_gs_per_usd)?,
    };

    tracing::debug!(
        lines = lines.len(),
        cost_gs = %totals.installation_total_cost_gs,
        sale_gs = %totals.installation_total_sale_gs,
        "installation stage computed"
    );

    Ok(Instalacion { lines, totals })
}
