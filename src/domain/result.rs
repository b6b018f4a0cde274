//! Quote result: one record per calculation sheet.
//!
//! Stage functions fill these types at full precision. `QuoteResult::rounded`
//! produces the display copy returned to callers: USD amounts to cents, local
//! currency (Gs) to whole units. Shares and rates are never rounded.
//!
//! Offer totals are rounded from the exact sums. Each offer column is then
//! settled on the anchor line so the displayed lines add up to the displayed
//! total.

use crate::domain::{CustomsLineType, Decimal};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteResult {
    pub oferta: Oferta,
    pub despacho: Despacho,
    pub instalacion: Instalacion,
    pub financiacion: Financiacion,
    pub operacion: Operacion,
}

impl QuoteResult {
    pub fn rounded(&self) -> QuoteResult {
        QuoteResult {
            oferta: self.oferta.rounded(),
            despacho: self.despacho.rounded(),
            instalacion: self.instalacion.rounded(),
            financiacion: self.financiacion.rounded(),
            operacion: self.operacion.rounded(),
        }
    }
}

// =============================================================================
// Oferta
// =============================================================================

/// A sale line after every shared cost has been distributed onto it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfertaLine {
    pub line_no: u32,
    pub description: String,
    pub qty: Decimal,
    pub door_value_usd: Decimal,
    /// Share of the total door value, in [0, 1].
    pub participation: Decimal,
    pub flete: Decimal,
    pub seguro: Decimal,
    pub valor_imp: Decimal,
    pub despacho: Decimal,
    pub finan: Decimal,
    pub instal: Decimal,
    pub sub_total: Decimal,
    pub rent: Decimal,
    pub adicional: Decimal,
    pub total_sales: Decimal,
    /// `None` when the line has no quantity.
    pub unit_price: Option<Decimal>,
}

impl OfertaLine {
    fn rounded(&self) -> OfertaLine {
        OfertaLine {
            line_no: self.line_no,
            description: self.description.clone(),
            qty: self.qty,
            door_value_usd: self.door_value_usd.round_usd(),
            participation: self.participation,
            flete: self.flete.round_usd(),
            seguro: self.seguro.round_usd(),
            valor_imp: self.valor_imp.round_usd(),
            despacho: self.despacho.round_usd(),
            finan: self.finan.round_usd(),
            instal: self.instal.round_usd(),
            sub_total: self.sub_total.round_usd(),
            rent: self.rent.round_usd(),
            adicional: self.adicional.round_usd(),
            total_sales: self.total_sales.round_usd(),
            unit_price: self.unit_price.map(|p| p.round_usd()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OfertaTotals {
    pub total_door_usd: Decimal,
    pub total_flete_usd: Decimal,
    pub total_seguro_usd: Decimal,
    pub total_valor_imp_usd: Decimal,
    pub total_despacho_usd: Decimal,
    pub total_finan_usd: Decimal,
    pub total_instal_usd: Decimal,
    pub total_subtotal_usd: Decimal,
    pub total_rent_usd: Decimal,
    pub total_additional_usd: Decimal,
    /// Canonical sell total of the quote; the operation rollup reuses it.
    pub total_sales_usd: Decimal,
}

impl OfertaTotals {
    fn rounded(&self) -> OfertaTotals {
        OfertaTotals {
            total_door_usd: self.total_door_usd.round_usd(),
            total_flete_usd: self.total_flete_usd.round_usd(),
            total_seguro_usd: self.total_seguro_usd.round_usd(),
            total_valor_imp_usd: self.total_valor_imp_usd.round_usd(),
            total_despacho_usd: self.total_despacho_usd.round_usd(),
            total_finan_usd: self.total_finan_usd.round_usd(),
            total_instal_usd: self.total_instal_usd.round_usd(),
            total_subtotal_usd: self.total_subtotal_usd.round_usd(),
            total_rent_usd: self.total_rent_usd.round_usd(),
            total_additional_usd: self.total_additional_usd.round_usd(),
            total_sales_usd: self.total_sales_usd.round_usd(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Oferta {
    pub items: Vec<OfertaLine>,
    pub totals: OfertaTotals,
    /// Door + freight + insurance across the quote (CIF).
    pub cif_total_usd: Decimal,
}

/// Index of the line that absorbs remainders: the largest door value, first
/// on ties. `None` when there are no lines.
pub fn anchor_line<I>(doors: I) -> Option<usize>
where
    I: IntoIterator<Item = Decimal>,
{
    let mut anchor: Option<(usize, Decimal)> = None;
    for (idx, door) in doors.into_iter().enumerate() {
        match anchor {
            Some((_, best)) if door <= best => {}
            _ => anchor = Some((idx, door)),
        }
    }
    anchor.map(|(idx, _)| idx)
}

/// Replace the anchor's rounded amount with `total` minus the other rounded
/// amounts. Left as is if that difference does not fit.
fn settle_column(
    items: &mut [OfertaLine],
    anchor: usize,
    total: Decimal,
    field: fn(&mut OfertaLine) -> &mut Decimal,
) {
    let others = items
        .iter_mut()
        .enumerate()
        .filter(|(idx, _)| *idx != anchor)
        .try_fold(Decimal::zero(), |acc, (_, line)| acc.checked_add(*field(line)));
    if let Ok(settled) = others.and_then(|others| total.checked_sub(others)) {
        *field(&mut items[anchor]) = settled;
    }
}

impl Oferta {
    fn rounded(&self) -> Oferta {
        let totals = self.totals.rounded();
        let mut items: Vec<OfertaLine> = self.items.iter().map(OfertaLine::rounded).collect();

        if let Some(anchor) = anchor_line(self.items.iter().map(|l| l.door_value_usd)) {
            settle_column(&mut items, anchor, totals.total_door_usd, |l| &mut l.door_value_usd);
            settle_column(&mut items, anchor, totals.total_flete_usd, |l| &mut l.flete);
            settle_column(&mut items, anchor, totals.total_seguro_usd, |l| &mut l.seguro);
            settle_column(&mut items, anchor, totals.total_valor_imp_usd, |l| &mut l.valor_imp);
            settle_column(&mut items, anchor, totals.total_despacho_usd, |l| &mut l.despacho);
            settle_column(&mut items, anchor, totals.total_finan_usd, |l| &mut l.finan);
            settle_column(&mut items, anchor, totals.total_instal_usd, |l| &mut l.instal);
            settle_column(&mut items, anchor, totals.total_subtotal_usd, |l| &mut l.sub_total);
            settle_column(&mut items, anchor, totals.total_rent_usd, |l| &mut l.rent);
            settle_column(&mut items, anchor, totals.total_additional_usd, |l| &mut l.adicional);
            settle_column(&mut items, anchor, totals.total_sales_usd, |l| &mut l.total_sales);

            let line = &mut items[anchor];
            if line.unit_price.is_some() {
                if let Ok(price) = line.total_sales.div_or_zero(line.qty) {
                    line.unit_price = Some(price.round_usd());
                }
            }
        }

        Oferta {
            items,
            totals,
            cif_total_usd: self.cif_total_usd.round_usd(),
        }
    }
}

// =============================================================================
// Despacho
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DespachoLine {
    pub name: String,
    #[serde(rename = "type")]
    pub line_type: CustomsLineType,
    pub rate_decimal: Decimal,
    pub include_in_iva_base: bool,
    /// Base the rate was applied to; zero for fixed amounts.
    pub base_usd: Decimal,
    pub usd: Decimal,
    pub gs: Decimal,
}

impl DespachoLine {
    fn rounded(&self) -> DespachoLine {
        DespachoLine {
            name: self.name.clone(),
            line_type: self.line_type.clone(),
            rate_decimal: self.rate_decimal,
            include_in_iva_base: self.include_in_iva_base,
            base_usd: self.base_usd.round_usd(),
            usd: self.usd.round_usd(),
            gs: self.gs.round_local(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DespachoTotals {
    pub valor_imponible_usd: Decimal,
    /// Sum of line amounts at the declared customs rate.
    pub customs_total_usd_theoretical: Decimal,
    pub customs_total_gs: Decimal,
    /// Local-currency total re-priced at the internal rate.
    pub customs_total_sale_usd: Decimal,
    /// `customs_total_sale_usd - customs_total_usd_theoretical`.
    pub customs_exchange_diff_usd: Decimal,
}

impl DespachoTotals {
    fn rounded(&self) -> DespachoTotals {
        DespachoTotals {
            valor_imponible_usd: self.valor_imponible_usd.round_usd(),
            customs_total_usd_theoretical: self.customs_total_usd_theoretical.round_usd(),
            customs_total_gs: self.customs_total_gs.round_local(),
            customs_total_sale_usd: self.customs_total_sale_usd.round_usd(),
            customs_exchange_diff_usd: self.customs_exchange_diff_usd.round_usd(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DespachoRates {
    pub exchange_rate_customs_gs_per_usd: Decimal,
    pub exchange_rate_customs_internal_gs_per_usd: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Despacho {
    pub lines: Vec<DespachoLine>,
    pub totals: DespachoTotals,
    pub rates: DespachoRates,
}

impl Despacho {
    fn rounded(&self) -> Despacho {
        Despacho {
            lines: self.lines.iter().map(DespachoLine::rounded).collect(),
            totals: self.totals.rounded(),
            rates: self.rates.clone(),
        }
    }
}

// =============================================================================
// Instalacion
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalacionLine {
    pub line_no: u32,
    pub description: String,
    pub qty: Decimal,
    pub unit_cost_gs: Decimal,
    pub unit_price_gs: Decimal,
    pub total_cost_gs: Decimal,
    pub total_sale_gs: Decimal,
    pub profit_gs: Decimal,
    pub sale_usd: Decimal,
    pub profit_usd: Decimal,
}

impl InstalacionLine {
    fn rounded(&self) -> InstalacionLine {
        InstalacionLine {
            line_no: self.line_no,
            description: self.description.clone(),
            qty: self.qty,
            unit_cost_gs: self.unit_cost_gs.round_local(),
            unit_price_gs: self.unit_price_gs.round_local(),
            total_cost_gs: self.total_cost_gs.round_local(),
            total_sale_gs: self.total_sale_gs.round_local(),
            profit_gs: self.profit_gs.round_local(),
            sale_usd: self.sale_usd.round_usd(),
            profit_usd: self.profit_usd.round_usd(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InstalacionTotals {
    pub installation_total_cost_gs: Decimal,
    pub installation_total_sale_gs: Decimal,
    pub installation_total_profit_gs: Decimal,
    pub installation_total_cost_usd: Decimal,
    pub installation_total_sale_usd: Decimal,
    pub installation_total_profit_usd: Decimal,
}

impl InstalacionTotals {
    fn rounded(&self) -> InstalacionTotals {
        InstalacionTotals {
            installation_total_cost_gs: self.installation_total_cost_gs.round_local(),
            installation_total_sale_gs: self.installation_total_sale_gs.round_local(),
            installation_total_profit_gs: self.installation_total_profit_gs.round_local(),
            installation_total_cost_usd: self.installation_total_cost_usd.round_usd(),
            installation_total_sale_usd: self.installation_total_sale_usd.round_usd(),
            installation_total_profit_usd: self.installation_total_profit_usd.round_usd(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instalacion {
    pub lines: Vec<InstalacionLine>,
    pub totals: InstalacionTotals,
}

impl Instalacion {
    fn rounded(&self) -> Instalacion {
        Instalacion {
            lines: self.lines.iter().map(InstalacionLine::rounded).collect(),
            totals: self.totals.rounded(),
        }
    }
}

// =============================================================================
// Financiacion
// =============================================================================

/// Component of the financed base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinancingComponent {
    Puertas,
    FleteSeguro,
    Despacho,
    Instalacion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinanciacionBase {
    pub key: FinancingComponent,
    pub base: Decimal,
    pub interest_buy: Decimal,
    pub interest_sell: Decimal,
    pub buy_surcharge: Decimal,
    pub sell_surcharge: Decimal,
    pub total_buy: Decimal,
    pub total_sell: Decimal,
}

impl FinanciacionBase {
    fn rounded(&self) -> FinanciacionBase {
        FinanciacionBase {
            key: self.key,
            base: self.base.round_usd(),
            interest_buy: self.interest_buy.round_usd(),
            interest_sell: self.interest_sell.round_usd(),
            buy_surcharge: self.buy_surcharge.round_usd(),
            sell_surcharge: self.sell_surcharge.round_usd(),
            total_buy: self.total_buy.round_usd(),
            total_sell: self.total_sell.round_usd(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FinanciacionTotals {
    pub base_usd: Decimal,
    pub interest_buy_usd: Decimal,
    pub interest_sell_usd: Decimal,
    pub buy_surcharge_usd: Decimal,
    pub sell_surcharge_usd: Decimal,
    pub financing_total_buy_usd: Decimal,
    pub financing_total_sale_usd: Decimal,
    pub financing_margin_usd: Decimal,
}

impl FinanciacionTotals {
    fn rounded(&self) -> FinanciacionTotals {
        FinanciacionTotals {
            base_usd: self.base_usd.round_usd(),
            interest_buy_usd: self.interest_buy_usd.round_usd(),
            interest_sell_usd: self.interest_sell_usd.round_usd(),
            buy_surcharge_usd: self.buy_surcharge_usd.round_usd(),
            sell_surcharge_usd: self.sell_surcharge_usd.round_usd(),
            financing_total_buy_usd: self.financing_total_buy_usd.round_usd(),
            financing_total_sale_usd: self.financing_total_sale_usd.round_usd(),
            financing_margin_usd: self.financing_margin_usd.round_usd(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FinanciacionParams {
    pub monthly_buy: Decimal,
    pub monthly_sell: Decimal,
    pub term_months: Decimal,
    pub surcharge_rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Financiacion {
    pub bases: Vec<FinanciacionBase>,
    pub totals: FinanciacionTotals,
    pub params: FinanciacionParams,
}

impl Financiacion {
    fn rounded(&self) -> Financiacion {
        Financiacion {
            bases: self.bases.iter().map(FinanciacionBase::rounded).collect(),
            totals: self.totals.rounded(),
            params: self.params.clone(),
        }
    }
}

// =============================================================================
// Operacion
// =============================================================================

/// Cost category tracked with separate buy/sell/profit figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rubro {
    Puertas,
    Flete,
    Despacho,
    Adicional,
    Financiacion,
    Locales,
    Seguro,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RubroLine {
    pub rubro: Rubro,
    pub buy_usd: Decimal,
    pub sell_usd: Decimal,
    pub profit_usd: Decimal,
}

impl RubroLine {
    fn rounded(&self) -> RubroLine {
        RubroLine {
            rubro: self.rubro,
            buy_usd: self.buy_usd.round_usd(),
            sell_usd: self.sell_usd.round_usd(),
            profit_usd: self.profit_usd.round_usd(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OperacionTotals {
    pub total_buy_usd: Decimal,
    pub total_sell_usd: Decimal,
    pub profit_total_usd: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProfitDistribution {
    pub vendor_profit_pct: Decimal,
    pub vendor_profit_usd: Decimal,
    pub final_profit_usd: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operacion {
    pub rubros: Vec<RubroLine>,
    pub totals: OperacionTotals,
    pub distribution: ProfitDistribution,
}

impl Operacion {
    /// Look up one rubro row.
    pub fn rubro(&self, rubro: Rubro) -> Option<&RubroLine> {
        self.rubros.iter().find(|r| r.rubro == rubro)
    }

    fn rounded(&self) -> Operacion {
        Operacion {
            rubros: self.rubros.iter().map(RubroLine::rounded).collect(),
            totals: OperacionTotals {
                total_buy_usd: self.totals.total_buy_usd.round_usd(),
                total_sell_usd: self.totals.total_sell_usd.round_usd(),
                profit_total_usd: self.totals.profit_total_usd.round_usd(),
            },
            distribution: ProfitDistribution {
                vendor_profit_pct: self.distribution.vendor_profit_pct,
                vendor_profit_usd: self.distribution.vendor_profit_usd.round_usd(),
                final_profit_usd: self.distribution.final_profit_usd.round_usd(),
            },
        }
    }
}
