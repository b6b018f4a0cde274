//! Offer (oferta) finalization: distributes every shared cost onto the sale
//! lines, adds margin and one-off charges, and produces per-line prices.

use crate::domain::{
    AdditionalMode, Decimal, Oferta, OfertaLine, OfertaTotals, Overflow, QuoteInputs,
};
use crate::engine::proration::BaseAggregate;

/// Quote-level sale totals produced by the earlier stages, to be prorated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DistributedCharges {
    pub customs_sale_usd: Decimal,
    pub financing_sale_usd: Decimal,
    pub installation_sale_usd: Decimal,
}

fn additional_per_line(
    inputs: &QuoteInputs,
    base: &BaseAggregate,
) -> Result<Vec<Decimal>, Overflow> {
    let global = inputs.additional_global_usd;
    Ok(match inputs.additional_mode {
        AdditionalMode::ProratedAcrossItems => base.proration.allocate(global)?,
        AdditionalMode::SingleFirstItem => (0..inputs.items.len())
            .map(|idx| if idx == 0 { global } else { Decimal::zero() })
            .collect(),
        AdditionalMode::PerItem => inputs
            .items
            .iter()
            .map(|item| item.additional_usd.unwrap_or(global))
            .collect(),
    })
}

pub fn finalize(
    inputs: &QuoteInputs,
    base: &BaseAggregate,
    charges: &DistributedCharges,
) -> Result<Oferta, Overflow> {
    let despacho = base.proration.allocate(charges.customs_sale_usd)?;
    let finan = base.proration.allocate(charges.financing_sale_usd)?;
    let instal = base.proration.allocate(charges.installation_sale_usd)?;
    let adicional = additional_per_line(inputs, base)?;

    let items = inputs
        .items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            let door = item.door_value_usd;
            let valor_imp = base.valor_imponible[idx];
            let sub_total =
                Decimal::checked_sum([valor_imp, despacho[idx], finan[idx], instal[idx]])?;
            // Margin applies to the declared door value, not to pass-through costs.
            let rent = door.checked_mul(inputs.rent_rate)?;
            let total_sales = Decimal::checked_sum([sub_total, rent, adicional[idx]])?;
            let unit_price = if item.qty.is_positive() {
                Some(total_sales.div_or_zero(item.qty)?)
            } else {
                None
            };

            Ok(OfertaLine {
                line_no: item.line_no.unwrap_or(idx as u32 + 1),
                description: item.description.clone(),
                qty: item.qty,
                door_value_usd: door,
                participation: base.participation[idx],
                flete: base.flete[idx],
                seguro: base.seguro[idx],
                valor_imp,
                despacho: despacho[idx],
                finan: finan[idx],
                instal: instal[idx],
                sub_total,
                rent,
                adicional: adicional[idx],
                total_sales,
                unit_price,
            })
        })
        .collect::<Result<Vec<_>, Overflow>>()?;

    let column = |f: fn(&OfertaLine) -> Decimal| Decimal::checked_sum(items.iter().map(f));
    let totals = OfertaTotals {
        total_door_usd: base.total_door_usd(),
        total_flete_usd: column(|l| l.flete)?,
        total_seguro_usd: column(|l| l.seguro)?,
        total_valor_imp_usd: column(|l| l.valor_imp)?,
        total_despacho_usd: column(|l| l.despacho)?,
        total_finan_usd: column(|l| l.finan)?,
        total_instal_usd: column(|l| l.instal)?,
        total_subtotal_usd: column(|l| l.sub_total)?,
        total_rent_usd: column(|l| l.rent)?,
        total_additional_usd: column(|l| l.adicional)?,
        total_sales_usd: column(|l| l.total_sales)?,
    };

    tracing::debug!(
        lines = items.len(),
        total_sales_usd = %totals.total_sales_usd,
        "offer finalized"
    );

    Ok(Oferta {
        items,
        totals,
        cif_total_usd: base.imponible_usd,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{InsuranceProfitMode, SaleLineItem};

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn inputs(doors: &[&str], mode: AdditionalMode) -> QuoteInputs {
        let body = serde_json::json!({
            "items": doors.iter().map(|door| serde_json::json!({"qty": 1, "door_value_usd": door})).collect::<Vec<_>>(),
            "additional_mode": mode,
            "insurance_profit_mode": InsuranceProfitMode::Corrected,
        });
        QuoteInputs::from_value(body).unwrap()
    }

    fn base_for(inputs: &QuoteInputs) -> BaseAggregate {
        BaseAggregate::compute(
            &inputs.items,
            inputs.freight_international_total_usd,
            inputs.insurance_sale_total_usd,
        )
        .unwrap()
    }

    #[test]
    fn test_single_item_scenario() {
        let mut inp = inputs(&["1000"], AdditionalMode::ProratedAcrossItems);
        inp.freight_international_total_usd = d("100");
        inp.insurance_sale_total_usd = d("20");
        inp.rent_rate = d("0.3");

        let oferta = finalize(&inp, &base_for(&inp), &DistributedCharges::default()).unwrap();
        let line = &oferta.items[0];

        assert_eq!(line.participation, Decimal::one());
        assert_eq!(line.valor_imp, d("1120"));
        assert_eq!(line.rent, d("300"));
        assert_eq!(line.total_sales, d("1420"));
        assert_eq!(line.unit_price, Some(d("1420")));
        assert_eq!(oferta.totals.total_sales_usd, d("1420"));
        assert_eq!(oferta.cif_total_usd, d("1120"));
    }

    #[test]
    fn test_charges_are_prorated() {
        let mut inp = inputs(&["750", "250"], AdditionalMode::ProratedAcrossItems);
        inp.rent_rate = Decimal::zero();
        let charges = DistributedCharges {
            customs_sale_usd: d("200"),
            financing_sale_usd: d("40"),
            installation_sale_usd: d("80"),
        };

        let oferta = finalize(&inp, &base_for(&inp), &charges).unwrap();

        assert_eq!(oferta.items[0].despacho, d("150"));
        assert_eq!(oferta.items[1].finan, d("10"));
        assert_eq!(oferta.items[1].instal, d("20"));
        assert_eq!(oferta.items[0].sub_total, d("750") + d("150") + d("30") + d("60"));
        assert_eq!(oferta.totals.total_despacho_usd, d("200"));
        assert_eq!(oferta.totals.total_sales_usd, d("1320"));
    }

    #[test]
    fn test_additional_modes() {
        let mut inp = inputs(&["300", "100"], AdditionalMode::ProratedAcrossItems);
        inp.additional_global_usd = d("40");

        let prorated = finalize(&inp, &base_for(&inp), &DistributedCharges::default()).unwrap();
        assert_eq!(prorated.items[0].adicional, d("30"));
        assert_eq!(prorated.items[1].adicional, d("10"));

        inp.additional_mode = AdditionalMode::SingleFirstItem;
        let first = finalize(&inp, &base_for(&inp), &DistributedCharges::default()).unwrap();
        assert_eq!(first.items[0].adicional, d("40"));
        assert!(first.items[1].adicional.is_zero());
        assert_eq!(first.totals.total_additional_usd, d("40"));

        inp.additional_mode = AdditionalMode::PerItem;
        inp.items[1].additional_usd = Some(d("5"));
        let per_item = finalize(&inp, &base_for(&inp), &DistributedCharges::default()).unwrap();
        assert_eq!(per_item.items[0].adicional, d("40"));
        assert_eq!(per_item.items[1].adicional, d("5"));
        assert_eq!(per_item.totals.total_additional_usd, d("45"));
    }

    #[test]
    fn test_zero_qty_has_no_unit_price() {
        let mut inp = inputs(&["500", "500"], AdditionalMode::ProratedAcrossItems);
        inp.items[1] = SaleLineItem {
            qty: Decimal::zero(),
            ..inp.items[1].clone()
        };
        inp.items[0].qty = d("4");

        let oferta = finalize(&inp, &base_for(&inp), &DistributedCharges::default()).unwrap();
        assert_eq!(oferta.items[0].unit_price, Some(d("162.5")));
        assert_eq!(oferta.items[1].unit_price, None);
    }

    #[test]
    fn test_oversized_rent_reports_overflow() {
        let mut inp = inputs(&["1000000000000000"], AdditionalMode::ProratedAcrossItems);
        inp.rent_rate = Decimal::parse_number("1e20").unwrap();
        let result = finalize(&inp, &base_for(&inp), &DistributedCharges::default());
        assert_eq!(result, Err(Overflow));
    }
}
