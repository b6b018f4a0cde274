//! Customs (despacho) stage: evaluates the duty schedule against the taxable base.
//!
//! Lines are evaluated strictly in declaration order. IVA-type lines see the
//! cumulative base: the taxable base plus every earlier line flagged
//! `include_in_iva_base`. A line's own amount joins that base only after the
//! line has been computed.

use crate::domain::{
    CustomsLine, CustomsLineType, Decimal, Despacho, DespachoLine, DespachoRates, DespachoTotals,
    Overflow,
};

pub fn compute(
    lines: &[CustomsLine],
    imponible_usd: Decimal,
    rates: DespachoRates,
) -> Result<Despacho, Overflow> {
    let declared_rate = rates.exchange_rate_customs_gs_per_usd;
    let mut iva_base = imponible_usd;
    let mut out = Vec::with_capacity(lines.len());

    for line in lines.iter().filter(|l| l.enabled) {
        let (base_usd, usd, gs) = match &line.line_type {
            CustomsLineType::FixedUsd => {
                let usd = line.amount_usd;
                (Decimal::zero(), usd, usd.checked_mul(declared_rate)?)
            }
            CustomsLineType::FixedGs => {
                let gs = line.amount_gs;
                (Decimal::zero(), gs.div_or_zero(declared_rate)?, gs)
            }
            CustomsLineType::PercentOfImponible => {
                let usd = imponible_usd.checked_mul(line.rate_decimal)?;
                (imponible_usd, usd, usd.checked_mul(declared_rate)?)
            }
            CustomsLineType::IvaPercentOfBase => {
                let usd = iva_base.checked_mul(line.rate_decimal)?;
                (iva_base, usd, usd.checked_mul(declared_rate)?)
            }
            CustomsLineType::Unknown(raw) => {
                tracing::debug!(name = %line.name, line_type = %raw, "unknown customs type contributes 0");
                (Decimal::zero(), Decimal::zero(), Decimal::zero())
            }
        };

        if line.include_in_iva_base {
            iva_base = iva_base.checked_add(usd)?;
        }

        out.push(DespachoLine {
            name: line.name.clone(),
            line_type: line.line_type.clone(),
            rate_decimal: line.rate_decimal,
            include_in_iva_base: line.include_in_iva_base,
            base_usd,
            usd,
            gs,
        });
    }

    let customs_total_usd_theoretical = Decimal::checked_sum(out.iter().map(|l| l.usd))?;
    let customs_total_gs = Decimal::checked_sum(out.iter().map(|l| l.gs))?;
    let customs_total_sale_usd =
        customs_total_gs.div_or_zero(rates.exchange_rate_customs_internal_gs_per_usd)?;

    let totals = DespachoTotals {
        valor_imponible_usd: imponible_usd,
        customs_total_usd_theoretical,
        customs_total_gs,
        customs_total_sale_usd,
        customs_exchange_diff_usd: customs_total_sale_usd
            .checked_sub(customs_total_usd_theoretical)?,
    };

    tracing::debug!(
        lines = out.len(),
        theoretical_usd = %totals.customs_total_usd_theoretical,
        sale_usd = %totals.customs_total_sale_usd,
        "customs stage computed"
    );

    Ok(Despacho {
        lines: out,
        totals,
        rates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn rates(declared: &str, internal: &str) -> DespachoRates {
        DespachoRates {
            exchange_rate_customs_gs_per_usd: d(declared),
            exchange_rate_customs_internal_gs_per_usd: d(internal),
        }
    }

    fn line(name: &str, line_type: CustomsLineType, rate: &str, include: bool) -> CustomsLine {
        CustomsLine {
            name: name.to_string(),
            line_type,
            rate_decimal: d(rate),
            amount_usd: Decimal::zero(),
            amount_gs: Decimal::zero(),
            include_in_iva_base: include,
            enabled: true,
        }
    }

    #[test]
    fn test_fixed_amounts_convert_at_declared_rate() {
        let mut arancel = line("Arancel Consular", CustomsLineType::FixedUsd, "0", false);
        arancel.amount_usd = d("55");
        let mut tasa = line("Tasa", CustomsLineType::FixedGs, "0", false);
        tasa.amount_gs = d("390000");

        let desp = compute(&[arancel, tasa], d("1000"), rates("7800", "7000")).unwrap();

        assert_eq!(desp.lines[0].usd, d("55"));
        assert_eq!(desp.lines[0].gs, d("429000"));
        assert_eq!(desp.lines[1].usd, d("50"));
        assert_eq!(desp.lines[1].gs, d("390000"));
        assert_eq!(desp.totals.customs_total_usd_theoretical, d("105"));
        assert_eq!(desp.totals.customs_total_gs, d("819000"));
        assert_eq!(desp.totals.customs_total_sale_usd, d("117"));
        assert_eq!(desp.totals.customs_exchange_diff_usd, d("12"));
    }

    #[test]
    fn test_percent_of_imponible_ignores_other_lines() {
        let derecho = line("Derecho", CustomsLineType::PercentOfImponible, "0.1", true);
        let valoracion = line("Valoracion", CustomsLineType::PercentOfImponible, "0.005", true);

        let desp = compute(&[derecho, valoracion], d("2000"), rates("7800", "7800")).unwrap();
        assert_eq!(desp.lines[0].usd, d("200"));
        assert_eq!(desp.lines[1].usd, d("10"));
        assert_eq!(desp.lines[1].base_usd, d("2000"));
    }

    #[test]
    fn test_iva_sees_earlier_included_lines_only() {
        let derecho = line("Derecho", CustomsLineType::PercentOfImponible, "0.1", true);
        let excluded = line("DINAC", CustomsLineType::PercentOfImponible, "0.02", false);
        let iva = line("I.V.A.", CustomsLineType::IvaPercentOfBase, "0.1", true);
        let iva_again = line("I.V.A. Casual", CustomsLineType::IvaPercentOfBase, "0.1", false);

        let desp =
            compute(&[derecho, excluded, iva, iva_again], d("1000"), rates("1", "1")).unwrap();

        assert_eq!(desp.lines[2].base_usd, d("1100"));
        assert_eq!(desp.lines[2].usd, d("110"));
        // The second IVA line sees the first IVA line's amount in its base.
        assert_eq!(desp.lines[3].base_usd, d("1210"));
        assert_eq!(desp.lines[3].usd, d("121"));
    }

    #[test]
    fn test_line_never_sees_its_own_contribution() {
        let iva = line("I.V.A.", CustomsLineType::IvaPercentOfBase, "0.1", true);
        let desp = compute(&[iva], d("1000"), rates("1", "1")).unwrap();
        assert_eq!(desp.lines[0].base_usd, d("1000"));
        assert_eq!(desp.lines[0].usd, d("100"));
    }

    #[test]
    fn test_declaration_order_changes_iva_amount() {
        let a = line("A", CustomsLineType::IvaPercentOfBase, "0.1", false);
        let b = line("B", CustomsLineType::PercentOfImponible, "0.5", true);

        let ab = compute(&[a.clone(), b.clone()], d("1000"), rates("1", "1")).unwrap();
        let ba = compute(&[b, a], d("1000"), rates("1", "1")).unwrap();

        assert_eq!(ab.lines[0].usd, d("100"));
        assert_eq!(ba.lines[1].usd, d("150"));
        assert_eq!(ab.lines[1].usd, ba.lines[0].usd);
    }

    #[test]
    fn test_disabled_and_unknown_lines() {
        let mut disabled = line("Off", CustomsLineType::FixedUsd, "0", true);
        disabled.amount_usd = d("999");
        disabled.enabled = false;
        let mut unknown = line(
            "Nueva tasa",
            CustomsLineType::Unknown("PER_CONTAINER".to_string()),
            "0.5",
            true,
        );
        unknown.amount_usd = d("40");
        unknown.amount_gs = d("300000");
        let iva = line("I.V.A.", CustomsLineType::IvaPercentOfBase, "0.1", false);

        let desp =
            compute(&[disabled, unknown, iva], d("1000"), rates("7000", "7000")).unwrap();

        assert_eq!(desp.lines.len(), 2);
        assert_eq!(desp.lines[0].name, "Nueva tasa");
        assert!(desp.lines[0].usd.is_zero());
        assert!(desp.lines[0].gs.is_zero());
        assert_eq!(desp.lines[1].usd, d("100"));
        assert_eq!(desp.totals.customs_total_usd_theoretical, d("100"));
    }

    #[test]
    fn test_oversized_rate_reports_overflow() {
        let mut tasa = line("Tasa", CustomsLineType::FixedUsd, "0", false);
        tasa.amount_usd = Decimal::parse_number("1e20").unwrap();
        let result = compute(&[tasa], d("1000"), rates("10000000000", "7000"));
        assert_eq!(result, Err(Overflow));
    }

    #[test]
    fn test_zero_declared_rate_keeps_usd_side() {
        let mut tasa = line("Tasa", CustomsLineType::FixedGs, "0", false);
        tasa.amount_gs = d("100000");
        let desp = compute(&[tasa], d("1000"), rates("0", "7000")).unwrap();
        assert!(desp.lines[0].usd.is_zero());
        assert_eq!(desp.lines[0].gs, d("100000"));
    }
}
