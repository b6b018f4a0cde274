//! Base aggregation and participation-share proration.
//!
//! The declared door total anchors every prorated cost. Allocation is exact:
//! each line receives `door_i / total_door * total`, except the anchor line
//! (largest door value, first on ties) which receives whatever remains, so the
//! parts always sum back to the total with no residue.

use crate::domain::{anchor_line, Decimal, Overflow, QuoteError, SaleLineItem};

/// Participation shares of a set of sale lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proration {
    doors: Vec<Decimal>,
    total_door_usd: Decimal,
    anchor: usize,
}

impl Proration {
    /// Build shares from the declared door values.
    ///
    /// # Errors
    /// Returns [`QuoteError::InvalidInput`] when the door total is not
    /// positive (shares are undefined without a base) or does not fit.
    pub fn from_items(items: &[SaleLineItem]) -> Result<Self, QuoteError> {
        let doors: Vec<Decimal> = items.iter().map(|it| it.door_value_usd).collect();
        let total_door_usd = Decimal::checked_sum(doors.iter().copied())
            .map_err(|_| QuoteError::out_of_range("door value"))?;

        if !total_door_usd.is_positive() {
            return Err(QuoteError::InvalidInput(format!(
                "total_door_usd must be > 0 to prorate costs across {} sale line(s), got {}",
                items.len(),
                total_door_usd
            )));
        }

        let anchor = anchor_line(doors.iter().copied()).unwrap_or(0);

        Ok(Self {
            doors,
            total_door_usd,
            anchor,
        })
    }

    pub fn total_door_usd(&self) -> Decimal {
        self.total_door_usd
    }

    /// Participation share of every line; sums to exactly one.
    pub fn participation(&self) -> Result<Vec<Decimal>, Overflow> {
        self.allocate(Decimal::one())
    }

    /// Split `total` across lines by participation share.
    ///
    /// The share is taken before multiplying, so a large total and a large
    /// door value never meet in one product.
    pub fn allocate(&self, total: Decimal) -> Result<Vec<Decimal>, Overflow> {
        let mut parts = self
            .doors
            .iter()
            .map(|door| door.div_or_zero(self.total_door_usd)?.checked_mul(total))
            .collect::<Result<Vec<_>, _>>()?;

        let others = Decimal::checked_sum(
            parts
                .iter()
                .enumerate()
                .filter(|(idx, _)| *idx != self.anchor)
                .map(|(_, part)| *part),
        )?;
        parts[self.anchor] = total.checked_sub(others)?;

        Ok(parts)
    }
}

/// Stage output: door total, per-line freight and insurance, taxable base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseAggregate {
    pub proration: Proration,
    pub participation: Vec<Decimal>,
    pub flete: Vec<Decimal>,
    pub seguro: Vec<Decimal>,
    /// Per line: door + freight + insurance (CIF).
    pub valor_imponible: Vec<Decimal>,
    /// Taxable base of the whole quote.
    pub imponible_usd: Decimal,
}

impl BaseAggregate {
    /// # Errors
    /// Propagates the zero-base rejection of [`Proration::from_items`], and
    /// reports amounts that leave the decimal range.
    pub fn compute(
        items: &[SaleLineItem],
        freight_total_usd: Decimal,
        insurance_total_usd: Decimal,
    ) -> Result<Self, QuoteError> {
        let proration = Proration::from_items(items)?;
        let out_of_range = |_: Overflow| QuoteError::out_of_range("freight and insurance");

        let participation = proration.participation().map_err(out_of_range)?;
        let flete = proration.allocate(freight_total_usd).map_err(out_of_range)?;
        let seguro = proration.allocate(insurance_total_usd).map_err(out_of_range)?;

        let valor_imponible = items
            .iter()
            .zip(flete.iter().zip(seguro.iter()))
            .map(|(item, (f, s))| item.door_value_usd.checked_add(*f)?.checked_add(*s))
            .collect::<Result<Vec<_>, _>>()
            .map_err(out_of_range)?;
        let imponible_usd =
            Decimal::checked_sum(valor_imponible.iter().copied()).map_err(out_of_range)?;

        Ok(Self {
            proration,
            participation,
            flete,
            seguro,
            valor_imponible,
            imponible_usd,
        })
    }

    pub fn total_door_usd(&self) -> Decimal {
        self.proration.total_door_usd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn item(door: &str) -> SaleLineItem {
        SaleLineItem {
            qty: Decimal::one(),
            door_value_usd: d(door),
            ..Default::default()
        }
    }

    #[test]
    fn test_two_items_split_freight_by_door_value() {
        let base = BaseAggregate::compute(&[item("600"), item("400")], d("100"), d("0")).unwrap();
        assert_eq!(base.flete, vec![d("60"), d("40")]);
        assert_eq!(base.participation, vec![d("0.6"), d("0.4")]);
        assert_eq!(base.imponible_usd, d("1100"));
    }

    #[test]
    fn test_thirds_sum_back_exactly() {
        let proration = Proration::from_items(&[item("1"), item("1"), item("1")]).unwrap();

        let shares = proration.participation().unwrap();
        assert_eq!(shares.iter().sum::<Decimal>(), Decimal::one());

        let parts = proration.allocate(d("100")).unwrap();
        assert_eq!(parts.iter().sum::<Decimal>(), d("100"));
        // The remainder lands on the first of the tied lines.
        assert!(parts[0] >= parts[1]);
        assert_eq!(parts[1], parts[2]);
    }

    #[test]
    fn test_anchor_is_largest_door() {
        let proration = Proration::from_items(&[item("1"), item("7"), item("3")]).unwrap();
        let parts = proration.allocate(d("10")).unwrap();
        assert_eq!(parts.iter().sum::<Decimal>(), d("10"));
        let share = |door: &str| d(door).div_or_zero(d("11")).unwrap();
        assert_eq!(parts[0], share("1").checked_mul(d("10")).unwrap());
        assert_eq!(parts[2], share("3").checked_mul(d("10")).unwrap());
    }

    #[test]
    fn test_zero_door_line_gets_nothing() {
        let proration = Proration::from_items(&[item("0"), item("500")]).unwrap();
        assert_eq!(proration.allocate(d("80")).unwrap(), vec![d("0"), d("80")]);
    }

    #[test]
    fn test_zero_base_rejected() {
        let err = Proration::from_items(&[item("0"), item("0")]).unwrap_err();
        assert!(matches!(err, QuoteError::InvalidInput(msg) if msg.contains("total_door_usd")));

        assert!(Proration::from_items(&[]).is_err());
    }

    #[test]
    fn test_large_totals_prorate_without_overflow() {
        let big = Decimal::parse_number("1e15").unwrap();
        let base = BaseAggregate::compute(&[item("1"), item("1")], big, big).unwrap();
        assert_eq!(base.flete.iter().sum::<Decimal>(), big);

        let huge = Decimal::parse_number("7e28").unwrap();
        let err = BaseAggregate::compute(&[item("1")], huge, huge).unwrap_err();
        assert!(matches!(err, QuoteError::InvalidInput(msg) if msg.contains("out of range")));
    }

    #[test]
    fn test_negative_total_rejected() {
        assert!(Proration::from_items(&[item("-10"), item("5")]).is_err());
    }
}
