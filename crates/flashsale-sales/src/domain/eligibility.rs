//! Purchase eligibility and pricing.
//!
//! The same predicate runs three times per purchase: on the first snapshot,
//! on the reconciled snapshot, and on the rows as locked. Only the last one
//! is authoritative.

use chrono::{DateTime, Utc};
use flashsale_core::entity::{Product, Sale};
use flashsale_core::error::Ineligibility;
use rust_decimal::{Decimal, RoundingStrategy};

/// Checks whether one unit may be sold right now.
///
/// The sale's start time is not checked; `active` is the opening gate.
///
/// # Errors
///
/// Returns the first reason the purchase must be refused.
pub fn check_eligibility(
    product: &Product,
    sale: &Sale,
    now: DateTime<Utc>,
) -> Result<(), Ineligibility> {
    if !sale.active {
        return Err(Ineligibility::Inactive);
    }
    if product.stock <= 0 {
        return Err(Ineligibility::ProductOutOfStock);
    }
    if sale.sale_stock <= 0 {
        return Err(Ineligibility::SaleStockExhausted);
    }
    if now > sale.end_time {
        return Err(Ineligibility::Ended);
    }
    Ok(())
}

/// Price after applying a percentage discount, to the cent.
///
/// Midpoints round away from zero. The result always carries two decimal
/// places so it renders the same way the store's `NUMERIC(10, 2)` does.
#[must_use]
pub fn discounted_price(price: Decimal, discount: Decimal) -> Decimal {
    let factor = (Decimal::ONE_HUNDRED - discount) / Decimal::ONE_HUNDRED;
    let mut discounted =
        (price * factor).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    discounted.rescale(2);
    discounted
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn rows(stock: i32, sale_stock: i32, active: bool) -> (Product, Sale, DateTime<Utc>) {
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        let product = Product {
            id: 1,
            name: "Iphone 16".to_owned(),
            price: Decimal::from(50),
            stock,
            created_at: now,
            updated_at: now,
        };
        let sale = Sale {
            id: 1,
            product_id: 1,
            sale_stock,
            discount: Decimal::from(10),
            start_time: now,
            end_time: now + Duration::hours(1),
            active,
            created_at: now,
            updated_at: now,
        };
        (product, sale, now)
    }

    #[test]
    fn test_active_sale_with_stock_is_eligible() {
        let (product, sale, now) = rows(10, 3, true);

        assert_eq!(check_eligibility(&product, &sale, now), Ok(()));
    }

    #[test]
    fn test_inactive_sale_is_refused_even_with_stock() {
        let (product, sale, now) = rows(10, 3, false);

        assert_eq!(
            check_eligibility(&product, &sale, now),
            Err(Ineligibility::Inactive)
        );
    }

    #[test]
    fn test_empty_product_stock_is_refused_regardless_of_sale_stock() {
        let (product, sale, now) = rows(0, 3, true);

        assert_eq!(
            check_eligibility(&product, &sale, now),
            Err(Ineligibility::ProductOutOfStock)
        );
    }

    #[test]
    fn test_empty_sale_stock_is_refused_regardless_of_product_stock() {
        let (product, sale, now) = rows(10, 0, true);

        assert_eq!(
            check_eligibility(&product, &sale, now),
            Err(Ineligibility::SaleStockExhausted)
        );
    }

    #[test]
    fn test_purchase_at_end_time_is_allowed_and_after_is_refused() {
        let (product, sale, _) = rows(10, 3, true);

        assert_eq!(check_eligibility(&product, &sale, sale.end_time), Ok(()));
        assert_eq!(
            check_eligibility(
                &product,
                &sale,
                sale.end_time + Duration::milliseconds(1)
            ),
            Err(Ineligibility::Ended)
        );
    }

    #[test]
    fn test_discounted_price_applies_percentage() {
        assert_eq!(
            discounted_price(Decimal::from(50), Decimal::from(10)),
            Decimal::new(4500, 2)
        );
        assert_eq!(
            discounted_price(Decimal::new(1999, 2), Decimal::from(15)),
            Decimal::new(1699, 2)
        );
    }

    #[test]
    fn test_discounted_price_rounds_midpoint_away_from_zero() {
        // 1.25 * 0.5 = 0.625
        assert_eq!(
            discounted_price(Decimal::new(125, 2), Decimal::from(50)),
            Decimal::new(63, 2)
        );
    }

    #[test]
    fn test_discounted_price_renders_two_places() {
        assert_eq!(
            discounted_price(Decimal::from(50), Decimal::from(10)).to_string(),
            "45.00"
        );
    }

    #[test]
    fn test_full_discount_is_free() {
        assert_eq!(
            discounted_price(Decimal::from(100), Decimal::ONE_HUNDRED),
            Decimal::ZERO
        );
    }
}
