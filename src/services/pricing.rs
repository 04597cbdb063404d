use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::entities::coupon::{self, CouponType};

const ONE_HUNDRED: Decimal = dec!(100);

/// Result of applying a coupon to a cart subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pricing {
    pub discount: Decimal,
    pub total: Decimal,
}

/// Computes the discount and final total for a subtotal.
///
/// Pure function: the only inputs are the coupon snapshot and the subtotal,
/// so callers can price carts without touching storage. Percentage values
/// are clamped to [0, 100]; a fixed discount never exceeds the subtotal;
/// the final total never goes negative.
pub fn compute_discount(coupon: Option<&coupon::Model>, subtotal: Decimal) -> Pricing {
    let Some(coupon) = coupon else {
        return Pricing {
            discount: Decimal::ZERO,
            total: subtotal,
        };
    };

    let discount = match coupon.coupon_type {
        CouponType::Percentage => {
            let rate = coupon.value.clamp(Decimal::ZERO, ONE_HUNDRED);
            subtotal * rate / ONE_HUNDRED
        }
        CouponType::Fixed => coupon.value.max(Decimal::ZERO).min(subtotal),
    };

    Pricing {
        discount,
        total: (subtotal - discount).max(Decimal::ZERO),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use test_case::test_case;
    use uuid::Uuid;

    fn coupon(coupon_type: CouponType, value: Decimal) -> coupon::Model {
        let now = Utc::now();
        coupon::Model {
            id: Uuid::new_v4(),
            code: "TEST".to_string(),
            coupon_type,
            value,
            is_active: true,
            expires_at: None,
            max_uses: 0,
            used_count: 0,
            min_purchase_amount: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    #[test_case(dec!(25), dec!(200), dec!(50), dec!(150) ; "quarter off two hundred")]
    #[test_case(dec!(100), dec!(80), dec!(80), dec!(0) ; "full percentage discount")]
    #[test_case(dec!(150), dec!(80), dec!(80), dec!(0) ; "percentage above hundred clamps")]
    #[test_case(dec!(10), dec!(0), dec!(0), dec!(0) ; "zero subtotal")]
    fn percentage_discounts(value: Decimal, subtotal: Decimal, discount: Decimal, total: Decimal) {
        let c = coupon(CouponType::Percentage, value);
        let pricing = compute_discount(Some(&c), subtotal);
        assert_eq!(pricing.discount, discount);
        assert_eq!(pricing.total, total);
    }

    #[test_case(dec!(300), dec!(200), dec!(200), dec!(0) ; "fixed clipped to subtotal")]
    #[test_case(dec!(50), dec!(200), dec!(50), dec!(150) ; "fixed below subtotal")]
    #[test_case(dec!(0), dec!(200), dec!(0), dec!(200) ; "zero fixed discount")]
    fn fixed_discounts(value: Decimal, subtotal: Decimal, discount: Decimal, total: Decimal) {
        let c = coupon(CouponType::Fixed, value);
        let pricing = compute_discount(Some(&c), subtotal);
        assert_eq!(pricing.discount, discount);
        assert_eq!(pricing.total, total);
    }

    #[test]
    fn no_coupon_passes_subtotal_through() {
        let pricing = compute_discount(None, dec!(42.50));
        assert_eq!(pricing.discount, Decimal::ZERO);
        assert_eq!(pricing.total, dec!(42.50));
    }

    #[test]
    fn negative_percentage_clamps_to_zero() {
        let c = coupon(CouponType::Percentage, dec!(-10));
        let pricing = compute_discount(Some(&c), dec!(100));
        assert_eq!(pricing.discount, Decimal::ZERO);
        assert_eq!(pricing.total, dec!(100));
    }

    #[test]
    fn negative_fixed_value_clamps_to_zero() {
        let c = coupon(CouponType::Fixed, dec!(-5));
        let pricing = compute_discount(Some(&c), dec!(100));
        assert_eq!(pricing.discount, Decimal::ZERO);
        assert_eq!(pricing.total, dec!(100));
    }

    #[test]
    fn fractional_percentage_keeps_precision() {
        let c = coupon(CouponType::Percentage, dec!(12.5));
        let pricing = compute_discount(Some(&c), dec!(80));
        assert_eq!(pricing.discount, dec!(10.000));
        assert_eq!(pricing.total, dec!(70.000));
    }
}
