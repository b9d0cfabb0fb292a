//! Weighted-average tests for domain_holding

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::UserId;
use domain_holding::{merge_lot, replay_lots, AssetClass, Holding, HoldingError, IncomingLot, Lot, NewLot, Position};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// ============================================================================
// Merge Tests
// ============================================================================

mod merge_tests {
    use super::*;

    #[test]
    fn test_documented_cases() {
        let cases = [
            ((dec!(10), dec!(100)), (dec!(10), dec!(200)), (dec!(20), dec!(150.00))),
            ((dec!(0), dec!(0)), (dec!(5), dec!(42.337)), (dec!(5), dec!(42.34))),
            ((dec!(1), dec!(1.005)), (dec!(1), dec!(1.005)), (dec!(2), dec!(1.01))),
        ];

        for ((eq, ec), (iq, ic), (nq, nc)) in cases {
            let merged = merge_lot(Holding::new(eq, ec), IncomingLot::new(iq, ic)).unwrap();
            assert_eq!(merged.quantity, nq);
            assert_eq!(merged.unit_cost, nc);
        }
    }

    #[test]
    fn test_free_units_lower_the_average() {
        let merged = merge_lot(Holding::new(dec!(9), dec!(10)), IncomingLot::new(dec!(1), dec!(0))).unwrap();
        assert_eq!(merged.unit_cost, dec!(9.00));
    }

    #[test]
    fn test_rejections() {
        let existing = Holding::new(dec!(10), dec!(100));
        assert!(matches!(
            merge_lot(existing, IncomingLot::new(dec!(0), dec!(1))),
            Err(HoldingError::InvalidLot(_))
        ));
        assert!(matches!(
            merge_lot(existing, IncomingLot::new(dec!(1), dec!(-1))),
            Err(HoldingError::InvalidLot(_))
        ));
        assert!(matches!(
            merge_lot(Holding::new(dec!(1), dec!(-3)), IncomingLot::new(dec!(1), dec!(1))),
            Err(HoldingError::InvalidHolding(_))
        ));
    }
}

mod replay_tests {
    use super::*;

    #[test]
    fn test_replay_matches_position() {
        let (mut position, first) = Position::open(
            UserId::new(),
            AssetClass::MutualFund,
            "Axis Bluechip",
            NewLot::new(dec!(100.25), dec!(45.678), date(2023, 6, 1)),
            date(2023, 6, 1),
        )
        .unwrap();
        let mut log = vec![first];
        for (quantity, cost, month) in [(dec!(20.5), dec!(48.1), 7), (dec!(33.333), dec!(51.999), 8)] {
            let day = date(2023, month, 3);
            log.push(position.add_lot(NewLot::new(quantity, cost, day), day).unwrap());
        }

        assert_eq!(replay_lots(&log).unwrap(), position.holding());
    }

    #[test]
    fn test_empty_log_is_empty_holding() {
        let log: Vec<Lot> = Vec::new();
        assert_eq!(replay_lots(&log).unwrap(), Holding::empty());
    }
}

// ============================================================================
// Property Tests
// ============================================================================

fn lot_strategy() -> impl Strategy<Value = IncomingLot> {
    (1i64..1_000_000i64, 0i64..10_000_000i64)
        .prop_map(|(q, c)| IncomingLot::new(Decimal::new(q, 3), Decimal::new(c, 3)))
}

proptest! {
    #[test]
    fn replay_equals_incremental_merge(lots in proptest::collection::vec(lot_strategy(), 1..20)) {
        let today = date(2024, 1, 1);
        let first = lots[0];
        let (mut position, opening) = Position::open(
            UserId::new(),
            AssetClass::Stock,
            "Generated",
            NewLot::new(first.quantity, first.unit_cost, today),
            today,
        ).unwrap();

        let mut log = vec![opening];
        for lot in &lots[1..] {
            log.push(position.add_lot(NewLot::new(lot.quantity, lot.unit_cost, today), today).unwrap());
        }

        prop_assert_eq!(replay_lots(&log).unwrap(), position.holding());
    }

    #[test]
    fn average_lies_between_inputs(existing in lot_strategy(), incoming in lot_strategy()) {
        let start = merge_lot(Holding::empty(), existing).unwrap();
        let merged = merge_lot(start, incoming).unwrap();

        let low = start.unit_cost.min(incoming.unit_cost);
        let high = start.unit_cost.max(incoming.unit_cost);
        let half_cent = dec!(0.005);
        prop_assert!(merged.unit_cost >= low - half_cent);
        prop_assert!(merged.unit_cost <= high + half_cent);
        prop_assert_eq!(merged.quantity, existing.quantity + incoming.quantity);
        prop_assert!(merged.unit_cost.scale() <= 2);
    }
}
