use crate::domain::model::{Confirmation, Order};
use chrono::{DateTime, Duration, Utc};

/// What the sweep should do with one pending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Confirm { package_pickup: bool },
    Cancel { deadline: DateTime<Utc> },
    Wait { deadline: DateTime<Utc> },
}

/// Latest moment the donor may still confirm the order.
pub fn confirmation_deadline(pickup_from: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    pickup_from - window
}

/// Decide the fate of a pending order from today's confirmations for its donor.
///
/// Any confirmation wins. Without one, the order is canceled only once `now`
/// is strictly past the deadline.
pub fn decide(
    order: &Order,
    confirmations: &[Confirmation],
    now: DateTime<Utc>,
    window: Duration,
) -> Decision {
    if let Some(first) = confirmations.first() {
        return Decision::Confirm {
            package_pickup: first.package_pickup,
        };
    }

    let deadline = confirmation_deadline(order.pickup_from, window);
    if now > deadline {
        Decision::Cancel { deadline }
    } else {
        Decision::Wait { deadline }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::OrderStatus;
    use chrono::TimeZone;

    fn order_with_pickup(pickup_from: DateTime<Utc>) -> Order {
        Order {
            id: "rec1".to_string(),
            identifier: "donor-charity-15.1.2024".to_string(),
            donor_id: "recDonor".to_string(),
            recipient_id: "recCharity".to_string(),
            pickup_from,
            pickup_to: None,
            status: OrderStatus::Pending,
        }
    }

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_confirmation_wins_even_after_deadline() {
        let order = order_with_pickup(at(12, 30));
        let confirmations = vec![Confirmation {
            id: "recOffer".to_string(),
            package_pickup: false,
        }];

        let decision = decide(&order, &confirmations, at(12, 20), Duration::minutes(35));
        assert_eq!(
            decision,
            Decision::Confirm {
                package_pickup: false
            }
        );
    }

    #[test]
    fn test_package_flag_comes_from_first_confirmation() {
        let order = order_with_pickup(at(12, 30));
        let confirmations = vec![
            Confirmation {
                id: "recA".to_string(),
                package_pickup: true,
            },
            Confirmation {
                id: "recB".to_string(),
                package_pickup: false,
            },
        ];

        let decision = decide(&order, &confirmations, at(9, 0), Duration::minutes(35));
        assert_eq!(decision, Decision::Confirm { package_pickup: true });
    }

    #[test]
    fn test_deadline_example_with_35_minute_window() {
        let order = order_with_pickup(at(12, 30));
        let window = Duration::minutes(35);

        assert_eq!(
            decide(&order, &[], at(11, 50), window),
            Decision::Wait {
                deadline: at(11, 55)
            }
        );
        assert_eq!(
            decide(&order, &[], at(12, 0), window),
            Decision::Cancel {
                deadline: at(11, 55)
            }
        );
    }

    #[test]
    fn test_exactly_at_deadline_still_waits() {
        let order = order_with_pickup(at(12, 30));
        assert!(matches!(
            decide(&order, &[], at(11, 55), Duration::minutes(35)),
            Decision::Wait { .. }
        ));
    }

    #[test]
    fn test_sixty_minute_window() {
        let order = order_with_pickup(at(12, 30));
        assert!(matches!(
            decide(&order, &[], at(11, 45), Duration::minutes(60)),
            Decision::Cancel { .. }
        ));
    }
}
