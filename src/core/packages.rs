use crate::core::schedule::{order_identifier, target_date, window};
use crate::domain::model::{Charity, CourierOrder, Donor, NewOrder, OrderKind, TimeOfDay};
use crate::utils::error::{DispatchError, Result};
use chrono::{DateTime, TimeZone};

/// Schedule of the auxiliary order that brings reusable packages from the
/// charity back to the donor.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageOrderPlan {
    pub days_ahead: u32,
    pub pickup_from: TimeOfDay,
    pub pickup_to: TimeOfDay,
    pub deliver_from: TimeOfDay,
    pub deliver_to: TimeOfDay,
    pub pickup_note: String,
    pub deliver_note: String,
}

impl Default for PackageOrderPlan {
    fn default() -> Self {
        Self {
            days_ahead: 1,
            pickup_from: TimeOfDay::from_hm(8, 0),
            pickup_to: TimeOfDay::from_hm(8, 30),
            deliver_from: TimeOfDay::from_hm(9, 0),
            deliver_to: TimeOfDay::from_hm(9, 30),
            pickup_note: "Vyzvednutí REkrabiček".to_string(),
            deliver_note: "Doručení REkrabiček".to_string(),
        }
    }
}

/// Pickup at the charity, drop at the donor, identifier `<charity>-<donor>-<date>`.
pub fn plan_package_order<Tz: TimeZone>(
    donor: &Donor,
    charity: &Charity,
    now: &DateTime<Tz>,
    plan: &PackageOrderPlan,
) -> Result<NewOrder> {
    let drop_address = donor
        .address
        .clone()
        .filter(|address| !address.trim().is_empty())
        .ok_or_else(|| DispatchError::SchemaError {
            record_id: donor.id.clone(),
            message: "donor has no address for the packages delivery".to_string(),
        })?;

    let timezone = now.timezone();
    let date = target_date(now, plan.days_ahead)?;

    Ok(NewOrder {
        courier: CourierOrder {
            identifier: order_identifier(&charity.external_id, &donor.external_id, date),
            branch_identifier: charity.external_id.clone(),
            pickup: window(&timezone, date, plan.pickup_from, plan.pickup_to)?,
            pickup_note: Some(plan.pickup_note.clone()),
            drop_address,
            drop: window(&timezone, date, plan.deliver_from, plan.deliver_to)?,
            drop_note: Some(plan.deliver_note.clone()),
            customer_name: donor.responsible_person.clone(),
            customer_phone: donor.phone.clone(),
        },
        donor_id: donor.id.clone(),
        recipient_id: charity.id.clone(),
        kind: OrderKind::Packages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::{charity, donor};
    use chrono::Utc;

    #[test]
    fn test_package_order_runs_from_charity_to_donor_tomorrow() {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        let donor = donor("recDonor", "Primirest Tanvald", &["recCharity"]);
        let charity = charity("recCharity", "ZJ Beroun");

        let order = plan_package_order(&donor, &charity, &now, &PackageOrderPlan::default())
            .unwrap();

        assert_eq!(order.kind, OrderKind::Packages);
        assert_eq!(order.courier.identifier, "zjberoun-primiresttanvald-16.1.2024");
        assert_eq!(order.courier.branch_identifier, "ZJ Beroun");
        assert_eq!(order.courier.drop_address, "Spojená 22, Praha 3");
        assert_eq!(order.courier.customer_name, "Anna Strejcová");
        assert_eq!(
            order.courier.pickup.start.to_rfc3339(),
            "2024-01-16T08:00:00+00:00"
        );
        assert_eq!(
            order.courier.drop.end.to_rfc3339(),
            "2024-01-16T09:30:00+00:00"
        );
    }

    #[test]
    fn test_package_order_requires_donor_address() {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        let mut donor = donor("recDonor", "Primirest", &["recCharity"]);
        donor.address = None;

        let result = plan_package_order(
            &donor,
            &charity("recCharity", "ZJ Beroun"),
            &now,
            &PackageOrderPlan::default(),
        );
        assert!(matches!(result, Err(DispatchError::SchemaError { .. })));
    }
}
