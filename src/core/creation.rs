use crate::core::schedule::{order_identifier, target_date, window};
use crate::core::token::TokenCache;
use crate::domain::model::{Charity, CourierOrder, Donor, NewOrder, OrderKind};
use crate::domain::policy::IdentifierOrder;
use crate::domain::ports::{Courier, Job, JobSummary, OrderStore};
use crate::utils::error::{DispatchError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct CreationSettings {
    pub days_ahead: u32,
    pub identifier_order: IdentifierOrder,
    pub dry_run: bool,
}

impl Default for CreationSettings {
    fn default() -> Self {
        Self {
            days_ahead: 7,
            identifier_order: IdentifierOrder::default(),
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreationReport {
    pub donors: usize,
    /// Donor/recipient pairings attempted, invalid donor records included.
    pub attempted: usize,
    pub created: usize,
    pub failed: usize,
}

impl CreationReport {
    pub fn ensure_any_created(&self) -> Result<()> {
        if self.created == 0 {
            return Err(DispatchError::NothingHandledError {
                items: "orders".to_string(),
            });
        }
        Ok(())
    }
}

/// Builds the regular food order for one donor/charity pairing on `date`.
pub fn plan_order<Tz: TimeZone>(
    donor: &Donor,
    charity: &Charity,
    date: NaiveDate,
    timezone: &Tz,
    identifier_order: IdentifierOrder,
) -> Result<NewOrder> {
    let (first, second) = identifier_order.arrange(&donor.external_id, &charity.external_id);

    Ok(NewOrder {
        courier: CourierOrder {
            identifier: order_identifier(first, second, date),
            branch_identifier: donor.external_id.clone(),
            pickup: window(timezone, date, donor.pickup_from, donor.pickup_to)?,
            pickup_note: donor.note.clone(),
            drop_address: charity.address.clone(),
            drop: window(timezone, date, donor.deliver_from, donor.deliver_to)?,
            drop_note: charity.note.clone(),
            customer_name: charity.responsible_person.clone(),
            customer_phone: charity.phone.clone(),
        },
        donor_id: donor.id.clone(),
        recipient_id: charity.id.clone(),
        kind: OrderKind::Food,
    })
}

/// Creates next-cycle orders for every donor/recipient pairing.
pub struct OrderCreationJob<Tz: TimeZone = Local> {
    store: Arc<dyn OrderStore>,
    courier: Arc<dyn Courier>,
    settings: CreationSettings,
    timezone: Tz,
}

impl OrderCreationJob<Local> {
    pub fn new(
        store: Arc<dyn OrderStore>,
        courier: Arc<dyn Courier>,
        settings: CreationSettings,
    ) -> Self {
        Self::with_timezone(store, courier, settings, Local)
    }
}

impl<Tz> OrderCreationJob<Tz>
where
    Tz: TimeZone + Send + Sync,
    Tz::Offset: Send + Sync,
{
    pub fn with_timezone(
        store: Arc<dyn OrderStore>,
        courier: Arc<dyn Courier>,
        settings: CreationSettings,
        timezone: Tz,
    ) -> Self {
        Self {
            store,
            courier,
            settings,
            timezone,
        }
    }

    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<CreationReport> {
        let date = target_date(&now.with_timezone(&self.timezone), self.settings.days_ahead)?;

        tracing::info!("Loading donors");
        let donors = self.store.list_donors().await?;
        tracing::info!("Found {} donor(s)", donors.len());

        tracing::info!("Loading charities");
        let charities = self.load_charities().await?;
        tracing::info!("Found {} charit(y)ies", charities.len());

        let tokens = TokenCache::new();
        if !self.settings.dry_run {
            // 先取得 token，失敗即整批失敗
            tokens.get(self.courier.as_ref()).await?;
        }

        let mut report = CreationReport {
            donors: donors.len(),
            ..CreationReport::default()
        };

        for record in donors {
            let donor = match record {
                Ok(donor) => donor,
                Err(e) => {
                    tracing::error!("Handling donor failed: {}", e);
                    report.attempted += 1;
                    report.failed += 1;
                    continue;
                }
            };

            if donor.recipient_ids.is_empty() {
                tracing::warn!("Donor {} has no recipients, skipping", donor.external_id);
                continue;
            }

            for recipient_id in &donor.recipient_ids {
                report.attempted += 1;
                match self
                    .handle_pairing(&donor, recipient_id, &charities, date, &tokens)
                    .await
                {
                    Ok(()) => report.created += 1,
                    Err(e) => {
                        tracing::error!(
                            "Handling donor {} and recipient {} failed: {}",
                            donor.external_id,
                            recipient_id,
                            e
                        );
                        report.failed += 1;
                    }
                }
            }
        }

        tracing::info!(
            "Creation finished: {}/{} order(s) created for {}",
            report.created,
            report.attempted,
            date
        );
        Ok(report)
    }

    async fn load_charities(&self) -> Result<HashMap<String, Charity>> {
        let mut charities = HashMap::new();
        for record in self.store.list_charities().await? {
            match record {
                Ok(charity) => {
                    charities.insert(charity.id.clone(), charity);
                }
                Err(e) => tracing::warn!("Skipping invalid charity record: {}", e),
            }
        }
        Ok(charities)
    }

    async fn handle_pairing(
        &self,
        donor: &Donor,
        recipient_id: &str,
        charities: &HashMap<String, Charity>,
        date: NaiveDate,
        tokens: &TokenCache,
    ) -> Result<()> {
        let charity = charities
            .get(recipient_id)
            .ok_or_else(|| DispatchError::NotFoundError {
                record_id: recipient_id.to_string(),
                collection: "charities".to_string(),
            })?;

        let order = plan_order(
            donor,
            charity,
            date,
            &self.timezone,
            self.settings.identifier_order,
        )?;

        if self.settings.dry_run {
            tracing::info!(
                "-> [dry run] would create order {} ({} -> {}, pickup {} - {})",
                order.courier.identifier,
                donor.external_id,
                charity.external_id,
                order.courier.pickup.start,
                order.courier.pickup.end
            );
            return Ok(());
        }

        tracing::info!("-> Creating order {} on DODO", order.courier.identifier);
        let token = tokens.get(self.courier.as_ref()).await?;
        self.courier.create_order(&order.courier, token).await?;

        tracing::info!(
            "-> Adding order {} to \"{}\"",
            order.courier.identifier,
            self.store.orders_location()
        );
        self.store.create_order(&order).await?;
        Ok(())
    }
}

#[async_trait]
impl<Tz> Job for OrderCreationJob<Tz>
where
    Tz: TimeZone + Send + Sync,
    Tz::Offset: Send + Sync,
{
    fn name(&self) -> &'static str {
        "send-orders"
    }

    async fn execute(&self) -> Result<JobSummary> {
        let report = self.run_at(Utc::now()).await?;
        report.ensure_any_created()?;
        Ok(JobSummary {
            attempted: report.attempted,
            handled: report.created,
        })
    }
}
