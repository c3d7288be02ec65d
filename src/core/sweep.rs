use crate::core::decision::{decide, Decision};
use crate::core::packages::{plan_package_order, PackageOrderPlan};
use crate::core::schedule::local_day;
use crate::core::token::TokenCache;
use crate::domain::model::{LocalDay, Order, OrderStatus};
use crate::domain::policy::WaitingPolicy;
use crate::domain::ports::{Courier, Job, JobSummary, OrderStore};
use crate::utils::error::{DispatchError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use std::collections::HashSet;
use std::sync::Arc;

pub const DEFAULT_CANCEL_REASON: &str = "Delivery was not confirmed in time";

#[derive(Debug, Clone, PartialEq)]
pub struct SweepSettings {
    pub confirm_window: Duration,
    pub waiting_policy: WaitingPolicy,
    pub cancel_reason: String,
    /// Log decisions without touching the store or the courier.
    pub dry_run: bool,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            confirm_window: Duration::minutes(35),
            waiting_policy: WaitingPolicy::default(),
            cancel_reason: DEFAULT_CANCEL_REASON.to_string(),
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Confirmed,
    Canceled,
    Waiting,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub total: usize,
    pub handled: usize,
    pub confirmed: usize,
    pub canceled: usize,
    pub waiting: usize,
    pub failed: usize,
}

impl SweepReport {
    pub fn is_complete(&self) -> bool {
        self.handled == self.total
    }

    pub fn ensure_complete(&self) -> Result<()> {
        if self.is_complete() {
            Ok(())
        } else {
            Err(DispatchError::PartialFailureError {
                handled: self.handled,
                total: self.total,
                items: "order(s)".to_string(),
            })
        }
    }
}

/// Confirms or cancels today's pending orders.
pub struct ConfirmationSweep<Tz: TimeZone = Local> {
    store: Arc<dyn OrderStore>,
    courier: Arc<dyn Courier>,
    settings: SweepSettings,
    packages: PackageOrderPlan,
    timezone: Tz,
}

impl ConfirmationSweep<Local> {
    pub fn new(
        store: Arc<dyn OrderStore>,
        courier: Arc<dyn Courier>,
        settings: SweepSettings,
        packages: PackageOrderPlan,
    ) -> Self {
        Self::with_timezone(store, courier, settings, packages, Local)
    }
}

impl<Tz> ConfirmationSweep<Tz>
where
    Tz: TimeZone + Send + Sync,
    Tz::Offset: Send + Sync,
{
    pub fn with_timezone(
        store: Arc<dyn OrderStore>,
        courier: Arc<dyn Courier>,
        settings: SweepSettings,
        packages: PackageOrderPlan,
        timezone: Tz,
    ) -> Self {
        Self {
            store,
            courier,
            settings,
            packages,
            timezone,
        }
    }

    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let tokens = TokenCache::new();
        let today = local_day(&self.timezone, now)?;

        tracing::info!("Loading orders from \"{}\"", self.store.orders_location());
        let records = self.store.list_pending_orders_due_today(&today).await?;
        tracing::info!(
            "Found {} order(s) in \"{}\"",
            records.len(),
            self.store.orders_location()
        );

        let mut report = SweepReport {
            total: records.len(),
            ..SweepReport::default()
        };
        let mut seen = HashSet::new();

        for record in records {
            let order = match record {
                Ok(order) => order,
                Err(e) => {
                    tracing::error!("Handling order failed: {}", e);
                    report.failed += 1;
                    continue;
                }
            };

            // 同一筆訂單每次執行最多轉換一次狀態
            if !seen.insert(order.id.clone()) {
                tracing::warn!(
                    "Order {} listed more than once, skipping duplicate",
                    order.identifier
                );
                report.total -= 1;
                continue;
            }

            tracing::info!("Handling order {}", order.identifier);
            match self.handle_order(&order, &today, &tokens).await {
                Ok(Outcome::Confirmed) => {
                    report.confirmed += 1;
                    report.handled += 1;
                }
                Ok(Outcome::Canceled) => {
                    report.canceled += 1;
                    report.handled += 1;
                }
                Ok(Outcome::Waiting) => {
                    report.waiting += 1;
                    if self.settings.waiting_policy.counts_as_handled() {
                        report.handled += 1;
                    }
                }
                Err(e) => {
                    tracing::error!("Handling order {} failed: {}", order.identifier, e);
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            "Sweep finished: {} confirmed, {} canceled, {} waiting, {} failed",
            report.confirmed,
            report.canceled,
            report.waiting,
            report.failed
        );
        Ok(report)
    }

    async fn handle_order(
        &self,
        order: &Order,
        today: &LocalDay,
        tokens: &TokenCache,
    ) -> Result<Outcome> {
        let now = today.now;
        if !order.status.can_transition_to(OrderStatus::Confirmed)
            || !order.status.can_transition_to(OrderStatus::Canceled)
        {
            return Err(DispatchError::InvalidTransitionError {
                order: order.identifier.clone(),
                from: order.status.to_string(),
                to: "confirmed/canceled".to_string(),
            });
        }

        tracing::debug!("-> Searching order {} confirmation", order.identifier);
        let confirmations = self
            .store
            .list_confirmations_for_donor_today(&order.donor_id, today)
            .await?;

        match decide(order, &confirmations, now, self.settings.confirm_window) {
            Decision::Confirm { package_pickup } => {
                tracing::info!(
                    "-> Confirmation found for order {} ({} record(s))",
                    order.identifier,
                    confirmations.len()
                );
                if self.settings.dry_run {
                    tracing::info!("-> [dry run] would confirm order {}", order.identifier);
                    return Ok(Outcome::Confirmed);
                }

                if package_pickup {
                    tracing::info!(
                        "-> Creating new order for packages delivery for order {}",
                        order.identifier
                    );
                    if let Err(e) = self.create_package_order(order, now, tokens).await {
                        tracing::error!(
                            "Failed creating packages order for {}: {}",
                            order.identifier,
                            e
                        );
                    }
                }

                self.store
                    .set_order_status(order, OrderStatus::Confirmed)
                    .await?;
                tracing::info!("-> Successfully confirmed order {}", order.identifier);
                Ok(Outcome::Confirmed)
            }
            Decision::Cancel { deadline } => {
                tracing::warn!(
                    "-> Canceling delivery for order {}. Latest time for confirmation {} passed.",
                    order.identifier,
                    self.local_time(deadline)
                );
                if self.settings.dry_run {
                    tracing::info!("-> [dry run] would cancel order {}", order.identifier);
                    return Ok(Outcome::Canceled);
                }

                let token = tokens.get(self.courier.as_ref()).await?;
                self.courier
                    .cancel_order(&order.identifier, &self.settings.cancel_reason, now, token)
                    .await?;
                self.store
                    .set_order_status(order, OrderStatus::Canceled)
                    .await?;
                tracing::info!("-> Successfully canceled order {}", order.identifier);
                Ok(Outcome::Canceled)
            }
            Decision::Wait { deadline } => {
                tracing::info!(
                    "-> Confirmation NOT FOUND for order {}, waiting until {}",
                    order.identifier,
                    self.local_time(deadline)
                );
                Ok(Outcome::Waiting)
            }
        }
    }

    async fn create_package_order(
        &self,
        order: &Order,
        now: DateTime<Utc>,
        tokens: &TokenCache,
    ) -> Result<()> {
        let donor = self.store.get_donor(&order.donor_id).await?;
        let charity = self.store.get_charity(&order.recipient_id).await?;
        let new_order = plan_package_order(
            &donor,
            &charity,
            &now.with_timezone(&self.timezone),
            &self.packages,
        )?;

        let token = tokens.get(self.courier.as_ref()).await?;
        self.courier.create_order(&new_order.courier, token).await?;
        self.store.create_order(&new_order).await?;
        tracing::info!(
            "-> Packages order {} created",
            new_order.courier.identifier
        );
        Ok(())
    }

    fn local_time(&self, instant: DateTime<Utc>) -> String {
        instant
            .with_timezone(&self.timezone)
            .naive_local()
            .format("%-d.%-m.%Y %H:%M")
            .to_string()
    }
}

#[async_trait]
impl<Tz> Job for ConfirmationSweep<Tz>
where
    Tz: TimeZone + Send + Sync,
    Tz::Offset: Send + Sync,
{
    fn name(&self) -> &'static str {
        "check-orders"
    }

    async fn execute(&self) -> Result<JobSummary> {
        let report = self.run_at(Utc::now()).await?;
        report.ensure_complete()?;
        Ok(JobSummary {
            attempted: report.total,
            handled: report.handled,
        })
    }
}
