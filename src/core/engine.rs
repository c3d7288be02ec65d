use crate::domain::ports::{Job, JobSummary};
use crate::utils::error::Result;
use crate::utils::monitor::JobMonitor;

pub struct JobEngine<J: Job> {
    job: J,
    monitor: JobMonitor,
}

impl<J: Job> JobEngine<J> {
    pub fn new(job: J) -> Self {
        Self::new_with_monitoring(job, false)
    }

    pub fn new_with_monitoring(job: J, monitor_enabled: bool) -> Self {
        Self {
            job,
            monitor: JobMonitor::new(monitor_enabled),
        }
    }

    pub async fn run(&self) -> Result<JobSummary> {
        let name = self.job.name();
        tracing::info!("🚀 Starting {} job", name);
        self.monitor.log_phase(name, "start");

        let result = self.job.execute().await;

        self.monitor.log_final(name);
        match &result {
            Ok(summary) => tracing::info!(
                "Script finished, {}/{} item(s) have been handled",
                summary.handled,
                summary.attempted
            ),
            Err(e) => tracing::error!("Script failed: {}", e),
        }
        result
    }
}
