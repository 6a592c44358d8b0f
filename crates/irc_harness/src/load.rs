use log::{error, info, warn};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

use crate::actions::ActionCatalog;
use crate::config::{Config, LoadConfig};
use crate::controller::ServerController;
use crate::sample::SampleResult;
use crate::virtual_user::VirtualUser;

#[derive(Debug, Clone, PartialEq)]
pub struct LoadPlan {
    pub users: usize,
    pub samples_per_user: usize,
}

impl From<&LoadConfig> for LoadPlan {
    fn from(config: &LoadConfig) -> Self {
        LoadPlan {
            users: config.users,
            samples_per_user: config.samples,
        }
    }
}

/// Runs every virtual user concurrently, each one sampling sequentially, then tears
/// them down and clears whatever waiters are left on the server.
pub async fn run_load(controller: &ServerController, config: &Config, plan: &LoadPlan) -> LoadReport {
    let catalog = Arc::new(ActionCatalog::from_config(&config.actions));
    info!(
        "Starting load: {} virtual users x {} samples, {} action lines enabled",
        plan.users,
        plan.samples_per_user,
        catalog.line_count()
    );

    let mut tasks = JoinSet::new();
    for ordinal in 0..plan.users {
        let Ok(ordinal) = u32::try_from(ordinal) else {
            warn!("Virtual user count capped at {ordinal}");
            break;
        };
        let mut user = VirtualUser::new(
            controller.clone(),
            config.bot.clone(),
            Arc::clone(&catalog),
            ordinal,
        );
        let samples = plan.samples_per_user;
        tasks.spawn(async move {
            let mut results = Vec::with_capacity(samples);
            for _ in 0..samples {
                results.push(user.sample().await);
            }
            user.teardown().await;
            results
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(user_results) => results.extend(user_results),
            Err(e) => error!("Virtual user task failed: {e}"),
        }
    }

    if let Some(server) = controller.current().await {
        let leftover = server.correlation().clear();
        if leftover > 0 {
            warn!("{leftover} waiters left after the run were dropped");
        }
    }
    LoadReport::from_results(&results)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub min_latency: Option<Duration>,
    pub mean_latency: Option<Duration>,
    pub max_latency: Option<Duration>,
    /// Failure count by error message.
    pub errors: BTreeMap<String, usize>,
}

impl LoadReport {
    pub fn from_results(results: &[SampleResult]) -> Self {
        let mut report = LoadReport {
            total: results.len(),
            ..LoadReport::default()
        };
        let mut latencies = Vec::new();
        for result in results {
            if result.success {
                report.succeeded += 1;
                latencies.push(result.elapsed);
            } else {
                report.failed += 1;
                let message = result.error_text.clone().unwrap_or_default();
                *report.errors.entry(message).or_default() += 1;
            }
        }
        report.min_latency = latencies.iter().min().copied();
        report.max_latency = latencies.iter().max().copied();
        if !latencies.is_empty() {
            let sum: Duration = latencies.iter().sum();
            report.mean_latency = Some(sum / latencies.len() as u32);
        }
        report
    }
}

impl Display for LoadReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "samples: {} ok: {} failed: {}",
            self.total, self.succeeded, self.failed
        )?;
        if let (Some(min), Some(mean), Some(max)) =
            (self.min_latency, self.mean_latency, self.max_latency)
        {
            writeln!(f, "latency min/mean/max: {min:?} / {mean:?} / {max:?}")?;
        }
        for (error, count) in &self.errors {
            writeln!(f, "  {count} x {error}")?;
        }
        Ok(())
    }
}
