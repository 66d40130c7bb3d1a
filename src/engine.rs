use crate::application::Collaborators;
use crate::application::execution::Executor;
use crate::application::reminder::ReminderNotifier;
use crate::application::scheduler::SchedulerLoop;
use crate::application::service::ScheduledOrderService;
use crate::config::EngineConfig;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Wires the service and both periodic drivers to one set of collaborators.
pub struct SchedulingEngine {
    pub service: ScheduledOrderService,
    pub scheduler: Arc<SchedulerLoop>,
    pub reminders: Arc<ReminderNotifier>,
}

impl SchedulingEngine {
    pub fn new(collaborators: Collaborators, config: EngineConfig) -> Self {
        let executor = Arc::new(Executor::new(&collaborators, &config));
        let scheduler = Arc::new(SchedulerLoop::new(
            collaborators.store.clone(),
            collaborators.clock.clone(),
            executor.clone(),
            &config,
        ));
        let reminders = Arc::new(ReminderNotifier::new(
            collaborators.store.clone(),
            collaborators.notifier.clone(),
            collaborators.clock.clone(),
            &config,
        ));
        let service = ScheduledOrderService::new(
            collaborators.store,
            collaborators.addresses,
            collaborators.clock,
            executor,
            config,
        );

        Self {
            service,
            scheduler,
            reminders,
        }
    }

    /// Runs the scheduler loop and the reminder notifier on their own tasks
    /// until `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        let scheduler = self.scheduler.clone();
        let scheduler_shutdown = shutdown.clone();
        let scheduler_task = tokio::spawn(async move { scheduler.run(scheduler_shutdown).await });

        let reminders = self.reminders.clone();
        let reminder_task = tokio::spawn(async move { reminders.run(shutdown).await });

        let (scheduler_result, reminder_result) = tokio::join!(scheduler_task, reminder_task);
        if let Err(e) = scheduler_result {
            tracing::error!("scheduler task ended abnormally: {}", e);
        }
        if let Err(e) = reminder_result {
            tracing::error!("reminder task ended abnormally: {}", e);
        }
    }
}
