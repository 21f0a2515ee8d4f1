use std::fmt::Display;
use std::sync::Arc;

use tracing::warn;

use crate::notify::slack::Notifier;
use crate::utils::background::BackgroundTasks;

/// Best-effort operational alerts, dispatched in the background and never awaited.
#[derive(Clone)]
pub struct Alerter {
    notifier: Arc<dyn Notifier>,
    background: BackgroundTasks,
    app_name: String,
    environment: String,
}

impl Alerter {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        background: BackgroundTasks,
        app_name: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            notifier,
            background,
            app_name: app_name.into(),
            environment: environment.into(),
        }
    }

    pub fn message(&self, context: &str, err: &dyn Display) -> String {
        format!("{}-{}: {}\n {}", self.app_name, self.environment, context, err)
    }

    pub fn alert(&self, context: &str, err: &dyn Display) {
        let text = self.message(context, err);
        let notifier = self.notifier.clone();
        self.background.spawn("alert", async move {
            if let Err(e) = notifier.send_text(&text).await {
                warn!(error = %e, "failed to deliver alert");
            }
        });
    }
}
