//! Workload endpoints

use crate::DispatcherClient;
use crate::error::Result;
use ktrain_core::domain::WorkloadRecord;
use ktrain_core::dto::workload::{CancelResponse, ResultResponse};

impl DispatcherClient {
    /// Get the current record of a workload
    pub async fn get_workload(&self, workload_id: &str) -> Result<WorkloadRecord> {
        let request = self.client.get(self.url(&format!("/workloads/{}", workload_id)));
        let response = self.authorize(request).send().await?;

        self.handle_response(response).await
    }

    /// Block until the workload is terminal or `timeout_secs` elapses
    ///
    /// Returns the record either way; check its phase to tell which.
    pub async fn wait(&self, workload_id: &str, timeout_secs: u64) -> Result<WorkloadRecord> {
        tracing::debug!("Waiting up to {}s for {}", timeout_secs, workload_id);

        let request = self
            .client
            .get(self.url(&format!("/workloads/{}/wait", workload_id)))
            .query(&[("timeout_secs", timeout_secs)]);
        let response = self.authorize(request).send().await?;

        self.handle_response(response).await
    }

    /// Cancel a pending or running workload
    ///
    /// # Returns
    /// `false` when the workload had already finished
    pub async fn cancel(&self, workload_id: &str) -> Result<bool> {
        let request = self
            .client
            .post(self.url(&format!("/workloads/{}/cancel", workload_id)));
        let response = self.authorize(request).send().await?;

        let body: CancelResponse = self.handle_response(response).await?;
        Ok(body.cancelled)
    }

    /// Where a succeeded workload wrote its model
    ///
    /// The dispatcher answers 404 until the workload has succeeded; see
    /// [`crate::ClientError::is_not_found`].
    pub async fn result(&self, workload_id: &str) -> Result<ResultResponse> {
        let request = self
            .client
            .get(self.url(&format!("/workloads/{}/result", workload_id)));
        let response = self.authorize(request).send().await?;

        self.handle_response(response).await
    }

    /// Fetch the training pod's log; empty until the pod has started
    pub async fn logs(&self, workload_id: &str) -> Result<String> {
        let request = self
            .client
            .get(self.url(&format!("/workloads/{}/logs", workload_id)));
        let response = self.authorize(request).send().await?;

        self.handle_text_response(response).await
    }
}
