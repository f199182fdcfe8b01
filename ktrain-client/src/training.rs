//! Training submission endpoint

use crate::DispatcherClient;
use crate::error::Result;
use ktrain_core::dto::training::{DispatchResponse, SubmitTraining};

impl DispatcherClient {
    /// Submit a training run
    ///
    /// Identical submissions for the same project resolve to the same
    /// workload; see [`DispatchResponse::disposition`].
    pub async fn submit_training(&self, req: &SubmitTraining) -> Result<DispatchResponse> {
        let request = self.client.post(self.url("/train")).json(req);
        let response = self.authorize(request).send().await?;

        self.handle_response(response).await
    }
}
