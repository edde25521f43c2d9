use std::path::Path;

use log::{info, warn};

use crate::{
    Analyzer,
    app_state::{AppState, Phase},
    camera::{CameraSession, MediaDevices},
    error::SubmitError,
    image_processor::{ImageAcquirer, ImagePayload, Preview},
};

/// Ties image acquisition, analysis and [`AppState`] together.
///
/// Dropping a submission future cancels its request; call
/// [`MealApp::abandon`] afterwards so the state leaves `Analyzing`.
pub struct MealApp<A: Analyzer> {
    analyzer: A,
    acquirer: ImageAcquirer,
    state: AppState,
}

impl<A: Analyzer> MealApp<A> {
    pub fn new(analyzer: A) -> Self {
        Self::with_acquirer(analyzer, ImageAcquirer::default())
    }

    pub fn with_acquirer(analyzer: A, acquirer: ImageAcquirer) -> Self {
        Self {
            analyzer,
            acquirer,
            state: AppState::new(),
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn reset(&mut self) {
        self.state.reset();
    }

    pub fn abandon(&mut self) {
        self.state.abandon();
    }

    /// Upload path. Rejected files leave the state untouched.
    pub async fn submit_path(&mut self, path: impl AsRef<Path>) -> Result<Phase, SubmitError> {
        let payload = self.acquirer.acquire_path(path).await?;
        self.submit_payload(payload).await
    }

    /// Capture path. Camera failures stay local to the session and are
    /// returned without touching the application state.
    pub async fn capture_and_submit<D: MediaDevices>(
        &mut self,
        session: &mut CameraSession<D>,
    ) -> Result<Phase, SubmitError> {
        let payload = session.capture()?;
        self.submit_payload(payload).await
    }

    /// Runs preview generation and analysis side by side, applying each to
    /// the state as it finishes.
    pub async fn submit_payload(&mut self, payload: ImagePayload) -> Result<Phase, SubmitError> {
        let token = self.state.submit()?;
        info!("Submitting {} as {:?}", payload.file_name(), token);

        let preview_source = payload.clone();
        let mut preview =
            tokio::task::spawn_blocking(move || Preview::from_payload(&preview_source));
        let mut preview_pending = true;

        let analysis = self.analyzer.analyze(payload);
        tokio::pin!(analysis);

        loop {
            tokio::select! {
                generated = &mut preview, if preview_pending => {
                    preview_pending = false;
                    match generated {
                        Ok(image) => {
                            self.state.set_preview(token, image);
                        }
                        Err(e) => warn!("Preview generation failed: {}", e),
                    }
                }
                outcome = &mut analysis => {
                    self.state.complete(token, outcome);
                    break;
                }
            }
        }

        if preview_pending {
            match preview.await {
                Ok(image) => {
                    self.state.set_preview(token, image);
                }
                Err(e) => warn!("Preview generation failed: {}", e),
            }
        }

        Ok(self.state.phase())
    }
}
