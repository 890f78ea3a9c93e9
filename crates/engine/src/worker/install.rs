//! Install: populate the static store from the manifest, all or nothing.

use futures_util::future::try_join_all;

use super::Engine;
use crate::fetch::resolve;
use crate::{Effect, Outcome};
use swcache_core::{Error, Request, Response, WorkerState};

impl Engine {
    pub(super) async fn install(&self) -> Result<Outcome, Error> {
        let state = self.state().await;
        if state != WorkerState::Installing {
            return Err(Error::InvalidState(format!("install while {state}")));
        }

        match self.fetch_manifest().await {
            Ok(entries) => {
                let count = entries.len();
                let stored = self.db.put_entries(&self.epoch.static_store(), entries).await;
                if let Err(e) = stored {
                    return self.fail_install(e).await;
                }
                self.transition(WorkerState::Installed).await?;
                tracing::info!(version = self.epoch.version(), entries = count, "installed");
                Ok(Outcome::effects(vec![Effect::SkipWaiting]))
            }
            Err(e) => self.fail_install(e).await,
        }
    }

    /// Fetch every manifest entry; the first failure aborts the lot.
    ///
    /// Non-2xx responses count as failures.
    pub(super) async fn fetch_manifest(&self) -> Result<Vec<(Request, Response)>, Error> {
        let requests = self
            .config
            .precache
            .iter()
            .map(|path| resolve(self.routes.origin(), path).map(Request::get).map_err(Error::from))
            .collect::<Result<Vec<_>, Error>>()?;

        try_join_all(requests.into_iter().map(|request| async move {
            let response = self.fetch_network(&request).await?;
            if !response.is_success() {
                tracing::warn!(url = %request.url, status = response.status, "manifest entry not available");
                return Err(Error::HttpStatus(response.status));
            }
            Ok((request, response))
        }))
        .await
    }

    async fn fail_install(&self, cause: Error) -> Result<Outcome, Error> {
        tracing::error!(version = self.epoch.version(), error = %cause, "install failed");
        self.retire().await;
        Err(Error::InstallFailed(cause.to_string()))
    }
}
