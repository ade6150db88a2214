//! Token-aware execution of remote calls.

use std::future::Future;
use std::sync::Arc;

use log::info;

use crate::error::{Error, Result};

use super::{AccessToken, TokenProvider};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = false;

use crate::log_info;

/// Runs a remote call with the current bearer token and recovers from an
/// expired token exactly once: invalidate, re-fetch, retry. The second
/// failure propagates unchanged, so an always-rejecting remote can never
/// loop. A missing token (`NotAuthenticated`) is fatal immediately.
#[derive(Clone)]
pub struct AuthenticatedExecutor {
    provider: Arc<dyn TokenProvider>,
}

impl AuthenticatedExecutor {
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self { provider }
    }

    pub async fn execute<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: Fn(AccessToken) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let token = self.provider.current_access_token().await?;

        match op(token.clone()).await {
            Err(Error::AuthExpired { message }) => {
                info!("access token rejected, refreshing once: {message}");
                self.provider.invalidate(&token).await;
                let fresh = self.provider.current_access_token().await?;
                log_info!("retrying remote call with refreshed token");
                op(fresh).await
            }
            other => other,
        }
    }
}
