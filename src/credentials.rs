//! Optional check that a paid credential is selected before high-quality synthesis.

use anyhow::Result;
use async_trait::async_trait;
use tracing::warn;

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn has_credential(&self) -> Result<bool>;
    async fn prompt_for_credential(&self) -> Result<()>;
}

/// Credential presence as configured through the environment. There is no
/// interactive selector on the server, so prompting only logs.
pub struct EnvCredentials {
    has_key: bool,
}

impl EnvCredentials {
    pub fn new(has_key: bool) -> Self {
        Self { has_key }
    }
}

#[async_trait]
impl CredentialProvider for EnvCredentials {
    async fn has_credential(&self) -> Result<bool> {
        Ok(self.has_key)
    }

    async fn prompt_for_credential(&self) -> Result<()> {
        warn!("High quality requested without GEMINI_API_KEY; set one linked to a billing project");
        Ok(())
    }
}

/// Always reports a credential.
#[cfg(test)]
pub struct NoCredentialCheck;

#[cfg(test)]
#[async_trait]
impl CredentialProvider for NoCredentialCheck {
    async fn has_credential(&self) -> Result<bool> {
        Ok(true)
    }

    async fn prompt_for_credential(&self) -> Result<()> {
        Ok(())
    }
}

/// Runs the advisory pre-check. Failures are logged and never block synthesis.
pub async fn ensure_credential(provider: &dyn CredentialProvider) {
    match provider.has_credential().await {
        Ok(true) => {}
        Ok(false) => {
            if let Err(e) = provider.prompt_for_credential().await {
                warn!("API key selection prompt failed: {e:#}");
            }
        }
        Err(e) => warn!("API key selection check failed: {e:#}"),
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FlakyCredentials;
    use super::*;

    #[tokio::test]
    async fn missing_credential_triggers_prompt() {
        let provider = FlakyCredentials::new(false);
        ensure_credential(&provider).await;
        assert_eq!(provider.prompt_count(), 1);
    }

    #[tokio::test]
    async fn failing_check_is_swallowed() {
        let provider = FlakyCredentials::new(true);
        ensure_credential(&provider).await;
        assert_eq!(provider.prompt_count(), 0);
        ensure_credential(&NoCredentialCheck).await;
    }
}
