use crate::domain::model::CourierToken;
use crate::domain::ports::Courier;
use crate::utils::error::{DispatchError, Result};
use tokio::sync::OnceCell;

/// Courier token fetched lazily, at most once per job run.
///
/// A failed fetch is not cached, the next caller tries again.
#[derive(Debug, Default)]
pub struct TokenCache {
    token: OnceCell<CourierToken>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, courier: &dyn Courier) -> Result<&CourierToken> {
        self.token
            .get_or_try_init(|| async {
                tracing::info!("Getting temporary DODO oauth token");
                let token = courier.fetch_token().await?;
                if !token.is_bearer() {
                    return Err(DispatchError::SchemaError {
                        record_id: "oauth_token".to_string(),
                        message: format!("unexpected token type '{}'", token.token_type),
                    });
                }
                tracing::info!(
                    "Successfully received temporary DODO oauth token (expires in {}s)",
                    token.expires_in
                );
                Ok(token)
            })
            .await
    }
}
