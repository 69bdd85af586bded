use super::GatewayError;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Runs `request` until it finishes, `limit` elapses or `token` fires.
pub async fn with_deadline<T, F>(
    token: &CancellationToken,
    limit: Duration,
    request: F,
) -> Result<T, GatewayError>
where
    F: Future<Output = Result<T, GatewayError>>,
{
    if token.is_cancelled() {
        return Err(GatewayError::Cancelled);
    }

    tokio::select! {
        _ = token.cancelled() => Err(GatewayError::Cancelled),
        outcome = tokio::time::timeout(limit, request) => {
            outcome.unwrap_or(Err(GatewayError::Timeout))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_times_out_hung_request() {
        let token = CancellationToken::new();
        let result: Result<(), _> = with_deadline(&token, Duration::from_secs(5), async {
            std::future::pending::<Result<(), GatewayError>>().await
        })
        .await;
        assert_eq!(result, Err(GatewayError::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_pending_request() {
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let result: Result<(), _> = with_deadline(&token, Duration::from_secs(60), async {
            std::future::pending::<Result<(), GatewayError>>().await
        })
        .await;
        assert_eq!(result, Err(GatewayError::Cancelled));
    }

    #[tokio::test]
    async fn test_cancelled_token_skips_request() {
        let token = CancellationToken::new();
        token.cancel();
        let mut polled = false;
        let result: Result<(), _> = with_deadline(&token, Duration::from_secs(1), async {
            polled = true;
            Ok(())
        })
        .await;
        assert_eq!(result, Err(GatewayError::Cancelled));
        assert!(!polled);
    }

    #[tokio::test]
    async fn test_completed_request_passes_through() {
        let token = CancellationToken::new();
        let result = with_deadline(&token, Duration::from_secs(1), async { Ok(7u8) }).await;
        assert_eq!(result, Ok(7));
    }
}
