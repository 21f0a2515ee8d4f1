#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration as StdDuration;

    use chrono::Duration;

    use crate::auth0::dto::TokenRequest;
    use crate::auth0::generator::TokenGenerator;
    use crate::auth0::jwks::JwksCache;
    use crate::auth0::validator::TokenValidator;
    use crate::error::TokenError;
    use crate::helpers::time::now_utc;
    use crate::notify::Alerter;
    use crate::store::token_store::TokenStore;
    use crate::tests::common::*;
    use crate::transport::ReqwestHttpClient;
    use crate::utils::background::BackgroundTasks;

    struct Harness {
        generator: TokenGenerator,
        store: TokenStore,
        documents: Arc<MemoryDocumentStore>,
        notifier: Arc<RecordingNotifier>,
        background: BackgroundTasks,
    }

    fn harness(url: &str) -> Harness {
        let documents = Arc::new(MemoryDocumentStore::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let background = BackgroundTasks::new();
        let http = Arc::new(ReqwestHttpClient::new(StdDuration::from_secs(5)).unwrap());
        let store = TokenStore::new(documents.clone(), "test", no_retry());
        let alerter = Alerter::new(notifier.clone(), background.clone(), "insights", "test");
        let jwks = JwksCache::new(http.clone(), store.clone(), format!("{}/oauth/.well-known/jwks.json", url));
        let generator = TokenGenerator::new(
            http,
            store.clone(),
            TokenValidator::new(Arc::new(jwks)),
            alerter,
            background.clone(),
            format!("{}/oauth/token", url),
            TokenRequest::from(&auth0_config(url)),
        );
        Harness { generator, store, documents, notifier, background }
    }

    #[tokio::test]
    async fn second_generation_within_the_hour_is_rejected_locally() {
        let provider = ProviderFake::new(TokenReply::Token(signed_token(86400)));
        let h = harness(&provider.start().await);

        h.generator.generate_token().await.unwrap();
        h.background.drain().await;

        let err = h.generator.generate_token().await.unwrap_err();
        assert!(matches!(err, TokenError::RateLimited { .. }));
        assert_eq!(provider.token_calls(), 1);
    }

    #[tokio::test]
    async fn marker_ten_minutes_old_blocks_generation() {
        let provider = ProviderFake::new(TokenReply::Token(signed_token(86400)));
        let h = harness(&provider.start().await);
        let last = now_utc() - Duration::minutes(10);
        h.store.save_last_request(last).await.unwrap();

        match h.generator.generate_token().await {
            Err(TokenError::RateLimited { last_request }) => assert_eq!(last_request, last),
            other => panic!("expected rate limit, got {other:?}"),
        }
        assert_eq!(provider.token_calls(), 0);
    }

    #[tokio::test]
    async fn marker_older_than_an_hour_allows_generation_and_is_renewed() {
        let provider = ProviderFake::new(TokenReply::Token(signed_token(86400)));
        let h = harness(&provider.start().await);
        let old = now_utc() - Duration::hours(2);
        h.store.save_last_request(old).await.unwrap();

        let token = h.generator.generate_token().await.unwrap();
        h.background.drain().await;

        assert!(!token.is_empty());
        let renewed = h.store.last_request().await.unwrap().unwrap();
        assert!(renewed > old);
    }

    #[tokio::test]
    async fn posts_client_credentials() {
        let provider = ProviderFake::new(TokenReply::Token(signed_token(86400)));
        let h = harness(&provider.start().await);
        h.generator.generate_token().await.unwrap();

        assert_eq!(
            provider.last_token_request().unwrap(),
            json!({
                "grant_type": "client_credentials",
                "client_id": "client-id",
                "client_secret": "client-secret",
                "audience": "https://api.local"
            })
        );
    }

    #[tokio::test]
    async fn provider_error_aborts_but_still_records_marker() {
        let provider = ProviderFake::new(TokenReply::Status(401));
        let h = harness(&provider.start().await);

        let err = h.generator.generate_token().await.unwrap_err();
        h.background.drain().await;

        assert!(matches!(err, TokenError::Transport(ref message) if message.contains("401")));
        assert!(h.store.last_request().await.unwrap().is_some());
        assert_eq!(provider.jwks_calls(), 0);
        let alerts = h.notifier.messages();
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].starts_with("insights-test: error generating a new token"));
    }

    #[tokio::test]
    async fn unreachable_provider_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let h = harness(&format!("http://{}", addr));

        let err = h.generator.generate_token().await.unwrap_err();
        h.background.drain().await;

        assert!(matches!(err, TokenError::Transport(_)));
        assert!(h.documents.document("last-auth0-token-request-test", "last-token-date").is_some());
    }

    #[tokio::test]
    async fn expired_generated_token_is_not_returned() {
        let provider = ProviderFake::new(TokenReply::Token(signed_token(-30)));
        let h = harness(&provider.start().await);

        let err = h.generator.generate_token().await.unwrap_err();
        h.background.drain().await;

        assert!(matches!(err, TokenError::InvalidGeneratedToken));
        assert_eq!(err.to_string(), "created token is not valid");
        assert!(h.notifier.messages()[0].contains("created token is not valid"));
    }

    #[tokio::test]
    async fn malformed_provider_body_is_unmarshal_error() {
        let provider = ProviderFake::new(TokenReply::Body("<html>gateway</html>".to_owned()));
        let h = harness(&provider.start().await);

        let err = h.generator.generate_token().await.unwrap_err();
        assert!(matches!(err, TokenError::Unmarshal(_)));
    }

    #[tokio::test]
    async fn unreadable_marker_is_propagated_without_calling_provider() {
        let provider = ProviderFake::new(TokenReply::Token(signed_token(86400)));
        let h = harness(&provider.start().await);
        h.documents.fail_index("last-auth0-token-request-test");

        let err = h.generator.generate_token().await.unwrap_err();
        assert!(matches!(err, TokenError::Store(_)));
        assert_eq!(provider.token_calls(), 0);
    }
}
