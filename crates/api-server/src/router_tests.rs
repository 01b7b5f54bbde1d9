#[cfg(test)]
mod tests {
    use super::super::*;
    use analysis_core::{Bar, PriceHistory, PriceHistoryProvider, PriceSource};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::{Duration, NaiveDate};
    use forecast_engine::{ForecastConfig, LstmConfig};
    use market_data::SeriesFetcher;
    use prediction_orchestrator::PredictionSettings;
    use sentiment_analysis::SentimentScorer;
    use serde_json::Value;
    use tower::ServiceExt;

    struct FlatProvider {
        failing: Vec<&'static str>,
    }

    #[async_trait]
    impl PriceHistoryProvider for FlatProvider {
        fn source(&self) -> PriceSource {
            PriceSource::Yahoo
        }

        async fn daily_bars(
            &self,
            symbol: &str,
            _from: NaiveDate,
            _to: NaiveDate,
        ) -> Result<PriceHistory, AnalysisError> {
            if self.failing.iter().any(|s| *s == symbol) {
                return Err(AnalysisError::NotFound(format!("No data found for symbol {}", symbol)));
            }
            let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
            let bars = (0..90)
                .map(|i| Bar {
                    date: start + Duration::days(i),
                    open: 175.0,
                    high: 175.0,
                    low: 175.0,
                    close: 175.0,
                    volume: 50_000_000.0,
                })
                .collect();
            Ok(PriceHistory {
                bars,
                currency: Some("USD".to_string()),
            })
        }
    }

    fn app(failing: Vec<&'static str>) -> Router {
        let fetcher = SeriesFetcher::new(PriceSource::Yahoo)
            .with_provider(Arc::new(FlatProvider { failing }));
        let settings = PredictionSettings {
            forecast: ForecastConfig {
                sequence: LstmConfig {
                    hidden: 8,
                    dense_units: 4,
                    epochs: 2,
                    ..LstmConfig::default()
                },
                ..ForecastConfig::default()
            },
            ..PredictionSettings::default()
        };
        let service = PredictionService::new(fetcher, SentimentScorer::new(None), settings);
        build_router(AppState::new(service), None)
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(app(vec![]), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "active");
        assert_eq!(body["service"], "FinPredict API");
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_unknown_route_is_json_404() {
        let (status, body) = send(app(vec![]), get("/api/nothing-here")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Endpoint not found");
    }

    #[tokio::test]
    async fn test_prediction_request_validation() {
        let cases = [
            ("", "Request body is required"),
            (r#"{"market":"us"}"#, "Symbol is required"),
            (r#"{"symbol":"AAPL","market":"mars"}"#, "Invalid market. Use: us, indian, crypto"),
            (r#"{"symbol":"AAPL","period":"2w"}"#, "Invalid period. Use: 1d, 7d, 30d, 90d"),
        ];
        for (payload, message) in cases {
            let (status, body) = send(app(vec![]), post_json("/api/predictions", payload)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "payload {:?}", payload);
            assert_eq!(body["error"], message);
        }
    }

    #[tokio::test]
    async fn test_prediction_for_flat_series() {
        let (status, body) = send(
            app(vec![]),
            post_json("/api/predictions", r#"{"symbol":"aapl","market":"us","period":"7d"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["symbol"], "AAPL");
        assert_eq!(body["name"], "Apple Inc.");
        assert_eq!(body["currentPrice"], 175.0);
        assert_eq!(body["trend"], "neutral");
        assert_eq!(body["market"], "us");
        assert_eq!(body["timeframe"], "7 days");
        let confidence = body["confidence"].as_u64().unwrap();
        assert!((75..=95).contains(&confidence));
        assert_eq!(body["accuracy"], body["confidence"]);
        assert_eq!(body["forecast_path"].as_array().unwrap().len(), 7);
    }

    #[tokio::test]
    async fn test_failed_prediction_is_400() {
        let (status, body) = send(
            app(vec!["NOPE"]),
            post_json("/api/predictions", r#"{"symbol":"NOPE"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["error"],
            "Could not generate prediction for NOPE. Please check the symbol and try again."
        );
    }

    #[tokio::test]
    async fn test_market_batch() {
        let (status, body) = send(app(vec!["ETH-USD"]), get("/api/predictions/crypto?period=1d")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["market"], "crypto");
        assert_eq!(body["count"], 4);
        assert_eq!(body["predictions"].as_array().unwrap().len(), 4);

        let (status, body) = send(app(vec![]), get("/api/predictions/mars")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid market");
    }

    #[tokio::test]
    async fn test_search() {
        let (status, body) = send(app(vec![]), get("/api/search/tcs.ns")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["found"], true);
        assert_eq!(body["market"], "indian");
        assert_eq!(body["name"], "Tata Consultancy Services Ltd.");
        assert_eq!(body["currency"], "USD");

        let (status, body) = send(app(vec!["ZZZZ"]), get("/api/search/zzzz?market=us")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["found"], false);
        assert_eq!(body["symbol"], "ZZZZ");
        assert_eq!(body["error"], "Symbol not found in any market");
    }

    #[tokio::test]
    async fn test_stock_data_and_indicators() {
        let (status, body) = send(app(vec![]), get("/api/stock-data/msft?days=60")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["symbol"], "MSFT");
        assert_eq!(body["currentPrice"], 175.0);
        assert_eq!(body["historical_data"].as_array().unwrap().len(), 30);
        assert!(body["technical_indicators"]["sma_20"].is_number());

        let (status, body) = send(app(vec![]), get("/api/stock-data/msft?source=bloomberg")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, body) = send(app(vec![]), get("/api/technical-indicators/msft?period=3m")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["period"], "3m");
        assert_eq!(body["indicators"]["bb_middle"], 175.0);

        let (status, body) = send(app(vec!["BAD"]), get("/api/technical-indicators/bad")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Could not calculate indicators for BAD");
    }

    #[tokio::test]
    async fn test_stock_data_days_out_of_range_is_400() {
        let (status, body) = send(app(vec![]), get("/api/stock-data/msft?days=200000000")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "days out of range");
    }

    #[tokio::test]
    async fn test_train_stub() {
        let (status, body) = send(app(vec![]), post_json("/api/models/train", "")).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["status"], "training_initiated");
        assert_eq!(body["market"], Value::Null);

        let (status, body) = send(
            app(vec![]),
            post_json("/api/models/train", r#"{"market":"crypto","force":true}"#),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["market"], "crypto");
        assert_eq!(body["message"], "Training initiated for crypto");

        let (status, _) = send(app(vec![]), post_json("/api/models/train", r#"{"market":"mars"}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_request_id_is_echoed_or_generated() {
        let request = Request::builder()
            .uri("/health")
            .header("x-request-id", "abc-123")
            .body(Body::empty())
            .unwrap();
        let response = app(vec![]).oneshot(request).await.unwrap();
        assert_eq!(response.headers()["x-request-id"], "abc-123");

        let response = app(vec![]).oneshot(get("/health")).await.unwrap();
        let generated = response.headers()["x-request-id"].to_str().unwrap();
        assert_eq!(generated.len(), 36);
    }
}
