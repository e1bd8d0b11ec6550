use crate::api::models::*;
use crate::sentiment;
use crate::storage::Review;
use axum::{
    Json,
    extract::{Query, State, rejection::JsonRejection},
    http::StatusCode,
};
use chrono::Utc;
use tracing::info;

pub async fn create_review_handler(
    State(state): State<AppState>,
    body: Result<Json<CreateReviewRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ReviewResponse>), AppError> {
    // Absent body, malformed JSON and a missing `text` key all surface
    // as the same client error.
    let Json(request) = body
        .map_err(|_| AppError::BadRequest("Missing 'text' in request body".to_string()))?;

    let sentiment = sentiment::classify(&request.text);
    let created_at = Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string();

    info!(sentiment = %sentiment, "Adding review");

    let id = state
        .store
        .insert(&request.text, sentiment, &created_at)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to store review: {}", e)))?;

    info!(id, "Review stored");

    Ok((
        StatusCode::CREATED,
        Json(ReviewResponse {
            id,
            text: request.text,
            sentiment: sentiment.as_str().to_string(),
            created_at,
        }),
    ))
}

pub async fn list_reviews_handler(
    State(state): State<AppState>,
    Query(params): Query<ListReviewsParams>,
) -> Result<Json<Vec<Review>>, AppError> {
    let sentiment = params
        .sentiment
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            AppError::BadRequest("Query parameter 'sentiment' is required".to_string())
        })?;

    let reviews = state
        .store
        .list_by_sentiment(&sentiment)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to read reviews: {}", e)))?;

    info!(sentiment = %sentiment, found = reviews.len(), "Listed reviews");

    Ok(Json(reviews))
}

#[cfg(test)]
mod tests {
    use crate::api::AppState;
    use crate::storage::ReviewStore;
    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn test_app() -> Router {
        let store = Arc::new(ReviewStore::in_memory().unwrap());
        store.create_schema().await.unwrap();
        crate::api::review::routes().with_state(AppState { store })
    }

    fn post_review_request(body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/reviews")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    fn get_reviews_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn post_classifies_with_positive_precedence() {
        let app = test_app().await;

        let response = app
            .oneshot(post_review_request(
                json!({"text": "Это просто ужасно, но мне нравится"}).to_string(),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["sentiment"], "positive");
        assert_eq!(body["text"], "Это просто ужасно, но мне нравится");
    }

    #[tokio::test]
    async fn post_classifies_negative() {
        let app = test_app().await;

        let response = app
            .oneshot(post_review_request(
                json!({"text": "Все плохо работает"}).to_string(),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["sentiment"], "negative");
    }

    #[tokio::test]
    async fn post_classifies_neutral() {
        let app = test_app().await;

        let response = app
            .oneshot(post_review_request(json!({"text": "Обычный день"}).to_string()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["sentiment"], "neutral");
        assert!(body["created_at"].as_str().is_some_and(|s| !s.is_empty()));
    }

    #[tokio::test]
    async fn post_without_text_key_is_rejected() {
        let app = test_app().await;

        let response = app
            .oneshot(post_review_request(json!({}).to_string()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Missing 'text' in request body");
    }

    #[tokio::test]
    async fn post_with_malformed_json_is_rejected() {
        let app = test_app().await;

        let response = app
            .oneshot(post_review_request("not json at all".to_string()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Missing 'text' in request body");
    }

    #[tokio::test]
    async fn get_requires_sentiment_parameter() {
        let app = test_app().await;

        let response = app
            .clone()
            .oneshot(get_reviews_request("/reviews"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Query parameter 'sentiment' is required");

        // An empty value is treated the same as an absent parameter.
        let response = app
            .oneshot(get_reviews_request("/reviews?sentiment="))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn get_with_no_matches_returns_empty_array() {
        let app = test_app().await;

        let response = app
            .oneshot(get_reviews_request("/reviews?sentiment=positive"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn round_trip_preserves_review_fields() {
        let app = test_app().await;

        let response = app
            .clone()
            .oneshot(post_review_request(
                json!({"text": "Телефон супер"}).to_string(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;

        let response = app
            .oneshot(get_reviews_request("/reviews?sentiment=positive"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let listed = body_json(response).await;

        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(listed[0], created);
    }

    #[tokio::test]
    async fn successive_posts_get_increasing_ids() {
        let app = test_app().await;
        let mut last_id = 0;

        for text in ["хорошо", "отлично", "супер"] {
            let response = app
                .clone()
                .oneshot(post_review_request(json!({"text": text}).to_string()))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);

            let id = body_json(response).await["id"].as_i64().unwrap();
            assert!(id > last_id);
            last_id = id;
        }
    }

    #[tokio::test]
    async fn empty_text_is_accepted() {
        let app = test_app().await;

        let response = app
            .oneshot(post_review_request(json!({"text": ""}).to_string()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["sentiment"], "neutral");
    }
}
