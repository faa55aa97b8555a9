//! Router tests against mocked repositories

use std::sync::Arc;

use axum::{
    body::Body,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
        Method, Request, StatusCode,
    },
    response::Response,
    Router,
};
use chrono::{Duration, Local, NaiveDate};
use http_body_util::BodyExt;
use tower::ServiceExt;
use uuid::Uuid;

use super::create_router;
use crate::{
    config::AppConfig,
    error::AppError,
    models::{
        author::Author,
        book::{BookFilter, BookSummary},
        book_instance::{BookInstance, LoanStatus},
        user::{User, UserClaims},
    },
    repository::mock::Mocks,
    services::Services,
    AppState,
};

fn app_with(mocks: Mocks, config: AppConfig) -> Router {
    let services = Services::new(mocks.into_repository(), &config);
    create_router(AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    })
}

fn app(mocks: Mocks) -> Router {
    app_with(mocks, AppConfig::default())
}

fn token(is_librarian: bool) -> String {
    let user = User {
        id: if is_librarian { 1 } else { 2 },
        login: if is_librarian { "librarian" } else { "reader" }.to_string(),
        password: String::new(),
        first_name: None,
        last_name: None,
        email: None,
        is_librarian,
        created_at: None,
    };
    UserClaims::for_user(&user, 1)
        .create_token(&AppConfig::default().auth.jwt_secret)
        .unwrap()
}

fn get(uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

fn post_json(uri: &str, bearer: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {}", bearer))
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn on_loan(id: Uuid) -> BookInstance {
    BookInstance {
        id,
        book_id: 1,
        imprint: "Ace, 1990".to_string(),
        due_back: Some(today() + Duration::days(1)),
        status: LoanStatus::OnLoan,
        borrower_id: Some(2),
    }
}

fn count_mocks() -> Mocks {
    let mut mocks = Mocks::default();
    mocks.books.expect_count().returning(|| Ok(3));
    mocks.instances.expect_count().returning(|| Ok(5));
    mocks.instances.expect_count_by_status().returning(|_| Ok(2));
    mocks.authors.expect_count().returning(|| Ok(2));
    mocks.genres.expect_count().returning(|| Ok(4));
    mocks.books.expect_count_title_contains().returning(|_| Ok(1));
    mocks
}

#[tokio::test]
async fn test_home_counts_visits_per_session() {
    let app = app(count_mocks());

    let first = app.clone().oneshot(get("/api/v1/home", None)).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let cookie = first
        .headers()
        .get(SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
        .expect("session cookie");
    let body = json_body(first).await;
    assert_eq!(body["num_visits"], 1);
    assert_eq!(body["num_books"], 3);
    assert_eq!(body["num_instances_available"], 2);
    assert_eq!(body["num_books_word"]["word"], "Life");

    let second = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/home")
                .header(COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(json_body(second).await["num_visits"], 2);
}

#[tokio::test]
async fn test_renewal_forbidden_for_reader() {
    let mut mocks = Mocks::default();
    mocks.instances.expect_get_by_id().never();
    mocks.instances.expect_update_due_back().never();

    let response = app(mocks)
        .oneshot(post_json(
            &format!("/api/v1/instances/{}/renew", Uuid::new_v4()),
            &token(false),
            serde_json::json!({ "due_back": today().to_string() }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_renewal_requires_login() {
    let response = app(Mocks::default())
        .oneshot(get(
            &format!("/api/v1/instances/{}/renew", Uuid::new_v4()),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_renewal_out_of_range_is_reported_on_field() {
    let mut mocks = Mocks::default();
    mocks
        .instances
        .expect_get_by_id()
        .returning(|id| Ok(on_loan(id)));
    mocks.instances.expect_update_due_back().never();

    let too_late = today() + Duration::weeks(5);
    let response = app(mocks)
        .oneshot(post_json(
            &format!("/api/v1/instances/{}/renew", Uuid::new_v4()),
            &token(true),
            serde_json::json!({ "due_back": too_late.to_string() }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["field"], "due_back");
    assert_eq!(body["proposed"], (today() + Duration::weeks(3)).to_string());
}

#[tokio::test]
async fn test_renewal_redirects_to_active_loans() {
    let id = Uuid::new_v4();
    let wanted = today() + Duration::weeks(2);

    let mut mocks = Mocks::default();
    mocks
        .instances
        .expect_get_by_id()
        .returning(|id| Ok(on_loan(id)));
    mocks
        .instances
        .expect_update_due_back()
        .withf(move |i, d| *i == id && *d == wanted)
        .times(1)
        .returning(|id, d| {
            let mut copy = on_loan(id);
            copy.due_back = Some(d);
            Ok(copy)
        });

    let response = app(mocks)
        .oneshot(post_json(
            &format!("/api/v1/instances/{}/renew", id),
            &token(true),
            serde_json::json!({ "due_back": wanted.to_string() }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[LOCATION], "/api/v1/loans");
}

#[tokio::test]
async fn test_create_author_forbidden_for_reader() {
    let mut mocks = Mocks::default();
    mocks.authors.expect_create().never();

    let response = app(mocks)
        .oneshot(post_json(
            "/api/v1/authors/create",
            &token(false),
            serde_json::json!({ "first_name": "Ursula", "last_name": "Le Guin" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_create_author_redirects_to_list() {
    let mut mocks = Mocks::default();
    mocks.authors.expect_create().times(1).returning(|form| {
        Ok(Author {
            id: 12,
            first_name: form.first_name.clone(),
            last_name: form.last_name.clone(),
            date_of_birth: form.date_of_birth,
            date_of_death: form.date_of_death,
        })
    });

    let response = app(mocks)
        .oneshot(post_json(
            "/api/v1/authors/create",
            &token(true),
            serde_json::json!({ "first_name": "Ursula", "last_name": "Le Guin" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[LOCATION], "/api/v1/authors");
}

#[tokio::test]
async fn test_unknown_book_is_not_found() {
    let mut mocks = Mocks::default();
    mocks
        .books
        .expect_get_by_id()
        .returning(|id| Err(AppError::NotFound(format!("Book with id {} not found", id))));

    let response = app(mocks).oneshot(get("/api/v1/books/404", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_author_list_page() {
    let mut mocks = Mocks::default();
    mocks.authors.expect_count().returning(|| Ok(1));
    mocks.authors.expect_list().returning(|_, _| {
        Ok(vec![Author {
            id: 1,
            first_name: "Frank".to_string(),
            last_name: "Herbert".to_string(),
            date_of_birth: None,
            date_of_death: None,
        }])
    });

    let response = app(mocks)
        .oneshot(get("/api/v1/authors?page=1&per_page=5", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["title"], "Author List");
    assert_eq!(body["per_page"], 5);
    assert_eq!(body["items"][0]["last_name"], "Herbert");
}

#[tokio::test]
async fn test_private_catalog_requires_login() {
    let mut config = AppConfig::default();
    config.catalog.public_access = false;

    let mut mocks = Mocks::default();
    mocks.books.expect_count_matching().never();

    let response = app_with(mocks, config)
        .oneshot(get("/api/v1/books", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_my_loans_uses_caller_id() {
    let mut mocks = Mocks::default();
    mocks
        .instances
        .expect_list_loans_for_user()
        .withf(|user_id| *user_id == 2)
        .returning(|_| Ok(vec![]));

    let response = app(mocks)
        .oneshot(get("/api/v1/loans/mine", Some(&token(false))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["empty_message"], "You have no books borrowed.");
}

#[tokio::test]
async fn test_all_loans_forbidden_for_reader() {
    let mut mocks = Mocks::default();
    mocks.instances.expect_list_all_loans().never();

    let response = app(mocks)
        .oneshot(get("/api/v1/loans", Some(&token(false))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_renewal_without_date_is_reported_on_field() {
    let id = Uuid::new_v4();
    let proposed = (today() + Duration::weeks(3)).to_string();
    let bodies = [
        Body::from(r#"{"due_back": null}"#),
        Body::from("{}"),
        Body::from("not json"),
    ];

    for body in bodies {
        let mut mocks = Mocks::default();
        mocks
            .instances
            .expect_get_by_id()
            .returning(|id| Ok(on_loan(id)));
        mocks.instances.expect_update_due_back().never();

        let request = Request::builder()
            .method("POST")
            .uri(format!("/api/v1/instances/{}/renew", id))
            .header(AUTHORIZATION, format!("Bearer {}", token(true)))
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .unwrap();
        let response = app(mocks).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["field"], "due_back");
        assert_eq!(body["message"], "Enter a valid date.");
        assert_eq!(body["proposed"], proposed);
    }
}

#[tokio::test]
async fn test_staff_routes_refuse_readers_and_anonymous_callers() {
    let copy = Uuid::new_v4();
    let routes = [
        (Method::GET, "/api/v1/loans".to_string()),
        (Method::GET, "/api/v1/instances".to_string()),
        (Method::GET, format!("/api/v1/instances/{}/renew", copy)),
        (Method::POST, format!("/api/v1/instances/{}/renew", copy)),
        (Method::POST, format!("/api/v1/instances/{}/lend", copy)),
        (Method::POST, format!("/api/v1/instances/{}/return", copy)),
        (Method::POST, format!("/api/v1/instances/{}/status", copy)),
        (Method::DELETE, format!("/api/v1/instances/{}", copy)),
        (Method::POST, "/api/v1/books/1/instances".to_string()),
        (Method::POST, "/api/v1/authors/create".to_string()),
        (Method::POST, "/api/v1/authors/1/update".to_string()),
        (Method::POST, "/api/v1/authors/1/delete".to_string()),
        (Method::POST, "/api/v1/books/create".to_string()),
        (Method::POST, "/api/v1/books/1/update".to_string()),
        (Method::POST, "/api/v1/books/1/delete".to_string()),
        (Method::POST, "/api/v1/genres".to_string()),
        (Method::POST, "/api/v1/languages".to_string()),
        (Method::POST, "/api/v1/users".to_string()),
    ];

    for (bearer, expected) in [
        (Some(token(false)), StatusCode::FORBIDDEN),
        (None, StatusCode::UNAUTHORIZED),
    ] {
        for (method, uri) in &routes {
            let mut mocks = Mocks::default();
            mocks.instances.expect_list_all_loans().never();
            mocks.instances.expect_list_filtered().never();
            mocks.instances.expect_get_by_id().never();
            mocks.instances.expect_update_due_back().never();
            mocks.instances.expect_set_loan_state().never();
            mocks.instances.expect_create().never();
            mocks.instances.expect_delete().never();
            mocks.authors.expect_create().never();
            mocks.authors.expect_update().never();
            mocks.authors.expect_delete().never();
            mocks.books.expect_create().never();
            mocks.books.expect_update().never();
            mocks.books.expect_delete().never();
            mocks.genres.expect_create().never();
            mocks.languages.expect_create().never();
            mocks.users.expect_create().never();

            let mut builder = Request::builder()
                .method(method.clone())
                .uri(uri.as_str())
                .header(CONTENT_TYPE, "application/json");
            if let Some(token) = &bearer {
                builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
            }
            let response = app(mocks)
                .oneshot(builder.body(Body::from("{}")).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), expected, "{} {}", method, uri);
        }
    }
}

#[tokio::test]
async fn test_huge_page_number_is_not_found() {
    let mut mocks = Mocks::default();
    mocks.authors.expect_count().returning(|| Ok(3));
    mocks.authors.expect_list().never();
    mocks.books.expect_count_matching().returning(|_| Ok(3));
    mocks.books.expect_list().never();
    let app = app(mocks);

    for uri in [
        "/api/v1/authors?page=9223372036854775807&per_page=100",
        "/api/v1/books?page=9223372036854775807&per_page=100",
    ] {
        let response = app.clone().oneshot(get(uri, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
    }
}

#[tokio::test]
async fn test_book_list_filters_by_author_and_title() {
    let mut mocks = Mocks::default();
    mocks
        .books
        .expect_count_matching()
        .withf(|filter| filter.author_id == Some(4) && filter.title.as_deref() == Some("life"))
        .returning(|_| Ok(1));
    mocks
        .books
        .expect_list()
        .withf(|filter, limit, offset| {
            *filter
                == BookFilter {
                    author_id: Some(4),
                    title: Some("life".to_string()),
                }
                && *limit == 10
                && *offset == 0
        })
        .returning(|_, _, _| {
            Ok(vec![BookSummary {
                id: 9,
                title: "The Life of Brian".to_string(),
                author_id: Some(4),
                author: Some("Chapman, Graham".to_string()),
                display_genre: String::new(),
            }])
        });

    let response = app(mocks)
        .oneshot(get("/api/v1/books?author_id=4&title=life", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["title"], "The Life of Brian");
}
