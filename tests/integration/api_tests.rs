//! API integration tests
//!
//! Run against a live server started with a bootstrap librarian:
//! `CATALOG__AUTH__BOOTSTRAP_LOGIN=admin CATALOG__AUTH__BOOTSTRAP_PASSWORD=admin-password`

use chrono::{Duration, Local};
use reqwest::{redirect::Policy, Client, StatusCode};
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:8080/api/v1";
const LOGIN: &str = "admin";
const PASSWORD: &str = "admin-password";

fn client() -> Client {
    Client::builder()
        .redirect(Policy::none())
        .cookie_store(true)
        .build()
        .expect("Failed to build client")
}

/// Helper to get a librarian token
async fn get_auth_token(client: &Client) -> String {
    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({
            "login": LOGIN,
            "password": PASSWORD
        }))
        .send()
        .await
        .expect("Failed to send login request");

    let body: Value = response.json().await.expect("Failed to parse login response");
    body["token"].as_str().expect("No token in response").to_string()
}

/// Walk a paginated list and return the id of the first row where `key == value`
async fn find_id(client: &Client, path: &str, key: &str, value: &str) -> Option<i64> {
    let mut page = 1;
    loop {
        let body: Value = client
            .get(format!("{}{}?page={}&per_page=100", BASE_URL, path, page))
            .send()
            .await
            .expect("Failed to send request")
            .json()
            .await
            .expect("Failed to parse response");

        if let Some(row) = body["items"]
            .as_array()
            .and_then(|items| items.iter().find(|row| row[key] == value))
        {
            return row["id"].as_i64();
        }
        if page >= body["num_pages"].as_i64().unwrap_or(1) {
            return None;
        }
        page += 1;
    }
}

fn unique(prefix: &str) -> String {
    format!("{} {}", prefix, &uuid::Uuid::new_v4().simple().to_string()[..8])
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let response = client()
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_login() {
    let response = client()
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({
            "login": LOGIN,
            "password": PASSWORD
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["token"].is_string());
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["user"]["is_librarian"], true);
    assert!(body["user"].get("password").is_none());
}

#[tokio::test]
#[ignore]
async fn test_login_invalid_credentials() {
    let response = client()
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({
            "login": LOGIN,
            "password": "wrong"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_home_visit_counter() {
    let client = client();

    let first: Value = client
        .get(format!("{}/home", BASE_URL))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    let second: Value = client
        .get(format!("{}/home", BASE_URL))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");

    assert_eq!(first["num_visits"], 1);
    assert_eq!(second["num_visits"], 2);
    assert!(second["num_books"].is_i64());
}

#[tokio::test]
#[ignore]
async fn test_mutations_require_token() {
    let response = client()
        .post(format!("{}/authors/create", BASE_URL))
        .json(&json!({ "first_name": "No", "last_name": "Token" }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_page_past_end_not_found() {
    let response = client()
        .get(format!("{}/books?page=100000", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore]
async fn test_catalog_and_loan_lifecycle() {
    let client = client();
    let token = get_auth_token(&client).await;
    let me: Value = client
        .get(format!("{}/auth/me", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");

    // Author
    let last_name = unique("Tester");
    let response = client
        .post(format!("{}/authors/create", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({ "first_name": "Integration", "last_name": last_name }))
        .send()
        .await
        .expect("Failed to create author");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let author_id = find_id(&client, "/authors", "last_name", &last_name)
        .await
        .expect("Author not listed");

    // Genre and language
    let genre: Value = client
        .post(format!("{}/genres", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({ "name": unique("Genre") }))
        .send()
        .await
        .expect("Failed to create genre")
        .json()
        .await
        .expect("Failed to parse genre");
    let language: Value = client
        .post(format!("{}/languages", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({ "name": unique("Language") }))
        .send()
        .await
        .expect("Failed to create language")
        .json()
        .await
        .expect("Failed to parse language");

    // Book
    let title = unique("The Life of");
    let response = client
        .post(format!("{}/books/create", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({
            "title": title,
            "author_id": author_id,
            "summary": "Integration test book",
            "genre_ids": [genre["id"]],
            "language_id": language["id"]
        }))
        .send()
        .await
        .expect("Failed to create book");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let book_id = find_id(&client, "/books", "title", &title)
        .await
        .expect("Book not listed");

    // Deleting the author is blocked while the book refers to them
    let response = client
        .post(format!("{}/authors/{}/delete", BASE_URL, author_id))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Copy, lend, renew, return
    let copy: Value = client
        .post(format!("{}/books/{}/instances", BASE_URL, book_id))
        .bearer_auth(&token)
        .json(&json!({ "imprint": "Integration Press, 2024", "status": "available" }))
        .send()
        .await
        .expect("Failed to create copy")
        .json()
        .await
        .expect("Failed to parse copy");
    let copy_id = copy["id"].as_str().expect("copy id").to_string();

    let lent: Value = client
        .post(format!("{}/instances/{}/lend", BASE_URL, copy_id))
        .bearer_auth(&token)
        .json(&json!({ "borrower_id": me["id"] }))
        .send()
        .await
        .expect("Failed to lend copy")
        .json()
        .await
        .expect("Failed to parse copy");
    assert_eq!(lent["status"], "on_loan");

    let past = (Local::now().date_naive() - Duration::days(1)).to_string();
    let response = client
        .post(format!("{}/instances/{}/renew", BASE_URL, copy_id))
        .bearer_auth(&token)
        .json(&json!({ "due_back": past }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.expect("Failed to parse error");
    assert_eq!(body["field"], "due_back");

    let due = (Local::now().date_naive() + Duration::weeks(2)).to_string();
    let response = client
        .post(format!("{}/instances/{}/renew", BASE_URL, copy_id))
        .bearer_auth(&token)
        .json(&json!({ "due_back": due }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let loans: Value = client
        .get(format!("{}/loans/mine", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse loans");
    assert!(loans["items"]
        .as_array()
        .expect("items")
        .iter()
        .any(|row| row["id"] == copy_id.as_str() && row["due_back"] == due.as_str()));

    let returned: Value = client
        .post(format!("{}/instances/{}/return", BASE_URL, copy_id))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to return copy")
        .json()
        .await
        .expect("Failed to parse copy");
    assert_eq!(returned["status"], "available");
    assert!(returned["due_back"].is_null());

    // Clean up
    let response = client
        .delete(format!("{}/instances/{}", BASE_URL, copy_id))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to delete copy");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    for path in [
        format!("{}/books/{}/delete", BASE_URL, book_id),
        format!("{}/authors/{}/delete", BASE_URL, author_id),
    ] {
        let response = client
            .post(path)
            .bearer_auth(&token)
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }
}

async fn post(client: &Client, token: &str, path: &str, body: Value) -> reqwest::Response {
    client
        .post(format!("{}{}", BASE_URL, path))
        .bearer_auth(token)
        .json(&body)
        .send()
        .await
        .expect("Failed to send request")
}

async fn get_json(client: &Client, token: &str, path: &str) -> Value {
    client
        .get(format!("{}{}", BASE_URL, path))
        .bearer_auth(token)
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response")
}

#[tokio::test]
#[ignore]
async fn test_book_filters_and_loan_order() {
    let client = client();
    let token = get_auth_token(&client).await;
    let me = get_json(&client, &token, "/auth/me").await;
    let today = Local::now().date_naive();

    let last_name = unique("Filter");
    let response = post(
        &client,
        &token,
        "/authors/create",
        json!({ "first_name": "Case", "last_name": last_name }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let author_id = find_id(&client, "/authors", "last_name", &last_name)
        .await
        .expect("Author not listed");
    let language: Value = post(&client, &token, "/languages", json!({ "name": unique("Lang") }))
        .await
        .json()
        .await
        .expect("Failed to parse language");

    // Mixed case title; the filter and the home count both ignore case
    let title = unique("A LiFe Story");
    let response = post(
        &client,
        &token,
        "/books/create",
        json!({ "title": title, "author_id": author_id, "language_id": language["id"] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let by_author = get_json(
        &client,
        &token,
        &format!("/books?author_id={}&title=LIFE%20story", author_id),
    )
    .await;
    assert_eq!(by_author["total"], 1);
    assert_eq!(by_author["items"][0]["title"], title.as_str());
    let book_id = by_author["items"][0]["id"].as_i64().expect("book id");

    let all = get_json(&client, &token, "/books").await;
    let empty_title = get_json(&client, &token, "/books?title=").await;
    assert_eq!(all["total"], empty_title["total"]);

    let home = get_json(&client, &token, "/home").await;
    assert_eq!(home["num_books_word"]["word"], "Life");
    assert!(home["num_books_word"]["count"].as_i64().unwrap_or(0) >= 1);

    // Two copies lent to the caller, the later due date first
    let mut copies = Vec::new();
    for weeks in [3, 1] {
        let copy: Value = post(
            &client,
            &token,
            &format!("/books/{}/instances", book_id),
            json!({ "imprint": "Filter Press", "status": "available" }),
        )
        .await
        .json()
        .await
        .expect("Failed to parse copy");
        let copy_id = copy["id"].as_str().expect("copy id").to_string();
        let due = (today + Duration::weeks(weeks)).to_string();
        let response = post(
            &client,
            &token,
            &format!("/instances/{}/lend", copy_id),
            json!({ "borrower_id": me["id"], "due_back": due }),
        )
        .await;
        assert!(response.status().is_success());
        copies.push(copy_id);
    }

    let loans = get_json(&client, &token, "/loans/mine").await;
    let items = loans["items"].as_array().expect("items");
    assert!(items.iter().all(|row| row["borrower"]["id"] == me["id"]));
    let due_dates: Vec<&str> = items
        .iter()
        .filter_map(|row| row["due_back"].as_str())
        .collect();
    assert!(due_dates.windows(2).all(|pair| pair[0] <= pair[1]));
    let position = |id: &str| {
        items
            .iter()
            .position(|row| row["id"] == id)
            .expect("Copy missing from my loans")
    };
    assert!(position(&copies[1]) < position(&copies[0]));

    // Clean up
    for copy_id in &copies {
        let path = format!("/instances/{}/return", copy_id);
        let response = post(&client, &token, &path, json!({})).await;
        assert!(response.status().is_success());
        let response = client
            .delete(format!("{}/instances/{}", BASE_URL, copy_id))
            .bearer_auth(&token)
            .send()
            .await
            .expect("Failed to delete copy");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
    for path in [
        format!("/books/{}/delete", book_id),
        format!("/authors/{}/delete", author_id),
    ] {
        let response = post(&client, &token, &path, json!({})).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }
}
