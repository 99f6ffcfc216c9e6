use super::*;

#[test]
fn session_cookie_is_http_only_and_lax() {
    let cookie = session_cookie("abc".into(), true, Duration::days(30));
    assert_eq!(cookie.name(), COOKIE_NAME);
    assert_eq!(cookie.value(), "abc");
    assert_eq!(cookie.http_only(), Some(true));
    assert_eq!(cookie.secure(), Some(true));
    assert_eq!(cookie.same_site(), Some(SameSite::Lax));
    assert_eq!(cookie.path(), Some("/"));
    assert_eq!(cookie.max_age(), Some(Duration::days(30)));
}

#[test]
fn cleared_cookie_expires_immediately() {
    let cookie = session_cookie(String::new(), false, Duration::ZERO);
    assert_eq!(cookie.value(), "");
    assert_eq!(cookie.max_age(), Some(Duration::ZERO));
    assert_eq!(cookie.secure(), Some(false));
}

#[test]
fn email_auth_errors_map_to_statuses() {
    assert_eq!(email_auth_error_to_api(EmailAuthError::InvalidEmail).status, StatusCode::BAD_REQUEST);
    assert_eq!(email_auth_error_to_api(EmailAuthError::InvalidCode).status, StatusCode::BAD_REQUEST);
    assert_eq!(email_auth_error_to_api(EmailAuthError::VerificationFailed).status, StatusCode::UNAUTHORIZED);
    let db = email_auth_error_to_api(EmailAuthError::Db(sqlx::Error::RowNotFound));
    assert_eq!(db.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(db.message, "internal server error");
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
async fn code_sign_in_sets_cookie() {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::state::test_helpers::live_app_state;

    let (state, mailer) = live_app_state().await;
    let email = format!("signin-{}@example.test", uuid::Uuid::new_v4().simple());
    let app = crate::routes::app(state);

    let resp = app
        .clone()
        .oneshot(
            Request::post("/api/auth/email/request-code")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::json!({ "email": email }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let sent = mailer.messages();
    let html = &sent.last().unwrap().html;
    let code = html
        .split("font-weight: bold;\">")
        .nth(1)
        .and_then(|rest| rest.split("</p>").next())
        .unwrap()
        .to_owned();

    let resp = app
        .oneshot(
            Request::post("/api/auth/email/verify-code")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::json!({ "email": email, "code": code }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let set_cookie = resp.headers()["set-cookie"].to_str().unwrap();
    assert!(set_cookie.starts_with("session_token="));
    assert!(set_cookie.contains("HttpOnly"));
}
