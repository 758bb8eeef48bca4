//! Integration tests for login, thread creation and replies against a mock forum.

use forum_client::{Config, ForumClient, ForumError};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SESSION_COOKIE: &str = "mybbuser=1_sessiontoken";

const LOGIN_PAGE: &str = r#"<html><body>
<form action="member.php" method="post">
  <input type="text" name="username" />
  <input type="password" name="password" />
  <input type="hidden" name="action" value="do_login" />
  <input type="hidden" name="my_post_key" value="key123" />
</form>
</body></html>"#;

const NEW_THREAD_PAGE: &str = r#"<html><body>
<form action="newthread.php?fid=13" method="post" name="input">
  <input type="hidden" name="my_post_key" value="key123" />
  <input type="text" name="subject" />
  <textarea name="message"></textarea>
  <input type="hidden" name="posthash" value="hash456" />
</form>
</body></html>"#;

const NEW_REPLY_PAGE: &str = r#"<html><body>
<form action="newreply.php?tid=42" method="post" name="input">
  <input type="hidden" name="my_post_key" value="key123" />
  <textarea name="message"></textarea>
  <input type="hidden" name="posthash" value="hash789" />
</form>
</body></html>"#;

fn client_for(server: &MockServer) -> ForumClient {
    let config = Config::for_testing(&format!("{}/forum", server.uri()));
    ForumClient::new(&config).expect("Failed to build client")
}

/// Mount a login page and a login handler that accepts alice/pw1.
async fn mount_login(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/forum/member.php"))
        .and(query_param("action", "login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/forum/member.php"))
        .and(body_string_contains("action=do_login"))
        .and(body_string_contains("username=alice"))
        .and(body_string_contains("password=pw1"))
        .and(body_string_contains("my_post_key=key123"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", format!("{SESSION_COOKIE}; path=/").as_str())
                .set_body_string("<p>You have successfully been logged in.</p>"),
        )
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/forum/member.php"))
        .and(body_string_contains("password=wrong"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<div class=\"error\"><ul><li>Invalid password.</li></ul></div>"),
        )
        .mount(server)
        .await;
}

async fn mount_new_thread_form(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/forum/newthread.php"))
        .and(query_param("fid", "13"))
        .and(header("cookie", SESSION_COOKIE))
        .respond_with(ResponseTemplate::new(200).set_body_string(NEW_THREAD_PAGE))
        .mount(server)
        .await;
}

async fn logged_in_client(server: &MockServer) -> ForumClient {
    mount_login(server).await;
    let client = client_for(server);
    client.login("alice", "pw1").await.expect("login failed");
    client
}

#[tokio::test]
async fn test_login_establishes_session() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    let client = client_for(&server);
    assert!(!client.is_logged_in());

    client.login("alice", "pw1").await.expect("login failed");
    assert!(client.is_logged_in());
}

#[tokio::test]
async fn test_login_rejected_credentials() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    let client = client_for(&server);
    let err = client.login("alice", "wrong").await.unwrap_err();

    assert!(matches!(err, ForumError::Authentication(_)), "got {err:?}");
    assert!(!client.is_logged_in());
}

#[tokio::test]
async fn test_relogin_with_wrong_password_fails_despite_existing_session() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    let client = client_for(&server);
    client.login("alice", "pw1").await.expect("login failed");
    assert!(client.is_logged_in());

    let err = client.login("alice", "wrong").await.unwrap_err();
    assert!(
        matches!(err, ForumError::Authentication(ref msg) if msg.contains("Invalid password.")),
        "got {err:?}"
    );
}

#[tokio::test]
async fn test_login_accepts_cookie_on_redirect() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/forum/member.php"))
        .and(query_param("action", "login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/forum/member.php"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("set-cookie", format!("{SESSION_COOKIE}; path=/").as_str())
                .insert_header("location", "index.php"),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.login("alice", "pw1").await.expect("login failed");
    assert!(client.is_logged_in());
}

#[tokio::test]
async fn test_login_form_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/forum/member.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>Maintenance</body></html>"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.login("alice", "pw1").await.unwrap_err();

    assert!(matches!(err, ForumError::Authentication(ref msg) if msg.contains("login form")));
}

#[tokio::test]
async fn test_login_server_error_is_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/forum/member.php"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.login("alice", "pw1").await.unwrap_err();

    assert!(matches!(err, ForumError::Http(_)), "got {err:?}");
}

#[tokio::test]
async fn test_create_thread_from_redirect() {
    let server = MockServer::start().await;
    let client = logged_in_client(&server).await;
    mount_new_thread_form(&server).await;

    Mock::given(method("POST"))
        .and(path("/forum/newthread.php"))
        .and(header("cookie", SESSION_COOKIE))
        .and(body_string_contains("action=do_newthread"))
        .and(body_string_contains("subject=T"))
        .and(body_string_contains("message=B"))
        .and(body_string_contains("fid=13"))
        .and(body_string_contains("posthash=hash456"))
        .and(body_string_contains("my_post_key=key123"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/thread/42"))
        .expect(1)
        .mount(&server)
        .await;

    let thread_id = client.create_thread(13, "T", "B").await.expect("create failed");
    assert_eq!(thread_id, 42);
}

#[tokio::test]
async fn test_create_thread_from_tid_redirect() {
    let server = MockServer::start().await;
    let client = logged_in_client(&server).await;
    mount_new_thread_form(&server).await;

    Mock::given(method("POST"))
        .and(path("/forum/newthread.php"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", "showthread.php?tid=1234"),
        )
        .mount(&server)
        .await;

    let thread_id = client.create_thread(13, "T", "B").await.expect("create failed");
    assert_eq!(thread_id, 1234);
}

#[tokio::test]
async fn test_create_thread_from_meta_refresh() {
    let server = MockServer::start().await;
    let client = logged_in_client(&server).await;
    mount_new_thread_form(&server).await;

    Mock::given(method("POST"))
        .and(path("/forum/newthread.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><head><meta http-equiv="refresh" content="2;URL=showthread.php?tid=77" /></head>
            <body>Thank you, your thread has been posted.</body></html>"#,
        ))
        .mount(&server)
        .await;

    let thread_id = client.create_thread(13, "T", "B").await.expect("create failed");
    assert_eq!(thread_id, 77);
}

#[tokio::test]
async fn test_create_thread_rejected_form() {
    let server = MockServer::start().await;
    let client = logged_in_client(&server).await;
    mount_new_thread_form(&server).await;

    Mock::given(method("POST"))
        .and(path("/forum/newthread.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<div class="error">
                 <p><em>Please correct the following errors before continuing:</em></p>
                 <ul><li>The subject is too short.</li></ul>
               </div>"#,
        ))
        .mount(&server)
        .await;

    let err = client.create_thread(13, "T", "B").await.unwrap_err();
    assert!(
        matches!(err, ForumError::Submission(ref msg) if msg.contains("The subject is too short.")),
        "got {err:?}"
    );
}

#[tokio::test]
async fn test_create_thread_without_id_in_response() {
    let server = MockServer::start().await;
    let client = logged_in_client(&server).await;
    mount_new_thread_form(&server).await;

    Mock::given(method("POST"))
        .and(path("/forum/newthread.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>Done.</p>"))
        .mount(&server)
        .await;

    let err = client.create_thread(13, "T", "B").await.unwrap_err();
    assert!(matches!(err, ForumError::Submission(_)), "got {err:?}");
}

#[tokio::test]
async fn test_create_thread_redirect_without_thread() {
    let server = MockServer::start().await;
    let client = logged_in_client(&server).await;
    mount_new_thread_form(&server).await;

    Mock::given(method("POST"))
        .and(path("/forum/newthread.php"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", "member.php?action=login"),
        )
        .mount(&server)
        .await;

    let err = client.create_thread(13, "T", "B").await.unwrap_err();
    assert!(matches!(err, ForumError::Submission(_)), "got {err:?}");
}

#[tokio::test]
async fn test_reply_thread_returns_post_id() {
    let server = MockServer::start().await;
    let client = logged_in_client(&server).await;

    Mock::given(method("GET"))
        .and(path("/forum/newreply.php"))
        .and(query_param("tid", "42"))
        .respond_with(ResponseTemplate::new(200).set_body_string(NEW_REPLY_PAGE))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/forum/newreply.php"))
        .and(header("cookie", SESSION_COOKIE))
        .and(body_string_contains("action=do_newreply"))
        .and(body_string_contains("tid=42"))
        .and(body_string_contains("posthash=hash789"))
        .and(body_string_contains("replyto=5"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><head><meta http-equiv="refresh" content="1;URL=showthread.php?tid=42&amp;pid=99#pid99" /></head></html>"#,
        ))
        .mount(&server)
        .await;

    let post_id = client
        .reply_thread(42, "Confirmed, it works.", Some(5))
        .await
        .expect("reply failed");
    assert_eq!(post_id, 99);
}

#[tokio::test]
async fn test_reply_thread_without_post_id() {
    let server = MockServer::start().await;
    let client = logged_in_client(&server).await;

    Mock::given(method("GET"))
        .and(path("/forum/newreply.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string(NEW_REPLY_PAGE))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/forum/newreply.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>ok</p>"))
        .mount(&server)
        .await;

    let err = client.reply_thread(42, "hello", None).await.unwrap_err();
    assert!(matches!(err, ForumError::Submission(_)), "got {err:?}");
}
