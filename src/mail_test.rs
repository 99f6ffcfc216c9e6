use super::*;

#[test]
fn html_escape_covers_markup_characters() {
    assert_eq!(html_escape(r#"<a href="x">Tom & 'Jerry'</a>"#), "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;");
    assert_eq!(html_escape("plain"), "plain");
}

#[test]
fn login_code_message_injects_email_and_code() {
    let msg = login_code_message("user@example.com", "ABC234");
    assert_eq!(msg.to, "user@example.com");
    assert!(msg.html.contains("user@example.com"));
    assert!(msg.html.contains("ABC234"));
    assert!(!msg.html.contains("{{EMAIL}}"));
    assert!(!msg.html.contains("{{CODE}}"));
}

#[test]
fn family_invite_message_escapes_user_supplied_names() {
    let msg = family_invite_message(&InviteMail {
        email: "kid@example.com",
        family_name: "<script>The Smiths</script>",
        inviter_name: "Pat",
        link: "https://app.example.com/invites/accept?token=abc&x=1",
        expires_on: "2026-10-25",
    });
    assert_eq!(msg.to, "kid@example.com");
    assert_eq!(msg.subject, "Pat invited you to <script>The Smiths</script>");
    assert!(msg.html.contains("&lt;script&gt;The Smiths&lt;/script&gt;"));
    assert!(!msg.html.contains("<script>"));
    assert!(msg.html.contains("token=abc&amp;x=1"));
    assert!(msg.html.contains("2026-10-25"));
    assert!(!msg.html.contains("{{"));
}

#[tokio::test]
async fn log_mailer_always_succeeds() {
    let mailer = mailer_from_config(None);
    let result = mailer.send(login_code_message("a@b.c", "AAAAAA")).await;
    assert!(result.is_ok());
}
