use arbiter::chat::drive_chat;
use arbiter::widget::{ChatController, HttpAskClient};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

#[tokio::test]
async fn test_chat_prints_every_exchange_before_exiting() {
    let gateway = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/ask"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "text": "Oui.",
            "rules": ["R1"]
        })))
        .expect(2)
        .mount(&gateway)
        .await;

    let controller = ChatController::new(HttpAskClient::new(&gateway.uri()));
    let input = BufReader::new(&b"Premiere question\n   \nSeconde question\n"[..]).lines();
    let mut out = Vec::new();

    drive_chat(controller, input, &mut out).await.unwrap();

    let printed = String::from_utf8(out).unwrap();
    assert!(printed.contains("vous  > Premiere question\n"));
    assert!(printed.contains("vous  > Seconde question\n"));
    assert_eq!(printed.matches("arbitre> Oui.\n").count(), 2);
    assert_eq!(printed.matches("         - R1\n").count(), 2);
    assert_eq!(printed.matches("vous  > ").count(), 2);
}

#[tokio::test]
async fn test_chat_with_no_input_prints_nothing() {
    let controller = ChatController::new(HttpAskClient::new("http://127.0.0.1:9"));
    let input = BufReader::new(&b""[..]).lines();
    let mut out = Vec::new();

    drive_chat(controller, input, &mut out).await.unwrap();
    assert!(out.is_empty());
}

#[tokio::test]
async fn test_chat_reports_unreachable_gateway_inline() {
    let controller = ChatController::new(HttpAskClient::new("http://127.0.0.1:9"));
    let input = BufReader::new(&b"Bonjour ?\n"[..]).lines();
    let mut out = Vec::new();

    drive_chat(controller, input, &mut out).await.unwrap();

    let printed = String::from_utf8(out).unwrap();
    assert_eq!(printed, "vous  > Bonjour ?\narbitre> Une erreur est survenue.\n");
}
