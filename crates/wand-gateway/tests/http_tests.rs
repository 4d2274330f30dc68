use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use wand_core::{CriticGateway, CriticRequest, CriticResponse, GatewayError, GenerationGateway, GenerationRequest};
use wand_gateway::{HttpCriticGateway, HttpGenerationGateway};

const TIMEOUT: Duration = Duration::from_secs(5);

/// Serve one request with `status` and `body`; yields the request's JSON body
async fn serve_once(status: &'static str, body: String) -> (String, oneshot::Receiver<Value>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/api", listener.local_addr().unwrap());
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        let request_body = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(split) = text.find("\r\n\r\n") {
                let length = text[..split]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= split + 4 + length {
                    break buf[split + 4..split + 4 + length].to_vec();
                }
            }
            if n == 0 {
                break Vec::new();
            }
        };
        let _ = tx.send(serde_json::from_slice(&request_body).unwrap_or(Value::Null));

        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
    });
    (url, rx)
}

#[tokio::test]
async fn generation_round_trip() {
    let (url, seen) = serve_once("200 OK", json!({"out_sentence": "A cat sat."}).to_string()).await;
    let gateway = HttpGenerationGateway::new(url, TIMEOUT).unwrap();

    let request = GenerationRequest::new(
        "Once upon a time,",
        [("Sports".to_string(), 1.0)].into_iter().collect(),
    );
    assert_eq!(gateway.generate(&request).await.unwrap(), "A cat sat.");
    assert_eq!(
        seen.await.unwrap(),
        json!({"skill": 0, "sentence": "Once upon a time,", "topic": {"Sports": 1.0}, "task": "generation"})
    );
}

#[tokio::test]
async fn critic_scores_round_trip() {
    let (url, seen) = serve_once(
        "200 OK",
        json!({"It is sad.": {"B.": 0.42}}).to_string(),
    )
    .await;
    let gateway = HttpCriticGateway::new(url, TIMEOUT).unwrap();

    let request = CriticRequest::Scores {
        stories: vec!["A.".into(), "B.".into()],
        reviews: [("It is sad.".to_string(), 0.1)].into_iter().collect(),
    };
    let CriticResponse::Scores(scores) = gateway.critique(&request).await.unwrap() else {
        panic!("expected scores");
    };
    assert_eq!(scores["It is sad."]["B."], 0.42);
    assert_eq!(seen.await.unwrap()["version"], 2);
}

#[tokio::test]
async fn critic_best_match_round_trip() {
    let (url, _seen) = serve_once("200 OK", json!({"It is sad.": "B."}).to_string()).await;
    let gateway = HttpCriticGateway::new(url, TIMEOUT).unwrap();

    let request = CriticRequest::BestMatch {
        stories: vec!["A.".into(), "B.".into()],
        reviews: vec!["It is sad.".into()],
    };
    assert_eq!(
        gateway.critique(&request).await.unwrap(),
        CriticResponse::BestMatch([("It is sad.".to_string(), "B.".to_string())].into_iter().collect())
    );
}

#[tokio::test]
async fn server_errors_map_to_status() {
    let (url, _seen) = serve_once("503 Service Unavailable", "\"busy\"".to_string()).await;
    let gateway = HttpGenerationGateway::new(url, TIMEOUT).unwrap();

    let err = gateway
        .generate(&GenerationRequest::new("x", Default::default()))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        GatewayError::Status {
            status: 503,
            body: "\"busy\"".into()
        }
    );
    assert!(err.is_retryable());
}

#[tokio::test]
async fn wrong_shape_maps_to_decode() {
    let (url, _seen) = serve_once("200 OK", json!({"text": "nope"}).to_string()).await;
    let gateway = HttpGenerationGateway::new(url, TIMEOUT).unwrap();

    let err = gateway
        .generate(&GenerationRequest::new("x", Default::default()))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Decode(_)));
}

#[tokio::test]
async fn unreachable_service_maps_to_request() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/api", listener.local_addr().unwrap());
    drop(listener);

    let gateway = HttpGenerationGateway::new(url, TIMEOUT).unwrap();
    let err = gateway
        .generate(&GenerationRequest::new("x", Default::default()))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Request(_)));
}
