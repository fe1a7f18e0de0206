use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use spamc_rs::config::{SecurityConfig, SpamAssassinConfig};
use spamc_rs::security::RequestValidator;
use spamc_rs::spamc::{ScanOptions, SpamDaemon, SpamcClient};
use spamc_rs::tools::{ExplainScoreParams, ToolHandler};
use spamc_rs::SpamError;

const REPORT_RESPONSE: &str = "SPAMD/1.1 0 EX_OK\r\n\
Content-length: 412\r\n\
Spam: True ; 7.5 / 5.0\r\n\
\r\n\
Spam detection software, running on the system \"mx.example.com\",\n\
has identified this incoming email as possible spam.\n\
\n\
Content analysis details:   (7.5 points, 5.0 required)\n\
\n\
 pts rule name              description\n\
---- ---------------------- --------------------------------------------------\n\
 3.0 URGENT_SUBJECT         Subject is urgent\n\
 4.5 MONEY_PRIZE            Mentions prize money\n\
\n";

#[derive(Clone)]
enum Behavior {
    /// Answer every scan with this response, then close
    Reply(&'static str),
    /// Accept and read the request but never answer
    Silent,
}

/// Requests received by a fake spamd, one string per connection
type Received = Arc<Mutex<Vec<String>>>;

/// Start a fake spamd on a loopback port
async fn start_fake_spamd(behavior: Behavior) -> (SocketAddr, Received) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let received: Received = Arc::new(Mutex::new(Vec::new()));

    let log = received.clone();
    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                break;
            };
            let log = log.clone();
            let behavior = behavior.clone();
            tokio::spawn(async move {
                let (reader, mut writer) = socket.into_split();
                let mut reader = BufReader::new(reader);

                // Request head, up to and including the blank line
                let mut head = String::new();
                let mut content_length = 0;
                loop {
                    let mut line = String::new();
                    if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                        return;
                    }
                    head.push_str(&line);
                    if line == "\r\n" {
                        break;
                    }
                    if let Some(value) = line.strip_prefix("Content-length:") {
                        content_length = value.trim().parse().unwrap();
                    }
                }

                let mut body = vec![0u8; content_length];
                reader.read_exact(&mut body).await.unwrap();
                let is_ping = head.starts_with("PING ");
                log.lock()
                    .await
                    .push(format!("{}{}", head, String::from_utf8_lossy(&body)));

                match behavior {
                    _ if is_ping => {
                        let _ = writer.write_all(b"SPAMD/1.5 0 PONG\r\n").await;
                    }
                    Behavior::Reply(response) => {
                        let _ = writer.write_all(response.as_bytes()).await;
                    }
                    Behavior::Silent => {
                        tokio::time::sleep(Duration::from_secs(30)).await;
                    }
                }
                let _ = writer.shutdown().await;
            });
        }
    });

    (addr, received)
}

fn client_for(addr: SocketAddr, timeout_secs: u64) -> SpamcClient {
    let config = SpamAssassinConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        timeout_secs,
        ..Default::default()
    };
    SpamcClient::new(&config).unwrap()
}

fn request(content: &str, options: ScanOptions) -> spamc_rs::security::ScanRequest {
    RequestValidator::new(1024 * 1024, true)
        .validate(content, options)
        .unwrap()
}

#[tokio::test]
async fn test_ping() {
    let (addr, received) = start_fake_spamd(Behavior::Reply("")).await;
    let client = client_for(addr, 5);

    client.ping().await.unwrap();

    let received = received.lock().await;
    assert_eq!(received.as_slice(), ["PING SPAMC/1.2\r\n\r\n".to_string()]);
}

#[tokio::test]
async fn test_ping_unreachable_daemon() {
    // Bind then drop to get a port with nothing listening
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client_for(addr, 2);
    match client.ping().await {
        Err(SpamError::DaemonUnreachable(msg)) => {
            assert!(!msg.contains(&addr.port().to_string()), "address leaked: {}", msg);
        }
        other => panic!("expected DaemonUnreachable, got {:?}", other),
    }
}

#[tokio::test]
async fn test_check_request_is_byte_exact() {
    let (addr, received) =
        start_fake_spamd(Behavior::Reply("SPAMD/1.1 0 EX_OK\r\nSpam: True ; 15.3 / 5.0\r\n\r\n")).await;
    let client = client_for(addr, 5);

    let content = "Subject: hi\r\n\r\nhello";
    let result = client
        .scan(&request(content, ScanOptions::default()))
        .await
        .unwrap();

    assert_eq!(result.score, 15.3);
    assert_eq!(result.threshold, 5.0);
    assert!(result.is_spam());
    assert!(result.rules_hit.is_empty());
    assert!(result.summary.is_none());

    let received = received.lock().await;
    assert_eq!(
        received[0],
        format!("CHECK SPAMC/1.2\r\nContent-length: {}\r\n\r\n{}", content.len(), content)
    );
}

#[tokio::test]
async fn test_report_with_bayes() {
    let (addr, received) = start_fake_spamd(Behavior::Reply(REPORT_RESPONSE)).await;
    let client = client_for(addr, 5);

    let options = ScanOptions {
        check_bayes: true,
        verbose: true,
    };
    let result = client
        .scan(&request("Subject: FREE MONEY NOW!!!\n\nClick here!", options))
        .await
        .unwrap();

    assert_eq!(result.score, 7.5);
    let names: Vec<&str> = result.rules_hit.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["URGENT_SUBJECT", "MONEY_PRIZE"]);
    assert_eq!(result.rules_hit[1].description, "Mentions prize money");
    assert!(result.summary.unwrap().contains("Content analysis details"));
    assert_eq!(result.response_headers["Content-length"], "412");

    let received = received.lock().await;
    assert!(received[0].starts_with("REPORT SPAMC/1.2\r\nUser: bayes\r\nContent-length: "));
}

#[tokio::test]
async fn test_envelope_headers_never_sent() {
    let (addr, received) =
        start_fake_spamd(Behavior::Reply("SPAMD/1.1 0 EX_OK\r\nSpam: False ; 0.1 / 5.0\r\n\r\n")).await;
    let client = client_for(addr, 5);

    let content = "Return-Path: <bounce@example.com>\r\nSubject: hi\r\n\r\nbody";
    let result = client
        .scan(&request(content, ScanOptions::default()))
        .await
        .unwrap();
    assert!(!result.is_spam());

    let received = received.lock().await;
    assert!(!received[0].contains("Return-Path"));
    assert!(received[0].ends_with("Subject: hi\r\n\r\nbody"));
}

#[tokio::test]
async fn test_missing_spam_line_is_malformed() {
    let (addr, _) = start_fake_spamd(Behavior::Reply("SPAMD/1.1 0 EX_OK\r\nContent-length: 0\r\n\r\n")).await;
    let client = client_for(addr, 5);

    let result = client
        .scan(&request("Subject: hi\n\nbody", ScanOptions::default()))
        .await;
    assert!(matches!(result, Err(SpamError::MalformedResponse(_))));
}

#[tokio::test]
async fn test_daemon_error_status() {
    let (addr, _) = start_fake_spamd(Behavior::Reply("SPAMD/1.0 76 Bad header line\r\n\r\n")).await;
    let client = client_for(addr, 5);

    match client
        .scan(&request("Subject: hi\n\nbody", ScanOptions::default()))
        .await
    {
        Err(SpamError::MalformedResponse(msg)) => assert!(msg.contains("76")),
        other => panic!("expected MalformedResponse, got {:?}", other),
    }
}

#[tokio::test]
async fn test_silent_daemon_times_out() {
    let (addr, _) = start_fake_spamd(Behavior::Silent).await;
    let client = client_for(addr, 1);

    let result = client
        .scan(&request("Subject: hi\n\nbody", ScanOptions::default()))
        .await;
    assert!(matches!(result, Err(SpamError::Timeout("read"))));
}

#[tokio::test]
async fn test_explain_score_end_to_end() {
    let (addr, received) = start_fake_spamd(Behavior::Reply(REPORT_RESPONSE)).await;
    let tools = ToolHandler::new(Arc::new(client_for(addr, 5)), &SecurityConfig::default()).unwrap();

    let explanation = tools
        .explain_score(
            ExplainScoreParams {
                email_content: "Subject: FREE MONEY NOW!!!\n\nClick here!".to_string(),
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(explanation.final_score, 7.5);
    assert!(explanation
        .explanation
        .starts_with("Final Score: 7.50 (Threshold: 5.00)\nClassification: SPAM"));
    assert!(explanation.explanation.ends_with(
        "Rules Triggered:\n\
         URGENT_SUBJECT: 3.00 - Subject is urgent\n\
         MONEY_PRIZE: 4.50 - Mentions prize money\n"
    ));

    let received = received.lock().await;
    assert!(received[0].starts_with("REPORT SPAMC/1.2\r\nUser: bayes\r\n"));
}

#[tokio::test]
async fn test_cancel_aborts_in_flight_scan() {
    let (addr, _) = start_fake_spamd(Behavior::Silent).await;
    let tools = ToolHandler::new(Arc::new(client_for(addr, 10)), &SecurityConfig::default()).unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let result = tools
        .explain_score(
            ExplainScoreParams {
                email_content: "Subject: hi\n\nbody".to_string(),
            },
            &cancel,
        )
        .await;
    assert!(matches!(result, Err(SpamError::Cancelled)));
}
