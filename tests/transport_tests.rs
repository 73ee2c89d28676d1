// Wire format and delivery guarantees of the streaming channel.

use anyhow::Result;
use base64::Engine;
use loqa_interviewer::session::Speaker;
use loqa_interviewer::transport::{self, ClientMessage, ServerMessage, StatusLabel};
use serde_json::{json, Value};

fn to_json(message: &ServerMessage) -> Result<Value> {
    Ok(serde_json::to_value(message)?)
}

#[test]
fn test_envelope_shapes() -> Result<()> {
    assert_eq!(
        to_json(&ServerMessage::status(StatusLabel::GeneratingQuestions))?,
        json!({"type": "status", "status": "generating_questions"})
    );
    assert_eq!(
        to_json(&ServerMessage::transcript(Speaker::User, "Hello"))?,
        json!({"type": "transcript", "speaker": "user", "text": "Hello"})
    );
    assert_eq!(
        to_json(&ServerMessage::Question {
            text: "Why Rust?".into(),
            index: 2,
            total: 5
        })?,
        json!({"type": "question", "text": "Why Rust?", "index": 2, "total": 5})
    );
    assert_eq!(to_json(&ServerMessage::Finished)?, json!({"type": "finished"}));
    assert_eq!(
        to_json(&ServerMessage::Error {
            message: "boom".into()
        })?,
        json!({"type": "error", "message": "boom"})
    );
    Ok(())
}

#[test]
fn test_audio_payload_is_base64() -> Result<()> {
    let bytes = b"RIFF....WAVE".to_vec();
    let value = to_json(&ServerMessage::audio(&bytes, 3))?;

    assert_eq!(value["type"], "audio");
    assert_eq!(value["sequence"], 3);
    let encoded = value["audio"].as_str().unwrap_or_default();
    let decoded = base64::engine::general_purpose::STANDARD.decode(encoded)?;
    assert_eq!(decoded, bytes);
    Ok(())
}

#[test]
fn test_client_control_messages() -> Result<()> {
    let interrupt: ClientMessage = serde_json::from_str(r#"{"type":"interrupt"}"#)?;
    let stop: ClientMessage = serde_json::from_str(r#"{"type":"stop"}"#)?;
    assert_eq!(interrupt, ClientMessage::Interrupt);
    assert_eq!(stop, ClientMessage::Stop);
    assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"dance"}"#).is_err());
    Ok(())
}

#[tokio::test]
async fn test_messages_arrive_in_send_order() -> Result<()> {
    let (sender, mut rx) = transport::channel();
    sender.send(ServerMessage::status(StatusLabel::Connected));
    sender.send(ServerMessage::transcript(Speaker::Agent, "Hi"));
    sender.finish();

    assert_eq!(rx.recv().await, Some(ServerMessage::status(StatusLabel::Connected)));
    assert_eq!(rx.recv().await.map(|m| m.kind()), Some("transcript"));
    assert_eq!(rx.recv().await, Some(ServerMessage::Finished));
    Ok(())
}

#[test]
fn test_finished_is_terminal_and_single() {
    let (sender, mut rx) = transport::channel();
    let clone = sender.clone();

    assert!(sender.finish());
    assert!(!clone.finish());
    assert!(clone.is_finished());
    assert!(!clone.send(ServerMessage::transcript(Speaker::Agent, "late")));

    assert_eq!(rx.try_recv().ok(), Some(ServerMessage::Finished));
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_send_after_client_left_is_silent() {
    let (sender, rx) = transport::channel();
    drop(rx);

    assert!(sender.is_closed());
    assert!(!sender.send(ServerMessage::status(StatusLabel::Connected)));
    // Finishing still succeeds exactly once
    assert!(sender.finish());
    assert!(!sender.finish());
}
