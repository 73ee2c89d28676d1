use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::state::AppState;
use crate::audio::{CaptureConfig, StreamCapture};
use crate::config::Config;
use crate::dialogue::DialogueMode;
use crate::session::{
    DialoguePlan, InterviewParams, RunnerConfig, SessionController, SessionHandle, SessionRunner,
};
use crate::transport::{self, ClientMessage, ControlSignal, ServerMessage};

fn dialogue_plan(config: &Config, mode: DialogueMode, question_count: usize) -> DialoguePlan {
    match mode {
        DialogueMode::Scripted => DialoguePlan::Scripted {
            questions: Vec::new(),
            count: question_count,
        },
        DialogueMode::FreeForm => DialoguePlan::FreeForm {
            terminal_phrase: config.dialogue.terminal_phrase.clone(),
            max_turns: config.dialogue.max_turns,
        },
    }
}

/// Drive one interview over an upgraded WebSocket until it finishes
pub async fn serve_session(
    socket: WebSocket,
    state: AppState,
    params: InterviewParams,
    mode: DialogueMode,
    question_count: usize,
) {
    let session_id = format!("interview-{}", uuid::Uuid::new_v4());
    let config = state.config.clone();

    let (mut sink, mut stream) = socket.split();
    let (sender, mut outbound) = transport::channel();
    let (control_tx, control_rx) = mpsc::channel(16);
    let (audio_tx, audio_rx) = mpsc::channel::<Vec<u8>>(config.audio.frame_queue.max(1));

    // Writer: envelopes in production order; `finished` is always last
    let writer = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let last = message == ServerMessage::Finished;
            match serde_json::to_string(&message) {
                Ok(text) => {
                    if sink.send(Message::Text(text)).await.is_err() {
                        debug!("Client gone, dropping outbound messages");
                        break;
                    }
                }
                Err(e) => warn!("Failed to encode {} message: {}", message.kind(), e),
            }
            if last {
                break;
            }
        }
        // Closing an already-closed socket is fine
        let _ = sink.close().await;
    });

    // Reader: binary frames are capture audio, text frames are control
    let reader_control = control_tx.clone();
    let reader = tokio::spawn(async move {
        while let Some(incoming) = stream.next().await {
            match incoming {
                Ok(Message::Binary(bytes)) => {
                    if audio_tx.try_send(bytes).is_err() {
                        debug!("Audio frame dropped");
                    }
                }
                Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::Interrupt) => {
                        let _ = reader_control.send(ControlSignal::Interrupt).await;
                    }
                    Ok(ClientMessage::Stop) => {
                        let _ = reader_control.send(ControlSignal::Stop).await;
                    }
                    Err(e) => warn!("Ignoring unknown client message: {}", e),
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!("WebSocket read error: {}", e);
                    break;
                }
            }
        }
        let _ = reader_control.send(ControlSignal::Disconnected).await;
    });

    let handle = SessionHandle::new(session_id.clone(), params.clone(), mode, control_tx);
    state.sessions.register(handle).await;

    let capture = StreamCapture::new(
        CaptureConfig {
            sample_rate: config.audio.sample_rate,
            channels: config.audio.channels,
            queue_capacity: config.audio.frame_queue,
        },
        audio_rx,
    );
    let controller = SessionController::new(session_id.clone(), params, mode, sender);
    let runner_config = RunnerConfig {
        vad: config.vad.clone(),
        sample_rate: config.audio.sample_rate,
        provider_timeout: Duration::from_secs(config.providers.timeout_secs.max(1)),
    };

    let mut runner = SessionRunner::new(
        controller,
        dialogue_plan(&config, mode, question_count),
        state.services.clone(),
        Box::new(capture),
        control_rx,
        runner_config,
    );

    match runner.run().await {
        Ok(summary) => info!(
            "Session {} ended after {:.1}s ({} turns, completed={})",
            session_id,
            summary.duration_secs(),
            summary.turns.len(),
            summary.completed
        ),
        Err(e) => warn!("Session {} did not start: {}", session_id, e),
    }

    state.sessions.remove(&session_id).await;
    reader.abort();
    // Dropping the runner drops the last sender, so the writer drains and exits
    drop(runner);
    if let Err(e) = writer.await {
        warn!("Writer task failed: {}", e);
    }
}
