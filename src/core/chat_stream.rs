//! Client-side turn streaming.
//!
//! [`TurnStreamService`] submits one chat request to the relay and feeds
//! the response back as [`TurnMessage`]s over an unbounded channel: the
//! streamed body is run through a [`FrameDecoder`] and each candidate
//! line parsed as an [`Event`]; in single-shot mode the buffered body is
//! parsed as one [`AgentReply`]. A malformed line is logged and skipped,
//! never fatal. Transport failures become a single `Error` event so the
//! consumer always sees a well-formed message sequence ending in `End`.

use futures_util::StreamExt;
use tokio::sync::mpsc;

use crate::api::{AgentReply, ChatRequest, Event};
use crate::core::frame::FrameDecoder;
use crate::utils::url::construct_api_url;

#[derive(Clone, Debug)]
pub enum TurnMessage {
    Event(Event),
    Reply(AgentReply),
    End,
}

pub struct TurnParams {
    pub client: reqwest::Client,
    pub relay_url: String,
    pub request: ChatRequest,
    /// Single-shot mode: buffer the whole reply instead of streaming.
    pub single_shot: bool,
    pub max_carry_bytes: usize,
    pub cancel_token: tokio_util::sync::CancellationToken,
    pub turn_id: u64,
}

fn dispatch_line(line: &str, tx: &mpsc::UnboundedSender<(TurnMessage, u64)>, turn_id: u64) {
    match serde_json::from_str::<Event>(line) {
        Ok(event) => {
            let _ = tx.send((TurnMessage::Event(event), turn_id));
        }
        Err(e) => {
            tracing::warn!("skipping malformed frame: {e}");
        }
    }
}

fn transport_error_message(e: &reqwest::Error) -> String {
    if e.is_connect() {
        "Relay connection failed (Connection Refused)".to_string()
    } else {
        format!("Error: {e}")
    }
}

#[derive(Clone)]
pub struct TurnStreamService {
    tx: mpsc::UnboundedSender<(TurnMessage, u64)>,
}

impl TurnStreamService {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(TurnMessage, u64)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Submit one request and stream messages back until `End`.
    pub fn spawn_turn(&self, params: TurnParams) {
        let tx_clone = self.tx.clone();
        tokio::spawn(async move {
            let TurnParams {
                client,
                relay_url,
                request,
                single_shot,
                max_carry_bytes,
                cancel_token,
                turn_id,
            } = params;

            tokio::select! {
                _ = async {
                    let chat_url = construct_api_url(&relay_url, "api/chat");
                    let response = client
                        .post(chat_url)
                        .header("Content-Type", "application/json")
                        .json(&request)
                        .send()
                        .await;

                    let response = match response {
                        Ok(response) => response,
                        Err(e) => {
                            let _ = tx_clone.send((
                                TurnMessage::Event(Event::Error(transport_error_message(&e))),
                                turn_id,
                            ));
                            let _ = tx_clone.send((TurnMessage::End, turn_id));
                            return;
                        }
                    };

                    if single_shot {
                        Self::consume_single(response, &tx_clone, turn_id).await;
                    } else {
                        Self::consume_stream(response, max_carry_bytes, &tx_clone, turn_id).await;
                    }
                } => {}
                _ = cancel_token.cancelled() => {}
            }
        });
    }

    /// Streaming mode: decode the NDJSON body incrementally.
    ///
    /// The relay shapes its own failures as `error` event lines (even on
    /// HTTP 500), so the body is decoded the same way regardless of
    /// status.
    async fn consume_stream(
        response: reqwest::Response,
        max_carry_bytes: usize,
        tx: &mpsc::UnboundedSender<(TurnMessage, u64)>,
        turn_id: u64,
    ) {
        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "relay returned an error status");
        }

        let mut stream = response.bytes_stream();
        let mut decoder = FrameDecoder::with_max_carry(max_carry_bytes);

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    let _ = tx.send((
                        TurnMessage::Event(Event::Error(transport_error_message(&e))),
                        turn_id,
                    ));
                    let _ = tx.send((TurnMessage::End, turn_id));
                    return;
                }
            };

            match decoder.feed(&chunk) {
                Ok(lines) => {
                    for line in lines {
                        dispatch_line(&line, tx, turn_id);
                    }
                }
                Err(e) => {
                    let _ = tx.send((
                        TurnMessage::Event(Event::Error(format!("Error: {e}"))),
                        turn_id,
                    ));
                    let _ = tx.send((TurnMessage::End, turn_id));
                    return;
                }
            }
        }

        decoder.finish();
        let _ = tx.send((TurnMessage::End, turn_id));
    }

    /// Single-shot mode: buffer and parse one reply object.
    async fn consume_single(
        response: reqwest::Response,
        tx: &mpsc::UnboundedSender<(TurnMessage, u64)>,
        turn_id: u64,
    ) {
        match response.json::<AgentReply>().await {
            Ok(reply) => {
                let _ = tx.send((TurnMessage::Reply(reply), turn_id));
            }
            Err(e) => {
                let _ = tx.send((
                    TurnMessage::Event(Event::Error(format!("Error: {e}"))),
                    turn_id,
                ));
            }
        }
        let _ = tx.send((TurnMessage::End, turn_id));
    }
}
