// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! In-process fake prover speaking the line-delimited JSON protocol

use proofdriver::config::ProverConfig;
use proofdriver::session::protocol::{Command, ProverMessage, Request};
use proofdriver::ProverSession;
use serde_json::json;
use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt, BufReader};

/// How the fake prover reacts to one `sync`
#[derive(Debug, Clone, PartialEq)]
pub enum MockReply {
    /// `ok`, then the messages wrapped in running/idle task reports
    Messages(Vec<ProverMessage>),
    /// An idle report and outdated messages left over from the previous
    /// file, then `ok`, then the messages as for `Messages`
    AfterStaleIdle {
        stale: Vec<ProverMessage>,
        msgs: Vec<ProverMessage>,
    },
    /// `error` for the request
    Reject(String),
    /// No answer at all
    Hang,
}

/// Spawn the fake prover and return a session talking to it
///
/// `respond` gets the content of every `sync`; `info` requests are always
/// answered with an empty `ok`.
pub fn spawn_mock_lean(
    config: ProverConfig,
    mut respond: impl FnMut(&str) -> MockReply + Send + 'static,
) -> ProverSession {
    let (client_out, server_in) = duplex(1 << 16);
    let (server_out, client_in) = duplex(1 << 16);
    tokio::spawn(async move {
        let mut lines = BufReader::new(server_in).lines();
        let mut out = server_out;
        while let Ok(Some(line)) = lines.next_line().await {
            let Ok(request) = serde_json::from_str::<Request>(&line) else {
                continue;
            };
            let seq = request.seq_num;
            let replies = match request.command {
                Command::Info { .. } => vec![json!({"response": "ok", "seq_num": seq})],
                Command::Sync { content, .. } => match respond(&content) {
                    MockReply::Messages(msgs) => vec![
                        json!({"response": "current_tasks", "is_running": true, "tasks": []}),
                        json!({"response": "all_messages", "msgs": msgs}),
                        json!({"response": "ok", "seq_num": seq, "message": "file invalidated"}),
                        json!({"response": "current_tasks", "is_running": false, "tasks": []}),
                    ],
                    MockReply::AfterStaleIdle { stale, msgs } => vec![
                        json!({"response": "current_tasks", "is_running": false, "tasks": []}),
                        json!({"response": "all_messages", "msgs": stale}),
                        json!({"response": "ok", "seq_num": seq, "message": "file invalidated"}),
                        json!({"response": "current_tasks", "is_running": false, "tasks": []}),
                        json!({"response": "current_tasks", "is_running": true, "tasks": []}),
                        json!({"response": "all_messages", "msgs": msgs}),
                        json!({"response": "current_tasks", "is_running": false, "tasks": []}),
                    ],
                    MockReply::Reject(message) => {
                        vec![json!({"response": "error", "seq_num": seq, "message": message})]
                    }
                    MockReply::Hang => vec![],
                },
            };
            for reply in replies {
                let mut text = reply.to_string();
                text.push('\n');
                if out.write_all(text.as_bytes()).await.is_err() {
                    return;
                }
            }
        }
    });
    ProverSession::from_transport(client_in, client_out, config)
}
