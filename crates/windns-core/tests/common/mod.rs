//! Test doubles and common utilities for record contract tests
//!
//! [`ScriptedTransport`] stands in for a remote host: it records every
//! payload it is asked to run and answers with queued outputs.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use windns_core::error::{Error, Result};
use windns_core::traits::{CommandOutput, RemoteTransport, TransportFactory};
use windns_core::{RecordClient, SessionConfig};

/// One scripted answer
pub enum Reply {
    /// Process ran; output is returned as-is
    Output(CommandOutput),
    /// Transport-level failure
    Fail(fn() -> Error),
}

/// A transport that records payloads and replays queued replies
pub struct ScriptedTransport {
    /// Call counter for execute()
    execute_call_count: Arc<AtomicUsize>,
    /// Payloads passed to execute()
    payloads: Arc<Mutex<Vec<String>>>,
    /// Replies, consumed front to back
    replies: Arc<Mutex<VecDeque<Reply>>>,
    /// Reply used once the queue is empty
    fallback: Arc<Mutex<Option<CommandOutput>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            execute_call_count: Arc::new(AtomicUsize::new(0)),
            payloads: Arc::new(Mutex::new(Vec::new())),
            replies: Arc::new(Mutex::new(VecDeque::new())),
            fallback: Arc::new(Mutex::new(None)),
        }
    }

    /// Queue an envelope printed on stdout with exit status 0
    pub fn reply(&self, envelope: &str) -> &Self {
        self.push(Reply::Output(CommandOutput::new(0, envelope.as_bytes().to_vec(), Vec::new())))
    }

    /// Queue a raw command output
    pub fn reply_output(&self, output: CommandOutput) -> &Self {
        self.push(Reply::Output(output))
    }

    /// Queue a transport failure
    pub fn fail(&self, error: fn() -> Error) -> &Self {
        self.push(Reply::Fail(error))
    }

    /// Answer every unqueued call with `envelope`
    pub fn always(&self, envelope: &str) -> &Self {
        *self.fallback.lock().unwrap() =
            Some(CommandOutput::new(0, envelope.as_bytes().to_vec(), Vec::new()));
        self
    }

    fn push(&self, reply: Reply) -> &Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    /// Get the number of times execute() was called
    pub fn execute_call_count(&self) -> usize {
        self.execute_call_count.load(Ordering::SeqCst)
    }

    /// Get every payload passed to execute()
    pub fn payloads(&self) -> Vec<String> {
        self.payloads.lock().unwrap().clone()
    }

    /// Create a new ScriptedTransport that shares state with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            execute_call_count: Arc::clone(&other.execute_call_count),
            payloads: Arc::clone(&other.payloads),
            replies: Arc::clone(&other.replies),
            fallback: Arc::clone(&other.fallback),
        }
    }
}

#[async_trait::async_trait]
impl RemoteTransport for ScriptedTransport {
    async fn execute(&self, command: &str) -> Result<CommandOutput> {
        self.execute_call_count.fetch_add(1, Ordering::SeqCst);
        self.payloads.lock().unwrap().push(command.to_string());

        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(Reply::Output(output)) => Ok(output),
            Some(Reply::Fail(error)) => Err(error()),
            None => self
                .fallback
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| Error::connection("no scripted reply left")),
        }
    }

    fn transport_name(&self) -> &'static str {
        "scripted"
    }
}

/// Factory handing out transports that share one script
pub struct ScriptedFactory {
    pub transport: ScriptedTransport,
}

impl TransportFactory for ScriptedFactory {
    fn create(&self, _config: &SessionConfig) -> Result<Box<dyn RemoteTransport>> {
        Ok(Box::new(ScriptedTransport::sharing_counters_with(
            &self.transport,
        )))
    }
}

/// Build a client over a transport sharing state with `transport`
pub fn client_for(transport: &ScriptedTransport) -> RecordClient {
    RecordClient::new(
        "dc1.example.com",
        Box::new(ScriptedTransport::sharing_counters_with(transport)),
    )
}

/// A success envelope listing `addresses` for www.example.com.
pub fn records_envelope(detail: &str, addresses: &[&str], ttl: u32) -> String {
    let records: Vec<serde_json::Value> = addresses
        .iter()
        .map(|address| {
            serde_json::json!({
                "type": "A",
                "name": "www",
                "zone": "example.com.",
                "data": address,
                "ttl": ttl,
            })
        })
        .collect();

    serde_json::json!({
        "code": 200,
        "detail": detail,
        "records": records,
    })
    .to_string()
}

/// Whether `payload` is an add of `address`
pub fn is_add_of(payload: &str, address: &str) -> bool {
    payload.contains("Add-DnsServerResourceRecord @createArgs")
        && payload.contains(&format!("$address = '{}'", address))
}

/// Whether `payload` is a delete of `address`
pub fn is_delete_of(payload: &str, address: &str) -> bool {
    payload.contains("Remove-DnsServerResourceRecord @deleteArgs")
        && payload.contains(&format!("$address = '{}'", address))
}
