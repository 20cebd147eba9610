//! Scripted store connection for tests: replies are queued up front, every
//! request is recorded in packed wire form.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use redis::aio::ConnectionLike;
use redis::{Cmd, Pipeline, RedisFuture, RedisResult, Value};

#[derive(Clone, Default)]
pub struct ScriptedConn {
    cmd_replies: Arc<Mutex<VecDeque<RedisResult<Value>>>>,
    pipe_replies: Arc<Mutex<VecDeque<RedisResult<Vec<Value>>>>>,
    sent_cmds: Arc<Mutex<Vec<Vec<u8>>>>,
    sent_pipes: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl ScriptedConn {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the reply for the next single-command round trip.
    pub fn push_cmd(&self, reply: RedisResult<Value>) {
        self.cmd_replies.lock().unwrap().push_back(reply);
    }

    /// Queue the reply for the next pipelined round trip.
    pub fn push_pipe(&self, reply: RedisResult<Vec<Value>>) {
        self.pipe_replies.lock().unwrap().push_back(reply);
    }

    /// Packed wire bytes of every single command sent so far.
    pub fn sent_cmds(&self) -> Vec<Vec<u8>> {
        self.sent_cmds.lock().unwrap().clone()
    }

    /// Packed wire bytes of every pipeline sent so far.
    pub fn sent_pipes(&self) -> Vec<Vec<u8>> {
        self.sent_pipes.lock().unwrap().clone()
    }
}

impl ConnectionLike for ScriptedConn {
    fn req_packed_command<'a>(&'a mut self, cmd: &'a Cmd) -> RedisFuture<'a, Value> {
        self.sent_cmds.lock().unwrap().push(cmd.get_packed_command());
        // An unscripted round trip answers nil, which the caller will
        // surface as a reply-shape error rather than hanging the test.
        let reply = self
            .cmd_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(Value::Nil));
        Box::pin(async move { reply })
    }

    fn req_packed_commands<'a>(
        &'a mut self,
        cmd: &'a Pipeline,
        _offset: usize,
        _count: usize,
    ) -> RedisFuture<'a, Vec<Value>> {
        self.sent_pipes
            .lock()
            .unwrap()
            .push(cmd.get_packed_pipeline());
        let reply = self
            .pipe_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(Vec::new()));
        Box::pin(async move { reply })
    }

    fn get_db(&self) -> i64 {
        0
    }
}
