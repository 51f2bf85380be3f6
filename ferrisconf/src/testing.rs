//! Scripted collaborators for unit tests.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::file_copy::{CopyChannel, CopyConnector};
use crate::rpc::{Datastore, Operation, RpcErrorInfo, RpcReply};
use crate::transport::{Connector, RpcTransport, SessionConfig, TransportFault};

/// A call made on a mock collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Lock(Datastore),
    Unlock(Datastore),
    Dispatch(Operation),
    CloseSession,
    ScpOpen { host: String, port: u16 },
    ScpPut { local: PathBuf, remote: String },
    ScpClose,
}

/// Shared record of calls, kept by the test after the mock is moved.
#[derive(Debug, Clone, Default)]
pub(crate) struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    fn record(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }

    pub(crate) fn snapshot(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    /// Dispatched operations only, in order.
    pub(crate) fn operations(&self) -> Vec<Operation> {
        self.snapshot()
            .into_iter()
            .filter_map(|call| match call {
                Call::Dispatch(operation) => Some(operation),
                _ => None,
            })
            .collect()
    }
}

pub(crate) fn reply(xml: &str) -> RpcReply {
    RpcReply::parse(xml).unwrap()
}

pub(crate) fn ok_reply() -> RpcReply {
    reply("<rpc-reply xmlns=\"urn:ietf:params:xml:ns:netconf:base:1.0\" message-id=\"1\"><ok/></rpc-reply>")
}

pub(crate) fn rpc_fault(tag: &str, message: &str) -> TransportFault {
    TransportFault::Rpc(RpcErrorInfo {
        tag: tag.to_string(),
        error_type: Some("application".to_string()),
        severity: Some("error".to_string()),
        message: Some(message.to_string()),
        ..RpcErrorInfo::default()
    })
}

type Scripted = VecDeque<Result<RpcReply, TransportFault>>;

/// Transport answering from scripted queues; unscripted calls reply `<ok/>`.
pub(crate) struct MockTransport {
    calls: CallLog,
    connected: bool,
    lock_replies: Scripted,
    unlock_replies: Scripted,
    dispatch_replies: Scripted,
    close_fault: Option<TransportFault>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self {
            calls: CallLog::default(),
            connected: true,
            lock_replies: VecDeque::new(),
            unlock_replies: VecDeque::new(),
            dispatch_replies: VecDeque::new(),
            close_fault: None,
        }
    }

    pub(crate) fn calls(&self) -> CallLog {
        self.calls.clone()
    }

    pub(crate) fn disconnected(mut self) -> Self {
        self.connected = false;
        self
    }

    pub(crate) fn fail_lock(mut self, fault: TransportFault) -> Self {
        self.lock_replies.push_back(Err(fault));
        self
    }

    pub(crate) fn fail_unlock(mut self, fault: TransportFault) -> Self {
        self.unlock_replies.push_back(Err(fault));
        self
    }

    pub(crate) fn reply_dispatch(mut self, xml: &str) -> Self {
        self.dispatch_replies.push_back(Ok(reply(xml)));
        self
    }

    pub(crate) fn ok_dispatch(mut self) -> Self {
        self.dispatch_replies.push_back(Ok(ok_reply()));
        self
    }

    pub(crate) fn fail_dispatch(mut self, fault: TransportFault) -> Self {
        self.dispatch_replies.push_back(Err(fault));
        self
    }

    pub(crate) fn fail_close(mut self, fault: TransportFault) -> Self {
        self.close_fault = Some(fault);
        self
    }

    fn answer(&mut self, answer: Result<RpcReply, TransportFault>) -> Result<RpcReply, TransportFault> {
        if matches!(answer, Err(TransportFault::Disconnected)) {
            self.connected = false;
        }
        answer
    }
}

fn next(scripted: &mut Scripted) -> Result<RpcReply, TransportFault> {
    scripted.pop_front().unwrap_or_else(|| Ok(ok_reply()))
}

impl RpcTransport for MockTransport {
    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn lock(&mut self, target: Datastore) -> Result<RpcReply, TransportFault> {
        self.calls.record(Call::Lock(target));
        let answer = next(&mut self.lock_replies);
        self.answer(answer)
    }

    async fn unlock(&mut self, target: Datastore) -> Result<RpcReply, TransportFault> {
        self.calls.record(Call::Unlock(target));
        let answer = next(&mut self.unlock_replies);
        self.answer(answer)
    }

    async fn dispatch(&mut self, operation: &Operation) -> Result<RpcReply, TransportFault> {
        self.calls.record(Call::Dispatch(operation.clone()));
        let answer = next(&mut self.dispatch_replies);
        self.answer(answer)
    }

    async fn close_session(&mut self) -> Result<(), TransportFault> {
        self.calls.record(Call::CloseSession);
        self.connected = false;
        match self.close_fault.take() {
            Some(fault) => Err(fault),
            None => Ok(()),
        }
    }
}

/// Connector handing out one scripted transport or one connect fault.
pub(crate) struct MockConnector {
    outcome: Mutex<Option<Result<MockTransport, TransportFault>>>,
}

impl MockConnector {
    pub(crate) fn new(transport: MockTransport) -> Self {
        Self {
            outcome: Mutex::new(Some(Ok(transport))),
        }
    }

    pub(crate) fn failing(fault: TransportFault) -> Self {
        Self {
            outcome: Mutex::new(Some(Err(fault))),
        }
    }
}

impl Connector for MockConnector {
    type Transport = MockTransport;

    async fn connect(&self, _config: &SessionConfig) -> Result<MockTransport, TransportFault> {
        self.outcome
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Err(TransportFault::Other("connector already used".to_string())))
    }
}

/// Secure copy collaborator recording into the same call log.
pub(crate) struct MockCopier {
    calls: CallLog,
    fail_open: bool,
    fail_put: bool,
}

impl MockCopier {
    pub(crate) fn new(calls: CallLog) -> Self {
        Self {
            calls,
            fail_open: false,
            fail_put: false,
        }
    }

    pub(crate) fn fail_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub(crate) fn fail_put(mut self) -> Self {
        self.fail_put = true;
        self
    }
}

pub(crate) struct MockCopyChannel {
    calls: CallLog,
    fail_put: bool,
}

impl CopyConnector for MockCopier {
    type Channel = MockCopyChannel;

    async fn open(&self, config: &SessionConfig, port: u16) -> Result<MockCopyChannel, TransportFault> {
        self.calls.record(Call::ScpOpen {
            host: config.host.clone(),
            port,
        });
        if self.fail_open {
            return Err(TransportFault::Authentication {
                user: config.username.clone(),
            });
        }
        Ok(MockCopyChannel {
            calls: self.calls.clone(),
            fail_put: self.fail_put,
        })
    }
}

impl CopyChannel for MockCopyChannel {
    async fn put(&mut self, local: &Path, remote: &str) -> Result<(), TransportFault> {
        self.calls.record(Call::ScpPut {
            local: local.to_path_buf(),
            remote: remote.to_string(),
        });
        if self.fail_put {
            return Err(TransportFault::Disconnected);
        }
        Ok(())
    }

    async fn close(self) -> Result<(), TransportFault> {
        self.calls.record(Call::ScpClose);
        Ok(())
    }
}
