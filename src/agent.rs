//! VM lifecycle handling for the telemetry agent.
//!
//! [`Agent`] is the explicitly owned replacement for a process-wide agent
//! record. It holds the sink, the message format and the VM lifecycle flags.
//! Lifecycle callbacks run under one mutex so VM death cannot interleave with
//! start, init or the thread and resource callbacks; once death has been
//! observed those callbacks short-circuit.

use log::{debug, error, warn};
use parking_lot::Mutex;

use crate::{
    event::{AgentEvent, MessageFormat},
    sink::{SendStatus, TelemetrySink},
};

#[derive(Debug, Default)]
struct Lifecycle {
    started: bool,
    initialized: bool,
    dead: bool,
}

/// Routes VM events to a [`TelemetrySink`].
#[derive(Debug)]
pub struct Agent<S: TelemetrySink> {
    sink: S,
    format: MessageFormat,
    lifecycle: Mutex<Lifecycle>,
}

impl<S: TelemetrySink> Agent<S> {
    pub fn new(sink: S, format: MessageFormat) -> Self {
        Self {
            sink,
            format,
            lifecycle: Mutex::new(Lifecycle::default()),
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn format(&self) -> MessageFormat {
        self.format
    }

    pub fn is_started(&self) -> bool {
        self.lifecycle.lock().started
    }

    pub fn is_initialized(&self) -> bool {
        self.lifecycle.lock().initialized
    }

    pub fn is_dead(&self) -> bool {
        self.lifecycle.lock().dead
    }

    /// The VM has started: start the sink and report it.
    ///
    /// A sink that fails to start is logged; the VM must keep running.
    pub fn on_vm_start(&self) {
        let mut lifecycle = self.lifecycle.lock();
        lifecycle.started = true;
        if let Err(err) = self.sink.start() {
            error!("agent could not start telemetry sink: {err}");
        }
        self.emit(&AgentEvent::VmStart);
    }

    /// The VM finished initialising on `thread`.
    pub fn on_vm_init(&self, thread: impl Into<String>) {
        let mut lifecycle = self.lifecycle.lock();
        lifecycle.initialized = true;
        self.emit(&AgentEvent::VmInit {
            thread: thread.into(),
        });
    }

    /// The VM is going away: report it, drain what is pending, then stop.
    pub fn on_vm_death(&self) {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.dead {
            return;
        }
        lifecycle.dead = true;
        self.emit(&AgentEvent::VmDeath);
        if !self.sink.flush() {
            warn!("agent could not flush telemetry before VM death");
        }
        self.sink.stop();
    }

    /// Forward any other event.
    ///
    /// Thread and resource events can still arrive after VM death; those are
    /// discarded.
    pub fn on_event(&self, event: AgentEvent) {
        let guard = event.requires_live_vm().then(|| self.lifecycle.lock());
        if guard.as_ref().is_some_and(|lifecycle| lifecycle.dead) {
            debug!("agent discarded {event:?} after VM death");
            return;
        }
        self.emit(&event);
    }

    fn emit(&self, event: &AgentEvent) -> SendStatus {
        let status = self.sink.send(self.format.render(event));
        if !status.is_queued() {
            debug!("agent event not queued: {status:?}");
        }
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{event::ExceptionInfo, test_utils::CollectingSink};
    use rstest::{fixture, rstest};

    #[fixture]
    fn agent() -> Agent<CollectingSink> {
        Agent::new(CollectingSink::new(), MessageFormat::Text)
    }

    #[rstest]
    fn lifecycle_reports_in_order(agent: Agent<CollectingSink>) {
        agent.on_vm_start();
        agent.on_vm_init("main");
        agent.on_vm_death();

        let sink = agent.sink();
        assert_eq!(
            sink.collected(),
            [
                "VM Started (JVMTI_EVENT_VM_START)",
                "VMInit thread 'main' (JVMTI_EVENT_VM_INIT)",
                "VM Died (JVMTI_EVENT_VM_DEATH)",
            ]
        );
        assert_eq!(sink.starts(), 1);
        assert_eq!(sink.flushes(), 1);
        assert!(sink.is_stopped());
        assert!(agent.is_started() && agent.is_initialized() && agent.is_dead());
    }

    #[rstest]
    fn thread_events_after_death_are_discarded(agent: Agent<CollectingSink>) {
        agent.on_vm_start();
        agent.on_event(AgentEvent::ThreadStart {
            thread: "worker".into(),
        });
        agent.on_vm_death();
        agent.on_event(AgentEvent::ThreadEnd {
            thread: "worker".into(),
        });
        agent.on_event(AgentEvent::resource_exhausted(1, "heap"));

        let collected = agent.sink().collected();
        assert_eq!(collected.len(), 3);
        assert_eq!(collected[1], "ThreadStart: worker");
    }

    #[rstest]
    fn repeated_death_is_ignored(agent: Agent<CollectingSink>) {
        agent.on_vm_start();
        agent.on_vm_death();
        agent.on_vm_death();
        assert_eq!(agent.sink().flushes(), 1);
    }

    #[rstest]
    fn forwards_exceptions(agent: Agent<CollectingSink>) {
        agent.on_vm_start();
        agent.on_event(AgentEvent::Exception(ExceptionInfo {
            signature: "Ljava/lang/RuntimeException;".into(),
            message: "bad".into(),
            method: "main".into(),
            location: "line: 7".into(),
            stack_trace: Vec::new(),
        }));
        let collected = agent.sink().collected();
        assert!(collected[1].starts_with("Uncaught exception: Ljava/lang/RuntimeException;"));
    }

    #[rstest]
    fn json_format_applies_to_every_event() {
        let agent = Agent::new(CollectingSink::new(), MessageFormat::Json);
        agent.on_vm_start();
        let collected = agent.sink().collected();
        let value: serde_json::Value = serde_json::from_str(&collected[0]).expect("valid JSON");
        assert_eq!(value["event"], "vm_start");
    }

    #[rstest]
    fn start_failure_is_not_fatal() {
        let sink = CollectingSink::new();
        sink.start().expect("first start");
        let agent = Agent::new(sink, MessageFormat::Text);
        agent.on_vm_start();
        assert!(agent.is_started());
        assert_eq!(agent.sink().collected().len(), 1);
    }
}
