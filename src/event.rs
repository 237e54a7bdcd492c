//! Agent events and their wire encodings.
//!
//! Every VM callback the agent reacts to is described by one [`AgentEvent`].
//! The text encoding reproduces the agent's human-readable lines; the JSON
//! encoding wraps the same event in an object with an RFC 3339 timestamp so
//! collectors can parse it without scraping text.

use std::{fmt, str::FromStr};

use chrono::{DateTime, SecondsFormat, Utc};
use log::warn;
use serde::Serialize;

/// JVMTI resource-exhausted flag bits.
pub const RESOURCE_EXHAUSTED_OOM_ERROR: i32 = 0x0001;
pub const RESOURCE_EXHAUSTED_JAVA_HEAP: i32 = 0x0002;
pub const RESOURCE_EXHAUSTED_THREADS: i32 = 0x0004;

/// Which resource the VM ran out of.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    OutOfMemory,
    JavaHeap,
    Threads,
    Unknown,
}

impl ResourceKind {
    /// Classify the flag word delivered with a resource-exhausted event.
    ///
    /// The VM usually reports heap exhaustion as `OOM_ERROR | JAVA_HEAP`, so
    /// the more specific bits win over the generic OOM bit.
    pub fn from_flags(flags: i32) -> Self {
        if flags & RESOURCE_EXHAUSTED_JAVA_HEAP != 0 {
            Self::JavaHeap
        } else if flags & RESOURCE_EXHAUSTED_THREADS != 0 {
            Self::Threads
        } else if flags & RESOURCE_EXHAUSTED_OOM_ERROR != 0 {
            Self::OutOfMemory
        } else {
            Self::Unknown
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::OutOfMemory => "Out Of Memory Error",
            Self::JavaHeap => "Exhausted Java Heap",
            Self::Threads => "Exhausted threads",
            Self::Unknown => "Unknown",
        }
    }
}

/// Details of a thrown or caught exception.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ExceptionInfo {
    /// Type signature of the exception class, e.g. `Ljava/lang/IllegalStateException;`.
    pub signature: String,
    /// Result of `getMessage()`, empty when it returned null.
    pub message: String,
    /// Method in which the event occurred.
    pub method: String,
    /// Rendered location within `method`, e.g. `line: 42`.
    pub location: String,
    /// One entry per frame, innermost first.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stack_trace: Vec<String>,
}

/// One observation reported by the agent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AgentEvent {
    VmStart,
    VmInit {
        thread: String,
    },
    VmDeath,
    MethodEntry {
        method: String,
    },
    MethodExit {
        method: String,
        popped_by_exception: bool,
    },
    Exception(ExceptionInfo),
    ExceptionCatch(ExceptionInfo),
    ThreadStart {
        thread: String,
    },
    ThreadEnd {
        thread: String,
    },
    ResourceExhausted {
        kind: ResourceKind,
        description: String,
    },
}

impl AgentEvent {
    /// Build a resource-exhausted event from the raw callback arguments.
    pub fn resource_exhausted(flags: i32, description: impl Into<String>) -> Self {
        Self::ResourceExhausted {
            kind: ResourceKind::from_flags(flags),
            description: description.into(),
        }
    }

    /// Events that only describe a live VM and are meaningless after death.
    pub fn requires_live_vm(&self) -> bool {
        matches!(
            self,
            Self::ThreadStart { .. } | Self::ThreadEnd { .. } | Self::ResourceExhausted { .. }
        )
    }
}

impl fmt::Display for AgentEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VmStart => f.write_str("VM Started (JVMTI_EVENT_VM_START)"),
            Self::VmInit { thread } => write!(f, "VMInit thread '{thread}' (JVMTI_EVENT_VM_INIT)"),
            Self::VmDeath => f.write_str("VM Died (JVMTI_EVENT_VM_DEATH)"),
            Self::MethodEntry { method } => write!(f, "Enter Method: {method}"),
            Self::MethodExit {
                method,
                popped_by_exception,
            } => {
                write!(f, "Exit Method : {method}")?;
                if *popped_by_exception {
                    f.write_str(" (popped_by_exception)")?;
                }
                Ok(())
            }
            Self::Exception(info) => {
                write!(
                    f,
                    "Uncaught exception: {}, message: '{}'\n\tin method: {} [{}]\nStack trace:",
                    info.signature, info.message, info.method, info.location
                )?;
                for frame in &info.stack_trace {
                    write!(f, "\n\t{frame}")?;
                }
                Ok(())
            }
            Self::ExceptionCatch(info) => write!(
                f,
                "Caught exception: {}, message: '{}'\n\tin method: {} [{}]",
                info.signature, info.message, info.method, info.location
            ),
            Self::ThreadStart { thread } => write!(f, "ThreadStart: {thread}"),
            Self::ThreadEnd { thread } => write!(f, "ThreadEnd: {thread}"),
            Self::ResourceExhausted { kind, description } => {
                write!(f, "VM died: {}, {description}", kind.label())
            }
        }
    }
}

/// Wire encoding used for outgoing events.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MessageFormat {
    #[default]
    Text,
    Json,
}

#[derive(Serialize)]
struct SerializableEvent<'a> {
    timestamp: String,
    #[serde(flatten)]
    event: &'a AgentEvent,
}

impl MessageFormat {
    /// Encode `event` stamped with the current time.
    pub fn render(self, event: &AgentEvent) -> String {
        self.render_at(event, Utc::now())
    }

    /// Encode `event` stamped with `timestamp`.
    pub fn render_at(self, event: &AgentEvent, timestamp: DateTime<Utc>) -> String {
        match self {
            Self::Text => event.to_string(),
            Self::Json => {
                let serialisable = SerializableEvent {
                    timestamp: timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
                    event,
                };
                serde_json::to_string(&serialisable).unwrap_or_else(|err| {
                    warn!("failed to encode {event:?} as JSON: {err}");
                    event.to_string()
                })
            }
        }
    }
}

impl FromStr for MessageFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown message format {other:?}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn sample_exception() -> ExceptionInfo {
        ExceptionInfo {
            signature: "Ljava/lang/IllegalStateException;".into(),
            message: "boom".into(),
            method: "run".into(),
            location: "line: 42".into(),
            stack_trace: vec!["com.example.Main.run".into(), "com.example.Main.main".into()],
        }
    }

    #[rstest]
    #[case(AgentEvent::VmStart, "VM Started (JVMTI_EVENT_VM_START)")]
    #[case(
        AgentEvent::VmInit { thread: "main".into() },
        "VMInit thread 'main' (JVMTI_EVENT_VM_INIT)"
    )]
    #[case(AgentEvent::VmDeath, "VM Died (JVMTI_EVENT_VM_DEATH)")]
    #[case(
        AgentEvent::MethodExit { method: "run".into(), popped_by_exception: true },
        "Exit Method : run (popped_by_exception)"
    )]
    #[case(AgentEvent::ThreadEnd { thread: "worker-1".into() }, "ThreadEnd: worker-1")]
    #[case(
        AgentEvent::resource_exhausted(RESOURCE_EXHAUSTED_THREADS, "unable to create thread"),
        "VM died: Exhausted threads, unable to create thread"
    )]
    fn renders_text_lines(#[case] event: AgentEvent, #[case] expected: &str) {
        assert_eq!(MessageFormat::Text.render(&event), expected);
    }

    #[rstest]
    fn exception_text_includes_stack_trace() {
        let text = AgentEvent::Exception(sample_exception()).to_string();
        assert!(text.starts_with("Uncaught exception: Ljava/lang/IllegalStateException;, message: 'boom'"));
        assert!(text.contains("\n\tin method: run [line: 42]"));
        assert!(text.ends_with("Stack trace:\n\tcom.example.Main.run\n\tcom.example.Main.main"));
    }

    #[rstest]
    #[case(RESOURCE_EXHAUSTED_OOM_ERROR, ResourceKind::OutOfMemory)]
    #[case(RESOURCE_EXHAUSTED_JAVA_HEAP, ResourceKind::JavaHeap)]
    #[case(RESOURCE_EXHAUSTED_OOM_ERROR | RESOURCE_EXHAUSTED_JAVA_HEAP, ResourceKind::JavaHeap)]
    #[case(RESOURCE_EXHAUSTED_OOM_ERROR | RESOURCE_EXHAUSTED_THREADS, ResourceKind::Threads)]
    #[case(0, ResourceKind::Unknown)]
    fn classifies_resource_flags(#[case] flags: i32, #[case] expected: ResourceKind) {
        assert_eq!(ResourceKind::from_flags(flags), expected);
    }

    #[rstest]
    fn json_wraps_event_with_timestamp() {
        let at = Utc
            .with_ymd_and_hms(2024, 5, 1, 12, 30, 0)
            .single()
            .expect("valid timestamp");
        let rendered =
            MessageFormat::Json.render_at(&AgentEvent::VmInit { thread: "main".into() }, at);
        let value: serde_json::Value = serde_json::from_str(&rendered).expect("valid JSON");
        assert_eq!(value["timestamp"], "2024-05-01T12:30:00.000Z");
        assert_eq!(value["event"], "vm_init");
        assert_eq!(value["thread"], "main");
        assert!(!rendered.contains('\n'));
    }

    #[rstest]
    fn json_flattens_exception_details() {
        let rendered = MessageFormat::Json.render(&AgentEvent::ExceptionCatch(sample_exception()));
        let value: serde_json::Value = serde_json::from_str(&rendered).expect("valid JSON");
        assert_eq!(value["event"], "exception_catch");
        assert_eq!(value["signature"], "Ljava/lang/IllegalStateException;");
        assert_eq!(value["stack_trace"][1], "com.example.Main.main");
    }

    #[rstest]
    #[case("text", MessageFormat::Text)]
    #[case(" JSON ", MessageFormat::Json)]
    fn parses_format_names(#[case] input: &str, #[case] expected: MessageFormat) {
        assert_eq!(input.parse::<MessageFormat>(), Ok(expected));
    }

    #[rstest]
    fn rejects_unknown_format() {
        assert!("xml".parse::<MessageFormat>().is_err());
    }
}
