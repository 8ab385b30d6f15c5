//! Diagnostic event sink — the injected reporting collaborator.
//!
//! Resolvers and pipelines never print; every diagnostic flows through an
//! [`EventSink`] handed in by the embedder. The default sink discards
//! everything, keeping the core silent when embedded.

use serde::Serialize;
use std::sync::Mutex;

/// Severity of a diagnostic event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Context attached to a diagnostic event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EventContext {
    /// Configuration category the event concerns (e.g. "model", "dataset").
    pub category: Option<String>,
    /// Resolved component name, when known.
    pub component: Option<String>,
    /// Parameter name, for parameter-level diagnostics.
    pub parameter: Option<String>,
    /// Experiment run name, for pipeline/run diagnostics.
    pub run: Option<String>,
}

impl EventContext {
    /// Context for a category-level event (entry rejected before naming).
    pub fn category(category: &str) -> Self {
        Self {
            category: Some(category.to_string()),
            ..Self::default()
        }
    }

    /// Context for a component-level event.
    pub fn component(category: &str, component: &str) -> Self {
        Self {
            category: Some(category.to_string()),
            component: Some(component.to_string()),
            ..Self::default()
        }
    }

    /// Context for a parameter-level event.
    pub fn parameter(category: &str, component: &str, parameter: &str) -> Self {
        Self {
            category: Some(category.to_string()),
            component: Some(component.to_string()),
            parameter: Some(parameter.to_string()),
            ..Self::default()
        }
    }

    /// Context for a run-level event.
    pub fn run(run: &str) -> Self {
        Self {
            run: Some(run.to_string()),
            ..Self::default()
        }
    }
}

/// Receiver for diagnostic events.
///
/// Implementations must accept every event; logging or collecting is
/// optional. Sinks are shared across threads by concurrent runs.
pub trait EventSink: Send + Sync {
    fn emit(&self, severity: Severity, message: &str, context: &EventContext);
}

/// A sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _severity: Severity, _message: &str, _context: &EventContext) {}
}

/// A sink that forwards events to the `tracing` stack.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, severity: Severity, message: &str, context: &EventContext) {
        let component = context.component.as_deref().unwrap_or("-");
        match severity {
            Severity::Info => tracing::info!(component = %component, "{message}"),
            Severity::Warning => tracing::warn!(component = %component, "{message}"),
            Severity::Error => tracing::error!(component = %component, "{message}"),
        }
    }
}

/// A recorded diagnostic event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub severity: Severity,
    pub message: String,
    pub context: EventContext,
}

/// A sink that records events in memory, for inspection and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<Event>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded events, in emission order.
    pub fn events(&self) -> Vec<Event> {
        self.lock().clone()
    }

    /// Number of recorded events at or above `severity`.
    pub fn count_at_least(&self, severity: Severity) -> usize {
        let rank = |s: Severity| match s {
            Severity::Info => 0,
            Severity::Warning => 1,
            Severity::Error => 2,
        };
        self.lock()
            .iter()
            .filter(|e| rank(e.severity) >= rank(severity))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Event>> {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl EventSink for MemorySink {
    fn emit(&self, severity: Severity, message: &str, context: &EventContext) {
        self.lock().push(Event {
            severity,
            message: message.to_string(),
            context: context.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_constructors() {
        let ctx = EventContext::parameter("model", "Random", "seed");
        assert_eq!(ctx.category.as_deref(), Some("model"));
        assert_eq!(ctx.component.as_deref(), Some("Random"));
        assert_eq!(ctx.parameter.as_deref(), Some("seed"));
        assert_eq!(ctx.run, None);

        let ctx = EventContext::run("exp1");
        assert_eq!(ctx.run.as_deref(), Some("exp1"));
        assert_eq!(ctx.category, None);
    }

    #[test]
    fn test_memory_sink_records_in_order() {
        let sink = MemorySink::new();
        sink.emit(Severity::Info, "first", &EventContext::default());
        sink.emit(Severity::Warning, "second", &EventContext::category("model"));

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].message, "first");
        assert_eq!(events[1].severity, Severity::Warning);
        assert_eq!(events[1].context.category.as_deref(), Some("model"));
    }

    #[test]
    fn test_memory_sink_severity_counting() {
        let sink = MemorySink::new();
        sink.emit(Severity::Info, "a", &EventContext::default());
        sink.emit(Severity::Warning, "b", &EventContext::default());
        sink.emit(Severity::Error, "c", &EventContext::default());

        assert_eq!(sink.count_at_least(Severity::Info), 3);
        assert_eq!(sink.count_at_least(Severity::Warning), 2);
        assert_eq!(sink.count_at_least(Severity::Error), 1);
    }

    #[test]
    fn test_noop_sink_accepts_everything() {
        NoopSink.emit(Severity::Error, "dropped", &EventContext::default());
    }
}
