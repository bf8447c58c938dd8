use log::Level;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: Level,
    pub target: &'static str,
    pub message: String,
}

/// Sink injected into the scene controller. Core code reports through it instead of a global
/// logger so hosts and tests decide where messages go.
pub trait Diagnostics {
    fn report(&mut self, diagnostic: Diagnostic);

    fn warn(&mut self, target: &'static str, message: String) {
        self.report(Diagnostic {
            level: Level::Warn,
            target,
            message,
        })
    }

    fn info(&mut self, target: &'static str, message: String) {
        self.report(Diagnostic {
            level: Level::Info,
            target,
            message,
        })
    }

    fn debug(&mut self, target: &'static str, message: String) {
        self.report(Diagnostic {
            level: Level::Debug,
            target,
            message,
        })
    }
}

/// Forwards to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn report(&mut self, diagnostic: Diagnostic) {
        log::log!(target: diagnostic.target, diagnostic.level, "{}", diagnostic.message);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullDiagnostics;

impl Diagnostics for NullDiagnostics {
    fn report(&mut self, _diagnostic: Diagnostic) {}
}

/// Keeps every diagnostic, optionally forwarding it to `log` as well.
#[derive(Debug, Clone, Default)]
pub struct BufferedDiagnostics {
    entries: Vec<Diagnostic>,
    forward: bool,
}

impl BufferedDiagnostics {
    pub fn new(forward: bool) -> Self {
        Self {
            entries: vec![],
            forward,
        }
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn count(&self, level: Level) -> usize {
        self.entries.iter().filter(|d| d.level == level).count()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Diagnostics for BufferedDiagnostics {
    fn report(&mut self, diagnostic: Diagnostic) {
        if self.forward {
            LogDiagnostics.report(diagnostic.clone());
        }
        self.entries.push(diagnostic);
    }
}

#[test]
fn test_buffered_diagnostics() {
    let mut sink = BufferedDiagnostics::new(false);
    sink.warn("vpvl2::test", "missing bone".to_owned());
    sink.debug("vpvl2::test", "tick".to_owned());
    assert_eq!(1, sink.count(Level::Warn));
    assert_eq!("missing bone", sink.entries()[0].message);
    sink.clear();
    assert!(sink.entries().is_empty());
}
