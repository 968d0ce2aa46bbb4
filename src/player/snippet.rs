// Snippet lifecycle
//
//   Idle -> Starting -> Playing -> CutOff
//                               \-> Ended
//
// One tracker per play call, owned by that call's watcher task. on_start fires
// on the only Starting -> Playing transition and on_finish on the first move
// into a terminal phase, so a natural end racing the cutoff deadline can
// notify at most once.

use super::SnippetCallbacks;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnippetPhase {
    Idle,
    // Play issued, backend has not reported playing yet
    Starting,
    Playing,
    // Stopped by the snippet timer
    CutOff,
    // Source reached its natural end
    Ended,
}

impl SnippetPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, SnippetPhase::CutOff | SnippetPhase::Ended)
    }
}

pub struct SnippetTracker {
    phase: SnippetPhase,
    callbacks: SnippetCallbacks,
}

impl SnippetTracker {
    pub fn new(callbacks: SnippetCallbacks) -> Self {
        SnippetTracker {
            phase: SnippetPhase::Idle,
            callbacks,
        }
    }

    pub fn phase(&self) -> SnippetPhase {
        self.phase
    }

    pub fn begin(&mut self) {
        if self.phase == SnippetPhase::Idle {
            self.phase = SnippetPhase::Starting;
        }
    }

    // Returns true only for the first playing transition
    pub fn mark_playing(&mut self) -> bool {
        if self.phase != SnippetPhase::Starting {
            return false;
        }
        self.phase = SnippetPhase::Playing;
        tracing::debug!("Snippet started");
        if let Some(on_start) = self.callbacks.on_start.take() {
            on_start();
        }
        true
    }

    pub fn cut_off(&mut self) -> bool {
        self.finish(SnippetPhase::CutOff)
    }

    pub fn ended(&mut self) -> bool {
        self.finish(SnippetPhase::Ended)
    }

    // Only a playing snippet can finish: on_start always precedes on_finish
    fn finish(&mut self, terminal: SnippetPhase) -> bool {
        if self.phase != SnippetPhase::Playing {
            return false;
        }
        self.phase = terminal;
        tracing::debug!("Snippet finished: {:?}", terminal);
        if let Some(on_finish) = self.callbacks.on_finish.take() {
            on_finish();
        }
        true
    }
}
