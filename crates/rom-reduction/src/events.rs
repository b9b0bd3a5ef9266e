//! Diagnostic events emitted while bases are computed.
//!
//! Callers subscribe by passing a [`DiagnosticSink`]; any
//! `FnMut(ReductionEvent)` closure qualifies. Sinks observe only and cannot
//! alter the computation.

#[derive(Debug, Clone, PartialEq)]
pub enum ReductionEvent {
    Started {
        strategy: &'static str,
        rank: usize,
    },
    /// One optimizer step of the gradient-descent strategy.
    OptimizerStep {
        iteration: usize,
        iterations: usize,
        loss: f64,
    },
    /// The optimizer finished without lowering the loss below its start value.
    OptimizerStalled { initial_loss: f64, final_loss: f64 },
    /// `Wᵗ·V` deviates from identity more than expected for this strategy.
    BiorthogonalityDrift { defect: f64 },
    ExternalSolverCall { solver: String },
    Finished {
        strategy: &'static str,
        rank: usize,
        elapsed_s: f64,
    },
}

pub trait DiagnosticSink {
    fn emit(&mut self, event: ReductionEvent);
}

impl<F: FnMut(ReductionEvent)> DiagnosticSink for F {
    fn emit(&mut self, event: ReductionEvent) {
        self(event)
    }
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn emit(&mut self, _event: ReductionEvent) {}
}
