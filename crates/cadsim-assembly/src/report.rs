//! Recoverable problems collected during a run.

use std::fmt;

use cadsim_ir::{DefinitionId, MateType, OccurrencePath};
use tracing::warn;

/// One recoverable problem. Never aborts the run.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// A mate endpoint is suppressed or has no enclosing rigid body; the mate
    /// was dropped.
    UnresolvedMate {
        /// Mate name.
        mate: String,
        /// Endpoint that failed to resolve.
        path: OccurrencePath,
    },
    /// Both endpoints resolved to the same rigid body; the mate was dropped.
    SelfMate {
        /// Mate name.
        mate: String,
        /// The shared body.
        body: String,
    },
    /// The mate type has no joint mapping; the mate was dropped.
    UnsupportedMate {
        /// Mate name.
        mate: String,
        /// Its type.
        mate_type: MateType,
    },
    /// A rigid body has no usable mass; zero mass was substituted.
    ZeroMass {
        /// Body name.
        body: String,
        /// Occurrence path of the body.
        path: OccurrencePath,
    },
    /// Fetching data for a definition failed; defaults were used.
    FetchFailed {
        /// Definition.
        id: DefinitionId,
        /// What was being fetched.
        what: &'static str,
        /// Collaborator error text.
        reason: String,
    },
    /// A mate frame rotation is not orthonormal; identity rotation was used.
    DegenerateFrame {
        /// Mate name.
        mate: String,
    },
}

impl Diagnostic {
    /// Whether this diagnostic means a mate did not become a joint.
    pub fn is_dropped_mate(&self) -> bool {
        matches!(
            self,
            Diagnostic::UnresolvedMate { .. }
                | Diagnostic::SelfMate { .. }
                | Diagnostic::UnsupportedMate { .. }
        )
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UnresolvedMate { mate, path } => {
                write!(f, "mate '{mate}' dropped: {path} does not resolve to a rigid body")
            }
            Diagnostic::SelfMate { mate, body } => {
                write!(f, "mate '{mate}' dropped: both sides belong to {body}")
            }
            Diagnostic::UnsupportedMate { mate, mate_type } => {
                write!(f, "mate '{mate}' dropped: {} has no joint mapping", mate_type.as_str())
            }
            Diagnostic::ZeroMass { body, path } => {
                write!(f, "rigid body {body} ({path}) has no mass properties")
            }
            Diagnostic::FetchFailed { id, what, reason } => {
                write!(f, "could not fetch {what} for {id}: {reason}")
            }
            Diagnostic::DegenerateFrame { mate } => {
                write!(f, "mate '{mate}' has non-orthonormal axes, rotation reset")
            }
        }
    }
}

/// Diagnostics accumulated over one conversion run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    diagnostics: Vec<Diagnostic>,
}

impl RunReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic and log it.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        warn!("{diagnostic}");
        self.diagnostics.push(diagnostic);
    }

    /// Append every diagnostic from `other` without logging again.
    pub fn merge(&mut self, other: RunReport) {
        self.diagnostics.extend(other.diagnostics);
    }

    /// All diagnostics in the order they were raised.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Whether nothing was reported.
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Number of mates that did not become joints.
    pub fn dropped_mates(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_dropped_mate()).count()
    }

    /// Number of rigid bodies finalized with zero mass.
    pub fn zero_mass_bodies(&self) -> usize {
        self.count(|d| matches!(d, Diagnostic::ZeroMass { .. }))
    }

    /// Number of failed fetches.
    pub fn failed_fetches(&self) -> usize {
        self.count(|d| matches!(d, Diagnostic::FetchFailed { .. }))
    }

    /// Number of mate frames whose rotation was reset.
    pub fn degenerate_frames(&self) -> usize {
        self.count(|d| matches!(d, Diagnostic::DegenerateFrame { .. }))
    }

    fn count(&self, pred: impl Fn(&Diagnostic) -> bool) -> usize {
        self.diagnostics.iter().filter(|d| pred(d)).count()
    }

    /// One-line summary for the end of a run.
    pub fn summary(&self) -> String {
        format!(
            "{} dropped mates, {} zero-mass bodies, {} failed fetches, {} degenerate frames",
            self.dropped_mates(),
            self.zero_mass_bodies(),
            self.failed_fetches(),
            self.degenerate_frames()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts() {
        let mut report = RunReport::new();
        assert!(report.is_clean());
        report.push(Diagnostic::UnresolvedMate {
            mate: "m1".into(),
            path: OccurrencePath::from(&["A"][..]),
        });
        report.push(Diagnostic::UnsupportedMate {
            mate: "m2".into(),
            mate_type: MateType::PinSlot,
        });
        report.push(Diagnostic::ZeroMass {
            body: "wheel_0".into(),
            path: OccurrencePath::from(&["W"][..]),
        });
        assert_eq!(report.dropped_mates(), 2);
        assert_eq!(report.zero_mass_bodies(), 1);
        assert_eq!(report.failed_fetches(), 0);
        assert_eq!(
            report.summary(),
            "2 dropped mates, 1 zero-mass bodies, 0 failed fetches, 0 degenerate frames"
        );
    }

    #[test]
    fn test_display_names_the_offender() {
        let d = Diagnostic::UnresolvedMate {
            mate: "Revolute 3".into(),
            path: OccurrencePath::from(&["S", "P"][..]),
        };
        assert_eq!(d.to_string(), "mate 'Revolute 3' dropped: S/P does not resolve to a rigid body");
    }
}
