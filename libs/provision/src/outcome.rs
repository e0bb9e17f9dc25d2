//! Typed per-step results and operation-level classification.
//!
//! Every remote mutation inside a provisioning operation is recorded as one
//! [`StepReport`]; the ordered reports aggregate into an
//! [`OperationOutcome`] whose [`Classification`] drives the process exit
//! code. A step whose input id never materialized is `Skipped`, not
//! attempted with an invalid reference.

use gateway_client::GatewayError;

/// What to do when a later step of a multi-step creation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Record the failure and keep executing independent steps, leaving any
    /// already-created objects in place. The historical behavior.
    #[default]
    ContinueOnError,
    /// Delete already-created objects again (where the control plane exposes
    /// deletion) and classify the operation as failed.
    RollbackOnError,
}

/// Whether a creation checks for an existing equivalent object first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Idempotency {
    /// No pre-existence check: repeating a call creates a duplicate object.
    /// The historical behavior.
    #[default]
    AllowDuplicates,
    /// Query by tag first and reuse a matching existing object instead of
    /// creating another.
    ReuseExisting,
}

/// Result of one remote step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    /// The control plane accepted the mutation.
    Succeeded,
    /// The control plane answered and refused (validation, not-found,
    /// conflict, or an internal control-plane error).
    Rejected { status: u16, message: String },
    /// The control plane could not be reached or answered unreadably.
    TransportFailed { message: String },
    /// Not attempted: the step needs an id a prior failed step never
    /// produced.
    Skipped { waiting_on: String },
}

impl StepStatus {
    /// Fold a client error into a step status.
    #[must_use]
    pub fn from_error(err: &GatewayError) -> Self {
        match err {
            GatewayError::Rejected { status, message } => Self::Rejected {
                status: *status,
                message: message.clone(),
            },
            other => Self::TransportFailed {
                message: other.to_string(),
            },
        }
    }

    #[must_use]
    pub fn skipped(waiting_on: impl Into<String>) -> Self {
        Self::Skipped {
            waiting_on: waiting_on.into(),
        }
    }

    #[must_use]
    pub fn succeeded(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Succeeded => f.write_str("ok"),
            Self::Rejected { status, message } => {
                write!(f, "rejected by the control plane (HTTP {status}): {message}")
            }
            Self::TransportFailed { message } => write!(f, "failed: {message}"),
            Self::Skipped { waiting_on } => write!(f, "skipped ({waiting_on} unavailable)"),
        }
    }
}

/// One recorded step of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub step: String,
    pub status: StepStatus,
}

/// Operation-level result: success, partial failure, or failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Success,
    PartialFailure,
    Failure,
}

impl Classification {
    /// Process exit code for this classification.
    #[must_use]
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::PartialFailure => 2,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::PartialFailure => "partial failure",
            Self::Failure => "failure",
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered step reports of one provisioning operation.
#[derive(Debug, Clone, Default)]
pub struct OperationOutcome {
    steps: Vec<StepReport>,
    rolled_back: bool,
}

impl OperationOutcome {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a step with an explicit status.
    pub fn record(&mut self, step: impl Into<String>, status: StepStatus) {
        self.steps.push(StepReport {
            step: step.into(),
            status,
        });
    }

    /// Record a step from a client call result.
    pub fn record_result<T>(&mut self, step: impl Into<String>, result: &Result<T, GatewayError>) {
        let status = match result {
            Ok(_) => StepStatus::Succeeded,
            Err(err) => StepStatus::from_error(err),
        };
        self.record(step, status);
    }

    /// Mark that created objects were compensated away again.
    pub fn mark_rolled_back(&mut self) {
        self.rolled_back = true;
    }

    #[must_use]
    pub fn rolled_back(&self) -> bool {
        self.rolled_back
    }

    #[must_use]
    pub fn steps(&self) -> &[StepReport] {
        &self.steps
    }

    /// Steps that did not succeed, in execution order.
    pub fn failed_steps(&self) -> impl Iterator<Item = &StepReport> {
        self.steps.iter().filter(|s| !s.status.succeeded())
    }

    /// Classify the operation.
    ///
    /// A rolled-back operation is a failure regardless of which steps
    /// succeeded before the compensation ran: nothing usable is left
    /// remotely. An empty outcome (nothing needed doing) is a success.
    #[must_use]
    pub fn classification(&self) -> Classification {
        if self.rolled_back {
            return Classification::Failure;
        }
        let succeeded = self.steps.iter().filter(|s| s.status.succeeded()).count();
        if succeeded == self.steps.len() {
            Classification::Success
        } else if succeeded == 0 {
            Classification::Failure
        } else {
            Classification::PartialFailure
        }
    }
}
