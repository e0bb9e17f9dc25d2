//! Per-analysis identity provisioning.
//!
//! One analysis run gets one consumer, one membership in the project's
//! group, and one API key. The three creations are independent remote
//! objects with no atomicity: a failure after the consumer exists leaves an
//! under-provisioned identity behind (present, but not authorized and/or
//! not keyed). Deletion is not exposed for consumers in this system, so
//! there is no compensation here — the report carries what happened.

use gateway_client::{
    Consumer, GatewayClient, KeyCredential, AclMembership, NewAclMembership, NewConsumer,
    NewKeyCredential,
};

use crate::outcome::{OperationOutcome, StepStatus};

const STEP_CONSUMER: &str = "consumer";
const STEP_MEMBERSHIP: &str = "acl membership";
const STEP_API_KEY: &str = "api key";

/// Outcome of an analysis registration.
#[derive(Debug)]
pub struct AnalysisReport {
    pub consumer: Option<Consumer>,
    pub membership: Option<AclMembership>,
    pub credential: Option<KeyCredential>,
    pub outcome: OperationOutcome,
}

impl AnalysisReport {
    /// The issued API key, when provisioning got that far.
    ///
    /// The control plane is the system of record for the secret; this is
    /// the one place it surfaces.
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.credential.as_ref().map(|c| c.key.as_str())
    }
}

/// Provisions consumer identities for analysis runs.
pub struct AnalysisProvisioner {
    gateway: GatewayClient,
}

impl AnalysisProvisioner {
    #[must_use]
    pub fn new(gateway: GatewayClient) -> Self {
        Self { gateway }
    }

    /// Register an analysis for a project.
    ///
    /// Sequence: create the consumer, grant it membership in the project
    /// group, issue its API key. When consumer creation fails the two
    /// dependent steps are skipped — they would reference an id that never
    /// came to exist. The membership and key steps are independent of each
    /// other; a failure in one does not prevent the other.
    pub async fn register(&self, project: &str, analysis: &str) -> AnalysisReport {
        let mut outcome = OperationOutcome::new();
        let tags = vec![project.to_owned()];

        let created = self
            .gateway
            .create_consumer(&NewConsumer {
                username: analysis.to_owned(),
                custom_id: analysis.to_owned(),
                tags: tags.clone(),
            })
            .await;
        outcome.record_result(STEP_CONSUMER, &created);

        let consumer = match created {
            Ok(consumer) => {
                tracing::info!(consumer_id = %consumer.id, project, analysis, "consumer created");
                consumer
            }
            Err(_) => {
                outcome.record(STEP_MEMBERSHIP, StepStatus::skipped(STEP_CONSUMER));
                outcome.record(STEP_API_KEY, StepStatus::skipped(STEP_CONSUMER));
                return AnalysisReport {
                    consumer: None,
                    membership: None,
                    credential: None,
                    outcome,
                };
            }
        };

        let membership_result = self
            .gateway
            .create_acl_for_consumer(
                consumer.id,
                &NewAclMembership {
                    group: project.to_owned(),
                    tags: tags.clone(),
                },
            )
            .await;
        outcome.record_result(STEP_MEMBERSHIP, &membership_result);
        if let Ok(membership) = &membership_result {
            tracing::info!(consumer_id = %consumer.id, group = %membership.group, "group membership granted");
        }

        let credential_result = self
            .gateway
            .create_key_auth_for_consumer(consumer.id, &NewKeyCredential { tags })
            .await;
        outcome.record_result(STEP_API_KEY, &credential_result);
        if credential_result.is_ok() {
            // The key value itself never goes through the log stream.
            tracing::info!(consumer_id = %consumer.id, "api key issued");
        }

        AnalysisReport {
            consumer: Some(consumer),
            membership: membership_result.ok(),
            credential: credential_result.ok(),
            outcome,
        }
    }
}
