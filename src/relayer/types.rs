//! Wire types for the relayer HTTP API.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pool summary returned by the relayer's info endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayerInfo {
    /// Current root of the commitment log.
    pub root: String,
    /// Index of the latest confirmed log entry, absent while the log has none.
    #[serde(rename = "deltaIndex")]
    pub delta_index: Option<u64>,
}

/// Elementary transaction kind understood by the relayer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    Deposit,
    Transfer,
    Withdraw,
}

/// One proved transaction ready for submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxToSend {
    /// The kind of transaction being relayed.
    #[serde(rename = "txKind")]
    pub tx_kind: TxKind,
    /// Encrypted memo as a hex string.
    pub memo: String,
    /// Serialized proof as a hex string.
    pub proof: String,
    /// Signature authorizing the token deposit; deposits only.
    #[serde(rename = "depositSignature", skip_serializing_if = "Option::is_none")]
    pub deposit_signature: Option<String>,
}

/// Handle returned by a batch submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendTransactionsResponse {
    #[serde(rename = "jobId")]
    pub job_id: String,
}

/// Lifecycle state of a submission job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// The relayer has accepted the job but not yet mined it.
    Pending,
    /// The relayer gave up on the job.
    Failed,
    /// Every transaction in the job is mined.
    Completed,
}

/// Status of a submission job as reported by the relayer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatus {
    pub state: JobState,
    /// Hashes of the mined transactions, populated on completion.
    #[serde(rename = "txHashes", default)]
    pub tx_hashes: Vec<String>,
    /// Relayer-supplied reason when the job failed.
    #[serde(rename = "failedReason", default)]
    pub failed_reason: Option<String>,
}

/// Errors from the relayer transport layer.
#[derive(Debug, Error)]
pub enum RelayerError {
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Relayer returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Decode(#[from] serde_json::Error),
}
