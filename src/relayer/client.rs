//!
//! HTTP client for the shielded pool relayer.
//!
//! This module provides an async client for the relayer's REST surface: raw
//! commitment log reads, the pool info endpoint, transaction submission and
//! job polling. Submission retries transient failures under exponential
//! backoff; client-side errors are never retried. All methods are async and
//! designed for use with Tokio.

use super::types::*;

use async_trait::async_trait;
use backoff::{ExponentialBackoff, future::retry};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, info};

/// Relayer operations the reconciliation engine consumes.
///
/// Kept narrow so tests can substitute an in-process double for the real
/// HTTP client.
#[async_trait]
pub trait RelayerApi: Send + Sync {
	/// Fetch up to `limit` raw log entries starting at log index `offset`.
	async fn fetch_transactions(&self, offset: u64, limit: u64)
	-> Result<Vec<String>, RelayerError>;

	/// Current root and confirmed frontier of the commitment log.
	async fn info(&self) -> Result<RelayerInfo, RelayerError>;

	/// Submit a group of proved transactions; returns the job id to poll.
	async fn send_transactions(&self, txs: &[TxToSend]) -> Result<String, RelayerError>;

	/// Status of a submission job, `None` if the relayer does not know the id.
	async fn job(&self, id: &str) -> Result<Option<JobStatus>, RelayerError>;
}

/// Reqwest-backed relayer client.
#[derive(Clone)]
pub struct RelayerClient {
	/// The underlying HTTP client.
	http_client: Client,
	/// Base URL of the relayer API, without a trailing slash.
	base_url: String,
}

impl RelayerClient {
	/// Create a new relayer client.
	///
	/// # Arguments
	/// * `base_url` - Base URL of the relayer HTTP API.
	///
	/// # Returns
	/// A new `RelayerClient` instance.
	pub fn new(base_url: String) -> Self {
		let http_client = Client::builder()
			.timeout(Duration::from_secs(30))
			.build()
			.expect("Failed to create HTTP client");

		Self {
			http_client,
			base_url: base_url.trim_end_matches('/').to_string(),
		}
	}

	fn url(&self, path: &str) -> String {
		format!("{}/{}", self.base_url, path)
	}

	fn submission_backoff() -> ExponentialBackoff {
		ExponentialBackoff {
			max_elapsed_time: Some(Duration::from_secs(60)),
			..ExponentialBackoff::default()
		}
	}

	async fn get_json<T>(&self, url: &str) -> Result<T, RelayerError>
	where
		T: serde::de::DeserializeOwned,
	{
		let response = self.http_client.get(url).send().await?;
		let status = response.status();
		if !status.is_success() {
			return Err(RelayerError::Status {
				status: status.as_u16(),
				message: response.text().await.unwrap_or_default(),
			});
		}
		Ok(response.json().await?)
	}
}

#[async_trait]
impl RelayerApi for RelayerClient {
	/// Fetch a batch of raw commitment log entries.
	///
	/// # Arguments
	/// * `offset` - Log index of the first entry requested.
	/// * `limit` - Maximum number of entries to return.
	///
	/// # Returns
	/// The raw entries in log order; fewer than `limit` when the log ends.
	async fn fetch_transactions(
		&self,
		offset: u64,
		limit: u64,
	) -> Result<Vec<String>, RelayerError> {
		let url = format!(
			"{}?offset={}&limit={}",
			self.url("transactions"),
			offset,
			limit
		);
		debug!("Fetching log entries: {}", url);
		self.get_json(&url).await
	}

	async fn info(&self) -> Result<RelayerInfo, RelayerError> {
		self.get_json(&self.url("info")).await
	}

	/// Submit proved transactions for relaying.
	///
	/// Transport failures and server-side errors are retried under
	/// exponential backoff; HTTP 4xx responses fail immediately.
	async fn send_transactions(&self, txs: &[TxToSend]) -> Result<String, RelayerError> {
		let url = self.url("sendTransactions");
		info!("Submitting {} transaction(s) to relayer", txs.len());

		let response: SendTransactionsResponse = retry(Self::submission_backoff(), || async {
			let response = self
				.http_client
				.post(&url)
				.json(txs)
				.send()
				.await
				.map_err(|e| backoff::Error::transient(RelayerError::Transport(e)))?;

			let status = response.status();
			if !status.is_success() {
				let error = RelayerError::Status {
					status: status.as_u16(),
					message: response.text().await.unwrap_or_default(),
				};
				return if status.is_client_error() {
					Err(backoff::Error::permanent(error))
				} else {
					Err(backoff::Error::transient(error))
				};
			}

			response
				.json()
				.await
				.map_err(|e| backoff::Error::permanent(RelayerError::Transport(e)))
		})
		.await?;

		info!("Relayer accepted submission as job {}", response.job_id);
		Ok(response.job_id)
	}

	async fn job(&self, id: &str) -> Result<Option<JobStatus>, RelayerError> {
		let url = self.url(&format!("job/{}", id));
		let response = self.http_client.get(&url).send().await?;
		if response.status() == StatusCode::NOT_FOUND {
			return Ok(None);
		}
		let status = response.status();
		if !status.is_success() {
			return Err(RelayerError::Status {
				status: status.as_u16(),
				message: response.text().await.unwrap_or_default(),
			});
		}
		Ok(Some(response.json().await?))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use httpmock::prelude::*;
	use serde_json::json;

	#[tokio::test]
	async fn fetches_entries_with_offset_and_limit() {
		let server = MockServer::start_async().await;
		let mock = server
			.mock_async(|when, then| {
				when.method(GET)
					.path("/transactions")
					.query_param("offset", "256")
					.query_param("limit", "100");
				then.status(200).json_body(json!(["1aa", "0bb"]));
			})
			.await;

		let client = RelayerClient::new(server.base_url());
		let entries = client.fetch_transactions(256, 100).await.unwrap();

		mock.assert_async().await;
		assert_eq!(entries, vec!["1aa".to_string(), "0bb".to_string()]);
	}

	#[tokio::test]
	async fn info_handles_missing_delta_index() {
		let server = MockServer::start_async().await;
		server
			.mock_async(|when, then| {
				when.method(GET).path("/info");
				then.status(200).json_body(json!({"root": "0xroot"}));
			})
			.await;

		let client = RelayerClient::new(server.base_url());
		let info = client.info().await.unwrap();

		assert_eq!(info.root, "0xroot");
		assert_eq!(info.delta_index, None);
	}

	#[tokio::test]
	async fn submission_returns_job_id_and_rejects_client_errors_without_retry() {
		let server = MockServer::start_async().await;
		let accepted = server
			.mock_async(|when, then| {
				when.method(POST).path("/sendTransactions").json_body(json!([
					{
						"txKind": "transfer",
						"memo": "aabb",
						"proof": "ccdd"
					}
				]));
				then.status(200).json_body(json!({"jobId": "42"}));
			})
			.await;

		let client = RelayerClient::new(server.base_url());
		let txs = vec![TxToSend {
			tx_kind: TxKind::Transfer,
			memo: "aabb".into(),
			proof: "ccdd".into(),
			deposit_signature: None,
		}];
		assert_eq!(client.send_transactions(&txs).await.unwrap(), "42");
		accepted.assert_async().await;

		let server = MockServer::start_async().await;
		let rejected = server
			.mock_async(|when, then| {
				when.method(POST).path("/sendTransactions");
				then.status(400).body("Invalid proof");
			})
			.await;

		let client = RelayerClient::new(server.base_url());
		let err = client.send_transactions(&txs).await.unwrap_err();
		assert!(matches!(err, RelayerError::Status { status: 400, .. }));
		assert_eq!(rejected.hits_async().await, 1);
	}

	#[tokio::test]
	async fn unknown_job_is_none_and_known_job_decodes() {
		let server = MockServer::start_async().await;
		server
			.mock_async(|when, then| {
				when.method(GET).path("/job/missing");
				then.status(404);
			})
			.await;
		server
			.mock_async(|when, then| {
				when.method(GET).path("/job/42");
				then.status(200).json_body(json!({
					"state": "completed",
					"txHashes": ["0xabc"]
				}));
			})
			.await;

		let client = RelayerClient::new(server.base_url());

		assert!(client.job("missing").await.unwrap().is_none());
		let status = client.job("42").await.unwrap().unwrap();
		assert_eq!(status.state, JobState::Completed);
		assert_eq!(status.tx_hashes, vec!["0xabc".to_string()]);
		assert_eq!(status.failed_reason, None);
	}
}
