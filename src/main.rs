use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use shielded_state_sync::account::{self, AccountKey, PoolContext, PoolParams, SyncCoordinator};
use shielded_state_sync::crypto::MockPoolCrypto;
use shielded_state_sync::relayer::{RelayerClient, TxKind};
use shielded_state_sync::transfer::{TransferPipeline, estimate_fee, max_available_transfer};
use shielded_state_sync::utils::format_token_amount;

#[tokio::main(flavor = "current_thread")]
async fn main() {
	// Initialize tracing subscriber with debug logging for the sync engine
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::from_default_env()
				.add_directive("shielded_state_sync=debug".parse().unwrap())
				.add_directive(tracing::Level::INFO.into()),
		)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.with_timer(tracing_subscriber::fmt::time::time())
		.init();

	info!("Starting shielded pool client");

	let relayer_url =
		std::env::var("RELAYER_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

	let params = PoolParams::default();

	let key_hex = "2e347e236daa04faad881f1dc5dc3b8a9b4e8e4429e9d0728aad78ada199b66b".to_string(); //account::generate_random_key();
	let key = match AccountKey::from_hex(&key_hex) {
		Some(key) => key,
		None => {
			error!("Account key is not 32 bytes of hex");
			return;
		}
	};

	let destination_hex = account::generate_random_key();
	let destination_key = match AccountKey::from_hex(&destination_hex) {
		Some(key) => key,
		None => {
			error!("Destination key is not 32 bytes of hex");
			return;
		}
	};
	let destination = MockPoolCrypto::address_of(&destination_key);

	let relayer = Arc::new(RelayerClient::new(relayer_url));
	let crypto = Arc::new(MockPoolCrypto::new(&params));
	let context = PoolContext::new(params.clone(), key);

	info!("Created relayer client");

	let coordinator = SyncCoordinator::new(relayer.clone(), crypto.clone(), context.clone());

	// Reconciles the latest log entries and stores the result in the context
	let ready = coordinator
		.update_state()
		.await
		.map_err(|e| {
			error!("Failed to reconcile account state: {:?}", e);
		})
		.unwrap();

	info!("Reconciled account state (ready to transact: {})", ready);

	info!(
		"Confirmed balance: {} tokens",
		format_token_amount(context.confirmed_balance(), params.token_decimals)
	);
	info!(
		"Optimistic balance: {} tokens",
		format_token_amount(context.optimistic_balance(), params.token_decimals)
	);

	#[allow(clippy::identity_op)]
	let amount = 1 * 10u128.pow(params.token_decimals); // 1 token

	let (notes, balance) = context.state.lock().unwrap().snapshot();
	let available = max_available_transfer(&notes, balance, &params);
	info!(
		"Maximum transferable: {} tokens",
		format_token_amount(available, params.token_decimals)
	);

	let estimate = match estimate_fee(TxKind::Transfer, amount, &notes, balance, &params) {
		Ok(estimate) => estimate,
		Err(e) => {
			error!(
				"Cannot transfer {} tokens: {}",
				format_token_amount(amount, params.token_decimals),
				e
			);
			return;
		}
	};

	info!(
		"Transfer splits into {} part(s), {} tokens of fees",
		estimate.parts,
		format_token_amount(estimate.total, params.token_decimals)
	);

	let pipeline = TransferPipeline::new(
		relayer.clone(),
		crypto.clone(),
		context.clone(),
		MockPoolCrypto::verifying_key(),
	);

	info!("Sending transfer");

	match pipeline.transfer(destination, amount).await {
		Ok(tx_hashes) => {
			info!("Transfer submitted successfully");
			info!("Transaction hashes: {:?}", tx_hashes);
		}
		Err(e) => {
			error!("Failed to submit transfer: {}", e);
			return;
		}
	}

	// The spends stay pending until the relayer mines them into the log
	match coordinator.wait_ready(Duration::from_secs(2), 15).await {
		Ok(true) => info!("All spends confirmed"),
		Ok(false) => info!("Spends still pending after polling, try again later"),
		Err(e) => {
			error!("Failed to refresh account state: {:?}", e);
			return;
		}
	}

	info!(
		"Final balance: {} tokens",
		format_token_amount(context.confirmed_balance(), params.token_decimals)
	);
}
