// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

use bitcoin::amount::Amount;
use bitcoin::hashes::Hash;
use bitcoin::network::Network;
use bitcoin::script::ScriptBuf;
use bitcoin::secp256k1::ecdsa::Signature;
use bitcoin::secp256k1::{self, PublicKey, Secp256k1, SecretKey};
use bitcoin::transaction::Transaction;
use bitcoin::{OutPoint as BitcoinOutPoint, Txid, WPubkeyHash, Witness};

use crate::chain::chaininterface::{self, ConfirmationTarget};
use crate::chain::transaction::OutPoint;
use crate::chain::ConnectedBlock;
use crate::ln::chan_utils::{make_funding_redeemscript, ChannelPublicKeys, TxCreationKeys};
use crate::ln::channel::Channel;
use crate::ln::channel_logic::{
	ChannelLogic, DefaultChannelLogic, FundingTransaction, OpenChannelRequest,
};
use crate::ln::channelmanager::ChannelManager;
use crate::ln::commitment_number::CommitmentNumber;
use crate::ln::commitment_tx::{CommitmentParameters, CommitmentTransaction};
use crate::ln::msgs::{self, Message};
use crate::ln::peer::{MessageSender, Peer, PeerConnectionState};
use crate::ln::types::ChannelId;
use crate::sign::{
	sign_commitment_transaction, verify_commitment_signature, ChannelKeys, KeysManager,
	SignerProvider,
};
use crate::util::config::UserConfig;
use crate::util::errors::OpeningError;
use crate::util::hash_tables::{new_hash_map, HashMap};
use crate::util::logger::{Level, Logger, Record};
use crate::util::persist::ChannelStore;
use crate::util::wallet_utils::{Utxo, WalletSource};

use core::future::Future;
use core::sync::atomic::{AtomicUsize, Ordering};
use std::io;
use std::mem;
use std::sync::{Arc, Mutex};

pub struct TestLogger {
	level: Level,
	id: String,
	pub lines: Mutex<HashMap<(String, String), usize>>,
	pub context: Mutex<HashMap<(String, Option<PublicKey>, Option<ChannelId>), usize>>,
}

impl TestLogger {
	pub fn new() -> TestLogger {
		Self::with_id("".to_owned())
	}
	pub fn with_id(id: String) -> TestLogger {
		TestLogger {
			level: Level::Trace,
			id,
			lines: Mutex::new(new_hash_map()),
			context: Mutex::new(new_hash_map()),
		}
	}
	pub fn enable(&mut self, level: Level) {
		self.level = level;
	}
	pub fn assert_log(&self, module: &str, line: String, count: usize) {
		let log_entries = self.lines.lock().unwrap();
		assert_eq!(log_entries.get(&(module.to_string(), line)), Some(&count));
	}

	/// Search for the number of occurrence of the logged lines which
	/// 1. belongs to the specified module and
	/// 2. contains `line` in it.
	/// And asserts if the number of occurrences is the same with the given `count`
	pub fn assert_log_contains(&self, module: &str, line: &str, count: usize) {
		let log_entries = self.lines.lock().unwrap();
		let l: usize = log_entries
			.iter()
			.filter(|&(&(ref m, ref l), _c)| m == module && l.contains(line))
			.map(|(_, c)| c)
			.sum();
		assert_eq!(l, count)
	}

	/// Search for the number of occurrences of logged lines which
	/// 1. belong to the specified module and
	/// 2. match the given regex pattern.
	/// Assert that the number of occurrences equals the given `count`
	pub fn assert_log_regex(&self, module: &str, pattern: regex::Regex, count: usize) {
		let log_entries = self.lines.lock().unwrap();
		let l: usize = log_entries
			.iter()
			.filter(|&(&(ref m, ref l), _c)| m == module && pattern.is_match(&l))
			.map(|(_, c)| c)
			.sum();
		assert_eq!(l, count)
	}

	pub fn assert_log_context_contains(
		&self, module: &str, peer_id: Option<PublicKey>, channel_id: Option<ChannelId>,
		count: usize,
	) {
		let context_entries = self.context.lock().unwrap();
		let l = context_entries.get(&(module.to_string(), peer_id, channel_id)).unwrap();
		assert_eq!(*l, count)
	}
}

impl Logger for TestLogger {
	fn log(&self, record: Record) {
		let context = (record.module_path.to_string(), record.peer_id, record.channel_id);
		*self.context.lock().unwrap().entry(context).or_insert(0) += 1;
		*self
			.lines
			.lock()
			.unwrap()
			.entry((record.module_path.to_string(), format!("{}", record.args)))
			.or_insert(0) += 1;
		if record.level >= self.level {
			println!("{:<5} {}", self.id, record);
		}
	}
}

pub struct TestFeeEstimator {
	pub sat_per_kw: Mutex<u32>,
}

impl TestFeeEstimator {
	pub fn new(sat_per_kw: u32) -> Self {
		TestFeeEstimator { sat_per_kw: Mutex::new(sat_per_kw) }
	}
}

impl chaininterface::FeeEstimator for TestFeeEstimator {
	fn get_est_sat_per_1000_weight(&self, _confirmation_target: ConfirmationTarget) -> u32 {
		*self.sat_per_kw.lock().unwrap()
	}
}

pub struct TestBroadcaster {
	pub txn_broadcasted: Mutex<Vec<Transaction>>,
}

impl TestBroadcaster {
	pub fn new() -> TestBroadcaster {
		TestBroadcaster { txn_broadcasted: Mutex::new(Vec::new()) }
	}

	pub fn txn_broadcasted(&self) -> Vec<Transaction> {
		self.txn_broadcasted.lock().unwrap().clone()
	}
}

impl chaininterface::BroadcasterInterface for TestBroadcaster {
	fn broadcast_transactions(&self, txs: &[&Transaction]) {
		for tx in txs {
			assert!(!tx.input.is_empty(), "Broadcast a transaction without inputs");
			self.txn_broadcasted.lock().unwrap().push((*tx).clone());
		}
	}
}

pub struct TestMessageSender {
	pub sent: Mutex<Vec<(PublicKey, Message)>>,
}

impl TestMessageSender {
	pub fn new() -> Self {
		TestMessageSender { sent: Mutex::new(Vec::new()) }
	}

	pub fn get_and_clear_sent(&self) -> Vec<(PublicKey, Message)> {
		mem::take(&mut *self.sent.lock().unwrap())
	}
}

impl MessageSender for TestMessageSender {
	fn send_message(&self, their_node_id: &PublicKey, msg: Message) {
		self.sent.lock().unwrap().push((*their_node_id, msg));
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TestStoreMode {
	Normal,
	/// The next write fails, after which the store goes back to normal.
	FailNext,
}

pub struct TestStore {
	pub channels: Mutex<HashMap<ChannelId, Channel>>,
	mode: Mutex<TestStoreMode>,
	persist_count: AtomicUsize,
	remove_count: AtomicUsize,
}

impl TestStore {
	pub fn new() -> Self {
		TestStore {
			channels: Mutex::new(new_hash_map()),
			mode: Mutex::new(TestStoreMode::Normal),
			persist_count: AtomicUsize::new(0),
			remove_count: AtomicUsize::new(0),
		}
	}

	pub fn set_mode(&self, mode: TestStoreMode) {
		*self.mode.lock().unwrap() = mode;
	}

	pub fn persist_count(&self) -> usize {
		self.persist_count.load(Ordering::Acquire)
	}

	pub fn remove_count(&self) -> usize {
		self.remove_count.load(Ordering::Acquire)
	}

	/// The state of the stored copy of the channel, keyed by temporary channel id.
	pub fn persisted_state(
		&self, temporary_channel_id: &ChannelId,
	) -> Option<crate::ln::channel_state::ChannelStateId> {
		self.channels.lock().unwrap().get(temporary_channel_id).map(|channel| channel.state())
	}

	fn check_failure(&self) -> Result<(), io::Error> {
		let mut mode = self.mode.lock().unwrap();
		match *mode {
			TestStoreMode::Normal => Ok(()),
			TestStoreMode::FailNext => {
				*mode = TestStoreMode::Normal;
				Err(io::Error::new(io::ErrorKind::Other, "test store failure"))
			},
		}
	}
}

impl ChannelStore for TestStore {
	fn persist_channel<'a>(
		&'a self, channel: &'a Channel,
	) -> impl Future<Output = Result<(), io::Error>> + Send + 'a {
		async move {
			self.check_failure()?;
			self.channels.lock().unwrap().insert(channel.temporary_channel_id(), channel.clone());
			self.persist_count.fetch_add(1, Ordering::AcqRel);
			Ok(())
		}
	}

	fn remove_channel<'a>(
		&'a self, channel: &'a Channel,
	) -> impl Future<Output = Result<(), io::Error>> + Send + 'a {
		async move {
			self.check_failure()?;
			self.channels.lock().unwrap().remove(&channel.temporary_channel_id());
			self.remove_count.fetch_add(1, Ordering::AcqRel);
			Ok(())
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TestWalletMode {
	Normal,
	/// Every request fails.
	Unavailable,
	/// Signing also bumps the lock time, changing the txid.
	ChangesTxid,
}

/// A wallet holding a single confirmed 0.1 BTC P2WPKH output.
pub struct TestWallet {
	utxos: Vec<Utxo>,
	mode: Mutex<TestWalletMode>,
}

impl TestWallet {
	pub fn new() -> Self {
		let utxo = Utxo::new_v0_p2wpkh(
			BitcoinOutPoint { txid: Txid::from_byte_array([42; 32]), vout: 1 },
			Amount::from_sat(10_000_000),
			&WPubkeyHash::from_byte_array([1; 20]),
		);
		TestWallet { utxos: vec![utxo], mode: Mutex::new(TestWalletMode::Normal) }
	}

	pub fn set_mode(&self, mode: TestWalletMode) {
		*self.mode.lock().unwrap() = mode;
	}

	pub fn change_script(&self) -> ScriptBuf {
		ScriptBuf::new_p2wpkh(&WPubkeyHash::from_byte_array([2; 20]))
	}

	fn mode(&self) -> TestWalletMode {
		*self.mode.lock().unwrap()
	}
}

impl WalletSource for TestWallet {
	fn list_confirmed_utxos<'a>(
		&'a self,
	) -> impl Future<Output = Result<Vec<Utxo>, ()>> + Send + 'a {
		async move {
			match self.mode() {
				TestWalletMode::Unavailable => Err(()),
				_ => Ok(self.utxos.clone()),
			}
		}
	}

	fn get_change_script<'a>(&'a self) -> impl Future<Output = Result<ScriptBuf, ()>> + Send + 'a {
		async move {
			match self.mode() {
				TestWalletMode::Unavailable => Err(()),
				_ => Ok(self.change_script()),
			}
		}
	}

	fn sign_transaction<'a>(
		&'a self, mut tx: Transaction,
	) -> impl Future<Output = Result<Transaction, ()>> + Send + 'a {
		async move {
			let mode = self.mode();
			if mode == TestWalletMode::Unavailable {
				return Err(());
			}
			for input in tx.input.iter_mut() {
				input.witness = Witness::from_slice(&[vec![0x30; 72], vec![0x02; 33]]);
			}
			if mode == TestWalletMode::ChangesTxid {
				tx.lock_time = bitcoin::absolute::LockTime::from_consensus(1);
			}
			Ok(tx)
		}
	}
}

pub type TestDefaultLogic = DefaultChannelLogic<
	Arc<KeysManager>,
	Arc<TestWallet>,
	Arc<TestBroadcaster>,
	Arc<TestFeeEstimator>,
	Arc<TestLogger>,
>;

/// Wraps [`DefaultChannelLogic`], counting how often each step runs.
pub struct TestChannelLogic {
	pub inner: TestDefaultLogic,
	calls: Mutex<HashMap<&'static str, usize>>,
}

impl TestChannelLogic {
	pub fn new(inner: TestDefaultLogic) -> Self {
		TestChannelLogic { inner, calls: Mutex::new(new_hash_map()) }
	}

	pub fn calls(&self, name: &str) -> usize {
		self.calls.lock().unwrap().get(name).copied().unwrap_or(0)
	}

	fn record(&self, name: &'static str) {
		*self.calls.lock().unwrap().entry(name).or_insert(0) += 1;
	}
}

impl ChannelLogic for TestChannelLogic {
	fn create_channel<'a>(
		&'a self, counterparty_node_id: PublicKey, request: &'a OpenChannelRequest,
	) -> impl Future<Output = Result<Channel, OpeningError>> + Send + 'a {
		self.record("create_channel");
		self.inner.create_channel(counterparty_node_id, request)
	}

	fn create_open_channel_message(
		&self, channel: &Channel,
	) -> Result<msgs::OpenChannel, OpeningError> {
		self.record("create_open_channel_message");
		self.inner.create_open_channel_message(channel)
	}

	fn validate_accept_channel(
		&self, channel: &Channel, msg: &msgs::AcceptChannel,
	) -> Result<(), OpeningError> {
		self.record("validate_accept_channel");
		self.inner.validate_accept_channel(channel, msg)
	}

	fn create_funding_tx<'a>(
		&'a self, channel: &'a Channel,
	) -> impl Future<Output = Result<FundingTransaction, OpeningError>> + Send + 'a {
		self.record("create_funding_tx");
		self.inner.create_funding_tx(channel)
	}

	fn create_remote_commitment_tx(
		&self, channel: &Channel,
	) -> Result<CommitmentTransaction, OpeningError> {
		self.record("create_remote_commitment_tx");
		self.inner.create_remote_commitment_tx(channel)
	}

	fn create_local_commitment_tx(
		&self, channel: &Channel,
	) -> Result<CommitmentTransaction, OpeningError> {
		self.record("create_local_commitment_tx");
		self.inner.create_local_commitment_tx(channel)
	}

	fn sign_commitment_tx<'a>(
		&'a self, channel: &'a Channel, commitment_tx: &'a CommitmentTransaction,
	) -> impl Future<Output = Result<Signature, OpeningError>> + Send + 'a {
		self.record("sign_commitment_tx");
		self.inner.sign_commitment_tx(channel, commitment_tx)
	}

	fn create_funding_created_message(
		&self, channel: &Channel, signature: Signature,
	) -> Result<msgs::FundingCreated, OpeningError> {
		self.record("create_funding_created_message");
		self.inner.create_funding_created_message(channel, signature)
	}

	fn validate_funding_signed_message(
		&self, channel: &Channel, msg: &msgs::FundingSigned,
	) -> Result<(), OpeningError> {
		self.record("validate_funding_signed_message");
		self.inner.validate_funding_signed_message(channel, msg)
	}

	fn sign_funding_tx<'a>(
		&'a self, funding_tx: Transaction,
	) -> impl Future<Output = Result<Transaction, OpeningError>> + Send + 'a {
		self.record("sign_funding_tx");
		self.inner.sign_funding_tx(funding_tx)
	}

	fn broadcast_tx<'a>(&'a self, tx: &'a Transaction) -> impl Future<Output = ()> + Send + 'a {
		self.record("broadcast_tx");
		self.inner.broadcast_tx(tx)
	}

	fn create_channel_ready_message(
		&self, channel: &Channel,
	) -> Result<msgs::ChannelReady, OpeningError> {
		self.record("create_channel_ready_message");
		self.inner.create_channel_ready_message(channel)
	}

	fn validate_channel_ready_message(
		&self, channel: &Channel, msg: &msgs::ChannelReady,
	) -> Result<(), OpeningError> {
		self.record("validate_channel_ready_message");
		self.inner.validate_channel_ready_message(channel, msg)
	}

	fn create_error_message(&self, channel: &Channel, reason: &str) -> msgs::ErrorMessage {
		self.record("create_error_message");
		self.inner.create_error_message(channel, reason)
	}
}

pub type TestChannelManager = ChannelManager<
	Arc<TestChannelLogic>,
	Arc<TestMessageSender>,
	Arc<TestStore>,
	Arc<TestLogger>,
>;

/// Our node: every collaborator plus a [`ChannelManager`] wired to them, on testnet.
pub struct TestHarness {
	pub keys_manager: Arc<KeysManager>,
	pub wallet: Arc<TestWallet>,
	pub broadcaster: Arc<TestBroadcaster>,
	pub fee_estimator: Arc<TestFeeEstimator>,
	pub messages: Arc<TestMessageSender>,
	pub store: Arc<TestStore>,
	pub logger: Arc<TestLogger>,
	pub logic: Arc<TestChannelLogic>,
	pub manager: TestChannelManager,
}

impl TestHarness {
	pub fn new(seed: &[u8; 32]) -> Self {
		let keys_manager = Arc::new(KeysManager::new(seed, 42, 43));
		let wallet = Arc::new(TestWallet::new());
		let broadcaster = Arc::new(TestBroadcaster::new());
		let fee_estimator = Arc::new(TestFeeEstimator::new(253));
		let messages = Arc::new(TestMessageSender::new());
		let store = Arc::new(TestStore::new());
		let logger = Arc::new(TestLogger::new());
		let logic = Arc::new(TestChannelLogic::new(DefaultChannelLogic::new(
			Arc::clone(&keys_manager),
			Arc::clone(&wallet),
			Arc::clone(&broadcaster),
			Arc::clone(&fee_estimator),
			UserConfig::default(),
			Network::Testnet,
			Arc::clone(&logger),
		)));
		let manager = ChannelManager::new(
			Arc::clone(&logic),
			Arc::clone(&messages),
			Arc::clone(&store),
			Arc::clone(&logger),
		);
		TestHarness {
			keys_manager,
			wallet,
			broadcaster,
			fee_estimator,
			messages,
			store,
			logger,
			logic,
			manager,
		}
	}

	/// A fresh [`DefaultChannelLogic`] sharing the harness' collaborators.
	pub fn default_logic(&self) -> TestDefaultLogic {
		DefaultChannelLogic::new(
			Arc::clone(&self.keys_manager),
			Arc::clone(&self.wallet),
			Arc::clone(&self.broadcaster),
			Arc::clone(&self.fee_estimator),
			UserConfig::default(),
			Network::Testnet,
			Arc::clone(&self.logger),
		)
	}
}

/// Builds and records the funding transaction of a channel which has seen `accept_channel`.
pub async fn attach_test_funding<CL: ChannelLogic>(logic: &CL, channel: &mut Channel) {
	let funding = logic.create_funding_tx(channel).await.unwrap();
	channel.attach_funding_tx(funding.transaction, funding.outpoint, funding.redeemscript);
}

pub fn build_block(height: u32, txdata: Vec<Transaction>) -> ConnectedBlock {
	ConnectedBlock::new(height, txdata)
}

struct CounterpartyChannel {
	open: msgs::OpenChannel,
	accept: msgs::AcceptChannel,
}

/// The remote end of a channel we open. It answers our messages the way a well-behaved peer
/// would and checks our signatures against its own view of the commitment transactions.
pub struct TestCounterparty {
	node_secret: SecretKey,
	keys: ChannelKeys,
	minimum_depth: u32,
	channel: Mutex<Option<CounterpartyChannel>>,
	secp_ctx: Secp256k1<secp256k1::All>,
}

impl TestCounterparty {
	pub fn new(seed: &[u8; 32], minimum_depth: u32) -> Self {
		let keys_manager = KeysManager::new(seed, 0, 0);
		let keys_id = keys_manager.generate_channel_keys_id(true, 0, 0);
		TestCounterparty {
			node_secret: SecretKey::from_slice(seed).unwrap(),
			keys: keys_manager.derive_channel_keys(0, &keys_id),
			minimum_depth,
			channel: Mutex::new(None),
			secp_ctx: Secp256k1::new(),
		}
	}

	pub fn node_id(&self) -> PublicKey {
		PublicKey::from_secret_key(&self.secp_ctx, &self.node_secret)
	}

	pub fn peer(&self, state: PeerConnectionState) -> Peer {
		Peer::new(self.node_id(), state)
	}

	/// Accepts `open` with a 1% reserve and our dust limit, remembering both messages.
	pub fn accept_channel(&self, open: &msgs::OpenChannel) -> msgs::AcceptChannel {
		let pubkeys = self.keys.pubkeys();
		let reserve = core::cmp::max(open.funding_satoshis / 100, 1000);
		let accept = msgs::AcceptChannel {
			temporary_channel_id: open.temporary_channel_id,
			dust_limit_satoshis: 546,
			max_htlc_value_in_flight_msat: open.funding_satoshis * 1000 / 10,
			channel_reserve_satoshis: core::cmp::min(reserve, open.funding_satoshis),
			htlc_minimum_msat: 1000,
			minimum_depth: self.minimum_depth,
			to_self_delay: 144,
			max_accepted_htlcs: 30,
			funding_pubkey: pubkeys.funding_pubkey,
			revocation_basepoint: pubkeys.revocation_basepoint,
			payment_basepoint: pubkeys.payment_point,
			delayed_payment_basepoint: pubkeys.delayed_payment_basepoint,
			htlc_basepoint: pubkeys.htlc_basepoint,
			first_per_commitment_point: self
				.keys
				.per_commitment_point(CommitmentNumber::zero(), &self.secp_ctx),
			shutdown_scriptpubkey: None,
		};
		*self.channel.lock().unwrap() =
			Some(CounterpartyChannel { open: open.clone(), accept: accept.clone() });
		accept
	}

	/// Our first commitment transaction (`ours == true`) or the opener's, as we see them.
	fn build_commitment_tx(&self, funding_outpoint: OutPoint, ours: bool) -> CommitmentTransaction {
		let channel = self.channel.lock().unwrap();
		let CounterpartyChannel { open, accept } =
			channel.as_ref().expect("accept_channel must be called first");
		let opener_keys = ChannelPublicKeys {
			funding_pubkey: open.funding_pubkey,
			revocation_basepoint: open.revocation_basepoint,
			payment_point: open.payment_basepoint,
			delayed_payment_basepoint: open.delayed_payment_basepoint,
			htlc_basepoint: open.htlc_basepoint,
		};
		let our_keys = self.keys.pubkeys();
		let opener_value_msat = open.funding_satoshis * 1000 - open.push_msat;

		let (broadcaster_keys, countersignatory_keys, per_commitment_point) = if ours {
			(our_keys, &opener_keys, accept.first_per_commitment_point)
		} else {
			(&opener_keys, our_keys, open.first_per_commitment_point)
		};
		let keys = TxCreationKeys::from_channel_static_keys(
			&per_commitment_point,
			broadcaster_keys,
			countersignatory_keys,
			&self.secp_ctx,
		);
		let params = CommitmentParameters {
			funding_outpoint,
			commitment_number: CommitmentNumber::zero(),
			open_payment_basepoint: &opener_keys.payment_point,
			accept_payment_basepoint: &our_keys.payment_point,
			broadcaster_is_funder: !ours,
			to_broadcaster_value_msat: if ours { open.push_msat } else { opener_value_msat },
			to_countersignatory_value_msat: if ours { opener_value_msat } else { open.push_msat },
			feerate_per_kw: open.feerate_per_kw,
			dust_limit_satoshis: if ours {
				accept.dust_limit_satoshis
			} else {
				open.dust_limit_satoshis
			},
			contest_delay: if ours { open.to_self_delay } else { accept.to_self_delay },
			keys: &keys,
			countersignatory_payment_point: &countersignatory_keys.payment_point,
			htlcs: &[],
		};
		CommitmentTransaction::build(&params)
	}

	fn funding_setup(&self, msg: &msgs::FundingCreated) -> (OutPoint, ScriptBuf, u64, PublicKey) {
		let channel = self.channel.lock().unwrap();
		let open = &channel.as_ref().expect("accept_channel must be called first").open;
		let redeemscript =
			make_funding_redeemscript(&open.funding_pubkey, &self.keys.pubkeys().funding_pubkey);
		let outpoint = OutPoint { txid: msg.funding_txid, index: msg.funding_output_index };
		(outpoint, redeemscript, open.funding_satoshis, open.funding_pubkey)
	}

	/// Checks the opener's signature on our first commitment transaction.
	pub fn verify_funding_created(&self, msg: &msgs::FundingCreated) -> bool {
		let (outpoint, redeemscript, funding_satoshis, opener_funding_pubkey) =
			self.funding_setup(msg);
		let commitment_tx = self.build_commitment_tx(outpoint, true);
		verify_commitment_signature(
			&self.secp_ctx,
			commitment_tx.transaction(),
			&redeemscript,
			funding_satoshis,
			&msg.signature,
			&opener_funding_pubkey,
		)
	}

	/// Signs the opener's first commitment transaction.
	pub fn funding_signed(&self, msg: &msgs::FundingCreated) -> msgs::FundingSigned {
		let (outpoint, redeemscript, funding_satoshis, _) = self.funding_setup(msg);
		let commitment_tx = self.build_commitment_tx(outpoint, false);
		let signature = sign_commitment_transaction(
			&self.secp_ctx,
			commitment_tx.transaction(),
			&redeemscript,
			funding_satoshis,
			&self.keys.funding_key,
		)
		.unwrap();
		msgs::FundingSigned { channel_id: ChannelId::v1_from_funding_outpoint(outpoint), signature }
	}

	pub fn channel_ready(&self, channel_id: ChannelId) -> msgs::ChannelReady {
		let next = CommitmentNumber::zero().next().unwrap();
		msgs::ChannelReady {
			channel_id,
			next_per_commitment_point: self.keys.per_commitment_point(next, &self.secp_ctx),
		}
	}
}
