use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::blockchain::{Address, Block, Blockchain, BlockchainError, CancelToken, Transaction, Wallet};

/// Data structure for the blockchain state
pub type BlockchainData = web::Data<Blockchain>;

/// Response for the chain endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ChainResponse {
    /// The length of the chain
    pub length: usize,

    /// The blocks in the chain
    pub chain: Vec<Block>,

    /// Whether the chain is valid
    pub is_valid: bool,
}

/// Request for the transaction endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct TransactionRequest {
    /// The sender's address
    pub sender: String,

    /// The recipient's address
    pub recipient: String,

    /// The amount to transfer
    pub amount: f64,

    /// The sender's private key (hex encoded, for signing)
    pub private_key: String,
}

/// Request for the mine endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct MineRequest {
    /// The address receiving the mining reward
    pub miner_address: String,
}

/// Response for the mine endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct MineResponse {
    /// The message
    pub message: String,

    /// The newly mined block
    pub block: Block,
}

/// Request for the set-reward endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct RewardRequest {
    /// The new mining reward
    pub reward: f64,
}

/// Request for the set-difficulty endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct DifficultyRequest {
    /// The new mining difficulty (leading zero hex digits)
    pub difficulty: u32,
}

/// Get the full blockchain
///
/// Returns the entire blockchain and its validity status
#[utoipa::path(
    get,
    path = "/api/v1/chain",
    responses(
        (status = 200, description = "Blockchain retrieved successfully", body = ChainResponse)
    )
)]
pub async fn get_chain(blockchain: BlockchainData) -> impl Responder {
    let chain = blockchain.get_chain();
    let is_valid = blockchain.is_chain_valid();

    let response = ChainResponse {
        length: chain.len(),
        chain,
        is_valid,
    };

    HttpResponse::Ok().json(response)
}

/// Get all pending transactions
///
/// Returns all transactions waiting to be included in a block
#[utoipa::path(
    get,
    path = "/api/v1/transactions/pending",
    responses(
        (status = 200, description = "Pending transactions retrieved successfully", body = Vec<Transaction>)
    )
)]
pub async fn get_pending_transactions(blockchain: BlockchainData) -> impl Responder {
    let transactions = blockchain.get_pending_transactions();
    HttpResponse::Ok().json(transactions)
}

/// Create a new transaction
///
/// Signs the transaction with the supplied private key and admits it into
/// the pending pool
#[utoipa::path(
    post,
    path = "/api/v1/transactions/new",
    request_body = TransactionRequest,
    responses(
        (status = 201, description = "Transaction admitted successfully"),
        (status = 400, description = "Invalid transaction data"),
    )
)]
pub async fn new_transaction(
    blockchain: BlockchainData,
    transaction_req: web::Json<TransactionRequest>,
) -> impl Responder {
    let sender_address: Address = match transaction_req.sender.parse() {
        Ok(address) => address,
        Err(err) => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": format!("Invalid sender address: {}", err)
            }));
        }
    };

    let recipient_address: Address = match transaction_req.recipient.parse() {
        Ok(address) => address,
        Err(err) => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": format!("Invalid recipient address: {}", err)
            }));
        }
    };

    // Rebuild the wallet from the private key
    let private_key_bytes = match hex::decode(&transaction_req.private_key) {
        Ok(bytes) => bytes,
        Err(_) => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Invalid private key format. Must be a hex string."
            }));
        }
    };

    let wallet = match Wallet::from_secret_key(&private_key_bytes) {
        Ok(wallet) => wallet,
        Err(err) => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": format!("Invalid private key: {}", err)
            }));
        }
    };

    let mut transaction = Transaction::new(
        sender_address,
        recipient_address,
        transaction_req.amount,
    );

    // Sign the transaction; fails when the key does not match the sender
    if let Err(err) = transaction.sign(&wallet) {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": format!("Failed to sign transaction: {}", err)
        }));
    }

    match blockchain.add_transaction(transaction) {
        Ok(()) => HttpResponse::Created().json(serde_json::json!({
            "message": "Transaction admitted into the pending pool"
        })),
        Err(err) => HttpResponse::BadRequest().json(serde_json::json!({
            "error": format!("Failed to add transaction: {}", err)
        })),
    }
}

/// Mine a new block
///
/// Packages all pending transactions plus a mining reward into a new block
#[utoipa::path(
    post,
    path = "/api/v1/mine",
    request_body = MineRequest,
    responses(
        (status = 200, description = "Block mined successfully", body = MineResponse),
        (status = 400, description = "Invalid mining request"),
        (status = 409, description = "Another mining operation is in progress")
    )
)]
pub async fn mine_block(
    blockchain: BlockchainData,
    mine_req: web::Json<MineRequest>,
) -> impl Responder {
    let miner_address: Address = match mine_req.miner_address.parse() {
        Ok(address) => address,
        Err(err) => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": format!("Invalid miner address: {}", err)
            }));
        }
    };

    match blockchain.mine_pending_transactions(&miner_address, &CancelToken::new()) {
        Ok(block) => {
            let response = MineResponse {
                message: "New block mined".to_string(),
                block,
            };

            HttpResponse::Ok().json(response)
        }
        Err(err @ BlockchainError::MiningInProgress) => {
            HttpResponse::Conflict().json(serde_json::json!({
                "error": format!("{}", err)
            }))
        }
        Err(err) => HttpResponse::BadRequest().json(serde_json::json!({
            "error": format!("Failed to mine block: {}", err)
        })),
    }
}

/// Check if the blockchain is valid
///
/// Validates the entire blockchain
#[utoipa::path(
    get,
    path = "/api/v1/validate",
    responses(
        (status = 200, description = "Blockchain validation status", body = bool)
    )
)]
pub async fn validate_chain(blockchain: BlockchainData) -> impl Responder {
    let is_valid = blockchain.is_chain_valid();
    HttpResponse::Ok().json(is_valid)
}

/// Response for the create wallet endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct WalletResponse {
    /// The wallet's address
    pub address: String,

    /// The wallet's private key (hex encoded)
    pub private_key: String,
}

/// Create a new wallet
///
/// Creates a new wallet with a random secp256k1 keypair
///
/// The private key must be stored by your own
#[utoipa::path(
    post,
    path = "/api/v1/wallet/new",
    responses(
        (status = 201, description = "Wallet created successfully", body = WalletResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn create_wallet() -> impl Responder {
    match Wallet::new() {
        Ok(wallet) => {
            let response = WalletResponse {
                address: wallet.address().0.clone(),
                private_key: hex::encode(wallet.export_secret_key()),
            };

            HttpResponse::Created().json(response)
        }
        Err(err) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Failed to create wallet: {}", err)
        })),
    }
}

/// Get wallet balance
///
/// Returns the balance of a wallet, replayed from the committed chain
#[utoipa::path(
    get,
    path = "/api/v1/wallet/balance/{address}",
    responses(
        (status = 200, description = "Wallet balance retrieved successfully"),
        (status = 400, description = "Malformed address")
    )
)]
pub async fn get_wallet_balance(
    blockchain: BlockchainData,
    address: web::Path<String>,
) -> impl Responder {
    let wallet_address: Address = match address.into_inner().parse() {
        Ok(address) => address,
        Err(err) => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": format!("Malformed address: {}", err)
            }));
        }
    };

    let balance = blockchain.get_balance_of_address(&wallet_address);

    HttpResponse::Ok().json(serde_json::json!({
        "address": wallet_address.0,
        "balance": balance
    }))
}

/// Get wallet transactions
///
/// Returns every committed transaction sent or received by a wallet
#[utoipa::path(
    get,
    path = "/api/v1/wallet/transactions/{address}",
    responses(
        (status = 200, description = "Wallet transactions retrieved successfully", body = Vec<Transaction>),
        (status = 400, description = "Malformed address")
    )
)]
pub async fn get_wallet_transactions(
    blockchain: BlockchainData,
    address: web::Path<String>,
) -> impl Responder {
    let wallet_address: Address = match address.into_inner().parse() {
        Ok(address) => address,
        Err(err) => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": format!("Malformed address: {}", err)
            }));
        }
    };

    let transactions = blockchain.get_all_transactions_for_wallet(&wallet_address);
    HttpResponse::Ok().json(transactions)
}

/// Set the mining reward
///
/// Overwrites the reward minted by the next mined block
#[utoipa::path(
    post,
    path = "/api/v1/settings/reward",
    request_body = RewardRequest,
    responses(
        (status = 200, description = "Mining reward updated")
    )
)]
pub async fn set_mining_reward(
    blockchain: BlockchainData,
    reward_req: web::Json<RewardRequest>,
) -> impl Responder {
    blockchain.set_mining_reward(reward_req.reward);

    HttpResponse::Ok().json(serde_json::json!({
        "message": format!("Mining reward set to {}", reward_req.reward)
    }))
}

/// Set the mining difficulty
///
/// Overwrites the difficulty used by the next mining operation
#[utoipa::path(
    post,
    path = "/api/v1/settings/difficulty",
    request_body = DifficultyRequest,
    responses(
        (status = 200, description = "Mining difficulty updated")
    )
)]
pub async fn set_difficulty(
    blockchain: BlockchainData,
    difficulty_req: web::Json<DifficultyRequest>,
) -> impl Responder {
    blockchain.set_difficulty(difficulty_req.difficulty);

    HttpResponse::Ok().json(serde_json::json!({
        "message": format!("Mining difficulty set to {}", difficulty_req.difficulty)
    }))
}
