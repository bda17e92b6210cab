use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::thread;
use tracing::{info, warn};

use crate::config::Config;
use crate::node::Node;

const HELP: &str = "commands: accounts | send <from> <to> <value> | get <id> | modify <user> <id> | chain | verify | stats | help | quit";

/// A parsed stdin command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Accounts,
    Send {
        sender: String,
        recipient: String,
        value: u64,
    },
    Get {
        id: String,
    },
    Modify {
        sender: String,
        id: String,
    },
    Chain,
    Verify,
    Stats,
    Help,
    Quit,
}

impl Request {
    pub fn parse(line: &str) -> Result<Self, String> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            ["accounts"] => Ok(Self::Accounts),
            ["send", sender, recipient, value] => {
                let value = value
                    .parse::<u64>()
                    .map_err(|_| format!("invalid value: {}", value))?;
                Ok(Self::Send {
                    sender: sender.to_string(),
                    recipient: recipient.to_string(),
                    value,
                })
            }
            ["get", id] => Ok(Self::Get { id: id.to_string() }),
            ["modify", sender, id] => Ok(Self::Modify {
                sender: sender.to_string(),
                id: id.to_string(),
            }),
            ["chain"] => Ok(Self::Chain),
            ["verify"] => Ok(Self::Verify),
            ["stats"] => Ok(Self::Stats),
            ["help"] => Ok(Self::Help),
            ["quit"] | ["exit"] => Ok(Self::Quit),
            [] => Err("empty command".to_string()),
            [command, ..] => Err(format!("unknown or malformed command: {}", command)),
        }
    }
}

/// Run the node until stdin closes or `quit` is read
pub fn run(config_path: &Path, mine: bool) -> Result<()> {
    let config = if Config::exists(config_path) {
        Config::load(config_path)?
    } else {
        warn!(
            "No config at {}, using defaults (run 'lattechain init' to create one)",
            config_path.display()
        );
        Config::default()
    };
    let mining = mine || config.mining.enabled;

    let node = Node::new(config);
    node.init_chain().context("Failed to initialize chain")?;

    if mining {
        let blocks = node.start_mining()?;
        thread::spawn(move || {
            for mined in blocks {
                info!(
                    worker = mined.worker,
                    height = mined.block.height(),
                    hash = %mined.block.hash_hex(),
                    "New block"
                );
            }
        });
    }

    let stdin = io::stdin();
    let stdout = io::stdout();
    let result = serve(&node, stdin.lock(), stdout.lock());

    node.shutdown();
    result
}

/// Answer line commands from `input` with one JSON line each on `output`.
pub fn serve<R: BufRead, W: Write>(node: &Node, input: R, mut output: W) -> Result<()> {
    for line in input.lines() {
        let line = line.context("Failed to read command")?;
        if line.trim().is_empty() {
            continue;
        }

        let reply = match Request::parse(&line) {
            Ok(Request::Quit) => break,
            Ok(request) => handle(node, request),
            Err(e) => failure(e),
        };
        writeln!(output, "{}", reply).context("Failed to write reply")?;
        output.flush()?;
    }
    Ok(())
}

fn handle(node: &Node, request: Request) -> Value {
    let result = match request {
        Request::Accounts => node.list_accounts().map(|a| json!(a)),
        Request::Send {
            sender,
            recipient,
            value,
        } => node
            .submit_transaction(&sender, &recipient, value)
            .map(|d| json!(d)),
        Request::Get { id } => match node.get_transaction(&id) {
            Ok(Some(digest)) => Ok(json!(digest)),
            Ok(None) => return failure(format!("transaction not found: {}", id)),
            Err(e) => Err(e),
        },
        Request::Modify { sender, id } => node.modify_transaction(&sender, &id).map(|d| json!(d)),
        Request::Chain => node.chain_info().map(|c| json!(c)),
        Request::Verify => node.verify_chain().map(|_| json!("valid")),
        Request::Stats => {
            return match node.mining_stats() {
                Some(stats) => success(json!({
                    "total_hashes": stats.total_hashes,
                    "blocks_found": stats.blocks_found,
                    "rejected_transactions": stats.rejected_transactions,
                    "abandoned_transactions": stats.abandoned_transactions,
                    "hashrate": stats.hashrate(),
                })),
                None => failure("mining is not running"),
            }
        }
        Request::Help => return success(json!(HELP)),
        Request::Quit => return success(Value::Null),
    };

    match result {
        Ok(value) => success(value),
        Err(e) => failure(e),
    }
}

fn success(result: Value) -> Value {
    json!({ "ok": true, "result": result })
}

fn failure(error: impl ToString) -> Value {
    json!({ "ok": false, "error": error.to_string() })
}
