//! Chain CLI invocation
//!
//! The Cosmos, Sui and Aptos wallets sign through each chain's own CLI so keys stay
//! in the CLI keyring. This module runs those binaries and parses what they print.

use tokio::process::Command;
use tracing::debug;

use crate::error::TransportError;

/// Runs `binary args...`, returning stdout. A non-zero exit is a wallet error.
pub async fn run(binary: &str, args: &[String]) -> Result<String, TransportError> {
    debug!("Running {} {}", binary, args.join(" "));
    let output = Command::new(binary)
        .args(args)
        .output()
        .await
        .map_err(|e| TransportError::Wallet(format!("Failed to execute {}: {}", binary, e)))?;

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(TransportError::Wallet(format!(
            "{} failed:\nstderr: {}\nstdout: {}",
            binary, stderr, stdout
        )));
    }
    Ok(stdout)
}

/// Extract transaction hash from CLI output (handles both JSON and line formats).
pub fn extract_transaction_hash(output: &str) -> Option<String> {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(output) {
        let hash = json
            .pointer("/Result/transaction_hash")
            .or_else(|| json.get("transaction_hash"))
            .and_then(|h| h.as_str());
        if let Some(hash) = hash {
            return Some(hash.to_string());
        }
    }

    // Fall back to line format: "Transaction hash: 0x..."
    output
        .lines()
        .filter(|line| line.contains("hash") || line.contains("Hash"))
        .find_map(|line| line.split_whitespace().find(|s| s.starts_with("0x")))
        .map(|s| s.trim_matches(|c: char| !c.is_ascii_alphanumeric()).to_string())
}

/// Whether the Move VM reported success in Aptos CLI JSON output.
///
/// Exit code 0 alone doesn't guarantee VM execution success on all networks. When the
/// output carries no `success` field the exit code is taken as sufficient.
pub fn check_vm_status_success(output: &str) -> bool {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(output) {
        if let Some(success) = json
            .pointer("/Result/success")
            .or_else(|| json.get("success"))
        {
            return success.as_bool().unwrap_or(false);
        }
    }
    !(output.contains("\"success\": false") || output.contains("\"success\":false"))
}
