//! OS credential stores holding the key that protects Slack's cookies.
//!
//! Each desktop platform keeps the secret somewhere different:
//! - macOS: a generic password in the login Keychain
//! - Linux: a Secret Service item written by Chromium's libsecret backend
//! - Windows: a DPAPI-wrapped key inside the `Local State` JSON file
//!
//! Keychain and Secret Service are read through the `security` and
//! `secret-tool` command-line tools, which avoids linking against either
//! native API and keeps behavior identical to what a user sees in a shell.

use std::path::{Path, PathBuf};
use std::process::Command;

use base64::Engine;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::decrypt::CookieCipher;
use crate::{AuthError, SecretReason};

pub trait SecretStore: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    fn fetch_master_key(&self) -> Result<Vec<u8>, AuthError>;

    /// PBKDF2 iteration count Chromium uses on this OS family.
    fn iterations(&self) -> u32;

    fn cipher(&self) -> CookieCipher {
        CookieCipher::Unix {
            iterations: self.iterations(),
        }
    }
}

/// Pick the store for the platform this binary was built for.
pub fn platform_secret_store(slack_dir: &Path) -> Result<Box<dyn SecretStore>, AuthError> {
    #[cfg(target_os = "macos")]
    {
        let _ = slack_dir;
        Ok(Box::new(KeychainStore::new()))
    }
    #[cfg(target_os = "linux")]
    {
        let _ = slack_dir;
        Ok(Box::new(SecretServiceStore::new()))
    }
    #[cfg(windows)]
    {
        Ok(Box::new(DpapiStore::new(slack_dir)))
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", windows)))]
    {
        let _ = slack_dir;
        Err(AuthError::UnsupportedPlatform(std::env::consts::OS))
    }
}

// ---------------------------------------------------------------------------
// macOS Keychain
// ---------------------------------------------------------------------------

/// Generic password lookup via `security find-generic-password`.
#[derive(Debug, Clone)]
pub struct KeychainStore {
    program: PathBuf,
    service: String,
    accounts: Vec<String>,
}

/// Why a single Keychain account lookup came back empty-handed.
#[derive(Debug)]
enum KeychainMiss {
    NotFound,
    Failed(String),
}

impl KeychainStore {
    const SERVICE: &'static str = "Slack Safe Storage";
    /// Direct download, newer direct download, and App Store builds.
    const ACCOUNTS: [&'static str; 3] = ["Slack", "Slack Key", "Slack App Store Key"];
    /// `security` exit status for errSecItemNotFound.
    const ITEM_NOT_FOUND: i32 = 44;

    pub fn new() -> Self {
        Self::with_accounts(
            Self::SERVICE,
            Self::ACCOUNTS.iter().map(|a| a.to_string()).collect(),
        )
    }

    pub fn with_accounts(service: &str, accounts: Vec<String>) -> Self {
        Self {
            program: PathBuf::from("security"),
            service: service.to_string(),
            accounts,
        }
    }

    /// Run this binary instead of `security` from `PATH`.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    fn find_generic_password(&self, account: &str) -> Result<Vec<u8>, KeychainMiss> {
        let output = Command::new(&self.program)
            .args(["find-generic-password", "-s", &self.service, "-a", account, "-w"])
            .output()
            .map_err(|e| {
                KeychainMiss::Failed(format!(
                    "failed to run {}: {}",
                    self.program.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            if output.status.code() == Some(Self::ITEM_NOT_FOUND) {
                return Err(KeychainMiss::NotFound);
            }
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(KeychainMiss::Failed(format!(
                "Keychain read error ({}): {}",
                output.status,
                stderr.trim()
            )));
        }

        let mut secret = output.stdout;
        while secret.last() == Some(&b'\n') {
            secret.pop();
        }
        Ok(secret)
    }
}

impl Default for KeychainStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretStore for KeychainStore {
    fn name(&self) -> &'static str {
        "keychain"
    }

    fn fetch_master_key(&self) -> Result<Vec<u8>, AuthError> {
        let mut last_failure = None;
        for account in &self.accounts {
            match self.find_generic_password(account) {
                Ok(secret) if !secret.is_empty() => {
                    info!("Read Slack Safe Storage secret from keychain account {:?}", account);
                    return Ok(secret);
                }
                Ok(_) => debug!("Keychain account {:?} holds an empty secret", account),
                Err(KeychainMiss::NotFound) => {
                    debug!("Keychain account {:?} not found", account)
                }
                Err(KeychainMiss::Failed(e)) => {
                    debug!("Keychain account {:?} unavailable: {}", account, e);
                    last_failure = Some(e);
                }
            }
        }

        let reason = match last_failure {
            Some(e) => SecretReason::Backend(format!(
                "no usable keychain item for accounts {:?}: {}",
                self.accounts, e
            )),
            None => SecretReason::Absent,
        };
        Err(AuthError::SecretUnavailable { reason })
    }

    fn iterations(&self) -> u32 {
        1003
    }
}

// ---------------------------------------------------------------------------
// Linux Secret Service
// ---------------------------------------------------------------------------

/// Attribute search via `secret-tool search --all`.
#[derive(Debug, Clone)]
pub struct SecretServiceStore {
    program: PathBuf,
    attributes: Vec<(String, String)>,
}

/// One item from `secret-tool search` output. `secret` is `None` for
/// locked items, whose secret the tool cannot print.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretItem {
    pub path: String,
    pub secret: Option<String>,
}

impl SecretServiceStore {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("secret-tool"),
            attributes: vec![
                (
                    "xdg:schema".to_string(),
                    "chrome_libsecret_os_crypt_password_v2".to_string(),
                ),
                ("application".to_string(), "Slack".to_string()),
            ],
        }
    }

    /// Run this binary instead of `secret-tool` from `PATH`.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    fn search(&self) -> Result<Vec<SecretItem>, AuthError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(["search", "--all"]);
        for (key, value) in &self.attributes {
            cmd.arg(key).arg(value);
        }

        let output = cmd.output().map_err(|e| AuthError::SecretUnavailable {
            reason: SecretReason::Backend(format!(
                "failed to run {}: {}",
                self.program.display(),
                e
            )),
        })?;

        if !output.status.success() && output.stdout.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            // A silent non-zero exit means nothing matched.
            if stderr.is_empty() {
                return Ok(Vec::new());
            }
            return Err(AuthError::SecretUnavailable {
                reason: SecretReason::Backend(format!(
                    "secret-tool search failed ({}): {}",
                    output.status, stderr
                )),
            });
        }

        Ok(parse_search_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

impl Default for SecretServiceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretStore for SecretServiceStore {
    fn name(&self) -> &'static str {
        "secret-service"
    }

    fn fetch_master_key(&self) -> Result<Vec<u8>, AuthError> {
        let items = self.search()?;
        let locked = items.iter().filter(|i| i.secret.is_none()).count();
        if locked > 0 {
            warn!("Ignoring {} locked Secret Service item(s)", locked);
        }
        select_single_unlocked(items)
    }

    fn iterations(&self) -> u32 {
        1
    }
}

/// Parse the `[path]` / `key = value` blocks printed by `secret-tool search`.
pub fn parse_search_output(stdout: &str) -> Vec<SecretItem> {
    let mut items = Vec::new();
    let mut current: Option<SecretItem> = None;

    for line in stdout.lines() {
        let line = line.trim_end();
        if let Some(path) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            if let Some(item) = current.take() {
                items.push(item);
            }
            current = Some(SecretItem {
                path: path.to_string(),
                secret: None,
            });
        } else if let Some(secret) = line.strip_prefix("secret = ") {
            if let Some(item) = current.as_mut() {
                item.secret = Some(secret.to_string());
            }
        }
    }
    if let Some(item) = current {
        items.push(item);
    }

    items
}

/// Exactly one unlocked item is a hit; zero is absent, several ambiguous.
pub fn select_single_unlocked(items: Vec<SecretItem>) -> Result<Vec<u8>, AuthError> {
    let mut unlocked: Vec<String> = items.into_iter().filter_map(|i| i.secret).collect();

    match unlocked.len() {
        0 => Err(AuthError::SecretUnavailable {
            reason: SecretReason::Absent,
        }),
        1 => Ok(unlocked.remove(0).into_bytes()),
        n => Err(AuthError::SecretUnavailable {
            reason: SecretReason::Ambiguous(n),
        }),
    }
}

// ---------------------------------------------------------------------------
// Windows DPAPI
// ---------------------------------------------------------------------------

const DPAPI_TAG: &[u8] = b"DPAPI";

#[derive(Debug, Deserialize)]
struct LocalState {
    os_crypt: OsCrypt,
}

#[derive(Debug, Deserialize)]
struct OsCrypt {
    encrypted_key: String,
}

/// Reads the AES key from `Local State` and unwraps it with DPAPI.
#[derive(Debug, Clone)]
pub struct DpapiStore {
    local_state: PathBuf,
}

impl DpapiStore {
    pub fn new(slack_dir: &Path) -> Self {
        Self {
            local_state: slack_dir.join("Local State"),
        }
    }
}

impl SecretStore for DpapiStore {
    fn name(&self) -> &'static str {
        "dpapi"
    }

    fn fetch_master_key(&self) -> Result<Vec<u8>, AuthError> {
        let contents = std::fs::read(&self.local_state).map_err(|e| {
            AuthError::io(format!("failed to read {}", self.local_state.display()), e)
        })?;
        let wrapped = wrapped_key_from_local_state(&contents)?;
        unprotect(&wrapped)
    }

    fn iterations(&self) -> u32 {
        1
    }

    fn cipher(&self) -> CookieCipher {
        CookieCipher::Windows
    }
}

/// Decode `os_crypt.encrypted_key` and strip its algorithm tag.
pub fn wrapped_key_from_local_state(contents: &[u8]) -> Result<Vec<u8>, AuthError> {
    let state: LocalState = serde_json::from_slice(contents)
        .map_err(|e| AuthError::DecryptionFailed(format!("invalid Local State file: {}", e)))?;

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(state.os_crypt.encrypted_key.as_bytes())
        .map_err(|e| AuthError::DecryptionFailed(format!("invalid encrypted_key: {}", e)))?;

    if decoded.len() < DPAPI_TAG.len() {
        return Err(AuthError::UnsupportedEncryption(
            String::from_utf8_lossy(&decoded).into_owned(),
        ));
    }
    let (tag, wrapped) = decoded.split_at(DPAPI_TAG.len());
    if tag != DPAPI_TAG {
        return Err(AuthError::UnsupportedEncryption(
            String::from_utf8_lossy(tag).into_owned(),
        ));
    }

    Ok(wrapped.to_vec())
}

#[cfg(windows)]
fn unprotect(wrapped: &[u8]) -> Result<Vec<u8>, AuthError> {
    use windows_sys::Win32::Foundation::LocalFree;
    use windows_sys::Win32::Security::Cryptography::{CryptUnprotectData, CRYPT_INTEGER_BLOB};

    let input = CRYPT_INTEGER_BLOB {
        cbData: wrapped.len() as u32,
        pbData: wrapped.as_ptr() as *mut u8,
    };
    let mut output = CRYPT_INTEGER_BLOB {
        cbData: 0,
        pbData: std::ptr::null_mut(),
    };

    // SAFETY: `input` borrows `wrapped` for the duration of the call and
    // `output` is allocated by DPAPI, copied out, then released with LocalFree.
    let ok = unsafe {
        CryptUnprotectData(
            &input,
            std::ptr::null_mut(),
            std::ptr::null(),
            std::ptr::null(),
            std::ptr::null(),
            0,
            &mut output,
        )
    };
    if ok == 0 {
        return Err(AuthError::SecretUnavailable {
            reason: SecretReason::Backend(format!(
                "CryptUnprotectData failed: {}",
                std::io::Error::last_os_error()
            )),
        });
    }

    let key = unsafe {
        let key = std::slice::from_raw_parts(output.pbData, output.cbData as usize).to_vec();
        LocalFree(output.pbData as _);
        key
    };
    Ok(key)
}

#[cfg(not(windows))]
fn unprotect(_wrapped: &[u8]) -> Result<Vec<u8>, AuthError> {
    Err(AuthError::SecretUnavailable {
        reason: SecretReason::Backend("DPAPI is only available on Windows".to_string()),
    })
}
