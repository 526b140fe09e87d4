//! Token counting oracle.
//!
//! The scan, packer and tests only need "text in, token count out", expressed by
//! [`TokenCounter`]. The production implementation wraps a tiktoken BPE that is
//! built at most once per encoding and shared process-wide.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use lazy_static::lazy_static;
use tiktoken_rs::CoreBPE;
use tracing::debug;

use crate::error::{CpaiError, Result};

pub const DEFAULT_ENCODING: &str = "o200k_base";

/// Deterministic text -> token count function.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

lazy_static! {
    static ref ENCODERS: Mutex<HashMap<String, Arc<CoreBPE>>> = Mutex::new(HashMap::new());
}

/// Picks an encoding from a model name by family substring.
pub fn encoding_for_model(model: Option<&str>) -> &'static str {
    let Some(model) = model else {
        return DEFAULT_ENCODING;
    };
    let m = model.to_lowercase();
    if m.contains("4o") || m.contains("4.1") || m.starts_with("o3") || m.starts_with("o1") {
        "o200k_base"
    } else if m.contains("gpt-4") || m.contains("gpt-3.5") {
        "cl100k_base"
    } else {
        DEFAULT_ENCODING
    }
}

/// An explicit encoding always wins over the model heuristic.
pub fn resolve_encoding(model: Option<&str>, encoding: Option<&str>) -> String {
    match encoding {
        Some(e) if !e.trim().is_empty() => e.trim().to_string(),
        _ => encoding_for_model(model).to_string(),
    }
}

fn build_bpe(encoding: &str) -> Result<CoreBPE> {
    let built = match encoding {
        "o200k_base" => tiktoken_rs::o200k_base(),
        "cl100k_base" => tiktoken_rs::cl100k_base(),
        "p50k_base" => tiktoken_rs::p50k_base(),
        "p50k_edit" => tiktoken_rs::p50k_edit(),
        "r50k_base" | "gpt2" => tiktoken_rs::r50k_base(),
        other => return Err(CpaiError::UnknownEncoding(other.to_string())),
    };
    built.map_err(|e| CpaiError::Tokenizer {
        encoding: encoding.to_string(),
        message: e.to_string(),
    })
}

/// Handle to a memoized tiktoken encoder.
#[derive(Clone)]
pub struct Tokenizer {
    encoding: String,
    bpe: Arc<CoreBPE>,
}

impl std::fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tokenizer")
            .field("encoding", &self.encoding)
            .finish()
    }
}

impl Tokenizer {
    /// Returns the shared encoder for `encoding`, building it on first use.
    pub fn acquire(encoding: &str) -> Result<Self> {
        let mut encoders = ENCODERS.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(bpe) = encoders.get(encoding) {
            return Ok(Self {
                encoding: encoding.to_string(),
                bpe: Arc::clone(bpe),
            });
        }

        debug!(encoding, "building tokenizer");
        let bpe = Arc::new(build_bpe(encoding)?);
        encoders.insert(encoding.to_string(), Arc::clone(&bpe));
        Ok(Self {
            encoding: encoding.to_string(),
            bpe,
        })
    }

    pub fn for_model(model: Option<&str>, encoding: Option<&str>) -> Result<Self> {
        Self::acquire(&resolve_encoding(model, encoding))
    }

    pub fn encoding(&self) -> &str {
        &self.encoding
    }
}

impl TokenCounter for Tokenizer {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

/// Forgets the memoized encoder for `encoding`. Handles already given out stay valid.
pub fn release(encoding: &str) {
    ENCODERS
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(encoding);
}

/// Scoped ownership of the process-wide oracle: acquire at startup, release
/// the memoized encoder when the scope ends.
pub struct OracleScope {
    tokenizer: Tokenizer,
}

impl OracleScope {
    pub fn open(model: Option<&str>, encoding: Option<&str>) -> Result<Self> {
        Ok(Self {
            tokenizer: Tokenizer::for_model(model, encoding)?,
        })
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }
}

impl Drop for OracleScope {
    fn drop(&mut self) {
        release(self.tokenizer.encoding());
    }
}

/// Counts with the default encoding.
pub fn count_tokens(text: &str) -> Result<usize> {
    Ok(Tokenizer::acquire(DEFAULT_ENCODING)?.count(text))
}
