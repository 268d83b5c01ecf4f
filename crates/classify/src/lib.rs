//! Patrimonial-status classification.
//!
//! Species with at least one applicable rule are classified
//! deterministically. The remainder are handed to a generative-inference
//! fallback that adjudicates synonym and variant-spelling cases; its output
//! is untrusted structured text, validated before merge and tagged with
//! `Provenance::Inference` so downstream consumers can always tell
//! deterministic fact from model guess.

mod classifier;
mod inference;

pub use classifier::{build_prompt, classify, deterministic_map, merge_inferred, parse_inference_reply};
pub use inference::{strip_code_fences, ClassifyError, InferenceClient, InferenceConfig};
