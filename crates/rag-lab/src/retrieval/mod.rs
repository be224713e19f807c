//! Retrieval and answer pipeline

mod answer;

pub use answer::{answer, check_pairing, retrieve, Answer, DEFAULT_TOP_K};
