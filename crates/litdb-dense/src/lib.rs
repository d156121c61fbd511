#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! Dense retrieval: a REST client for the external vector index plus the
//! retriever that falls back to brute-force cosine similarity over locally
//! cached embeddings when the index is unreachable.

pub mod qdrant;
pub mod retriever;

pub use qdrant::QdrantIndex;
pub use retriever::{cosine_similarity, normalize_dense_score, DenseHit, DenseRetriever};
