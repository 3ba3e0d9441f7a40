//! sotax-rag - 소득세법 대화형 RAG 챗봇
//!
//! 사용자 질문을 사전 기반으로 변경하고, 대화 히스토리를 반영해 독립
//! 질문으로 재구성한 뒤, LanceDB 벡터 인덱스에서 관련 법령 청크를
//! 검색하여 근거 있는 답변을 스트리밍으로 생성합니다.

pub mod chain;
pub mod cli;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod knowledge;
pub mod llm;
pub mod prompt;
pub mod session;

// Re-exports
pub use chain::{ConversationChain, DEFAULT_SESSION_ID};
pub use config::{get_api_key, has_api_key, AppConfig};
pub use embedding::{EmbeddingProvider, OpenAiEmbedding};
pub use knowledge::{
    default_chunker, ChunkConfig, Chunker, ChunkEntry, LanceVectorStore, Retriever,
    RetrievedChunk, StatuteChunker, VectorStore, EMBEDDING_DIMENSION, TOP_K,
};
pub use llm::{ChatMessage, ChatModel, LlmError, OpenAiChat, Role, TokenStream};
pub use prompt::{FewShotExample, ANSWER_EXAMPLES};
pub use session::{SessionStore, Turn};
