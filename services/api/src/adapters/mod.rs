pub mod answer_llm;
pub mod db;
pub mod europe_pmc;
pub mod keywords_llm;
pub mod llm;
pub mod memory_store;
pub mod pubmed;
pub mod suggestions_llm;
pub mod summary_llm;
pub mod translate_llm;

pub use answer_llm::OpenAiAnswerAdapter;
pub use db::DbAdapter;
pub use europe_pmc::EuropePmcAdapter;
pub use keywords_llm::OpenAiKeywordAdapter;
pub use memory_store::InMemoryStore;
pub use pubmed::PubMedAdapter;
pub use suggestions_llm::OpenAiSuggestionAdapter;
pub use summary_llm::OpenAiSummaryAdapter;
pub use translate_llm::OpenAiTranslationAdapter;
