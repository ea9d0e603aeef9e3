use crate::core::text::tokenize;
use crate::services::KnowledgeStore;

/// Reply used when the knowledge base has nothing for the question.
pub const FALLBACK_REPLY: &str = "I don't know the answer. Want to try 'openai <your question>'?";

/// Answers questions from the local knowledge base.
pub struct LocalAI {
    store: KnowledgeStore,
}

impl LocalAI {
    pub fn new(store: KnowledgeStore) -> Self {
        Self { store }
    }

    /// Exact match first, then keyword overlap, then [`FALLBACK_REPLY`].
    pub fn get_response(&self, user_input: &str) -> String {
        if let Some(answer) = self.exact_match(user_input) {
            log::debug!("🎯 Exact match");
            return answer.to_string();
        }

        if let Some(answer) = self.keyword_match(user_input) {
            log::debug!("🔑 Keyword match");
            return answer.to_string();
        }

        log::debug!("🤷 No local answer");
        FALLBACK_REPLY.to_string()
    }

    /// Case-insensitive equality between the whole query and a stored question.
    pub fn exact_match(&self, query: &str) -> Option<&str> {
        self.store.get(query)
    }

    /// Best stored question by shared token count.
    ///
    /// Every pair of equal tokens counts, so a word repeated in the query
    /// scores once per occurrence. Ties keep the entry seen first, which is the
    /// smallest question in store order. `None` when nothing overlaps.
    pub fn keyword_match(&self, query: &str) -> Option<&str> {
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            return None;
        }

        let mut best: Option<&str> = None;
        let mut max_count = 0;
        for entry in self.store.iter() {
            let count = overlap(&query_tokens, &tokenize(&entry.question));
            if count > max_count {
                max_count = count;
                best = Some(entry.answer.as_str());
            }
        }
        best
    }

    pub fn knowledge(&self) -> &KnowledgeStore {
        &self.store
    }
}

fn overlap(query: &[String], question: &[String]) -> usize {
    query
        .iter()
        .map(|q| question.iter().filter(|k| *k == q).count())
        .sum()
}
