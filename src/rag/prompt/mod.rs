#[cfg(test)]
mod tests;

/// Renders the grounding-constrained instruction sent to the generator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptBuilder {
    manual_name: String,
}

impl PromptBuilder {
    #[inline]
    pub fn new(manual_name: impl Into<String>) -> Self {
        Self {
            manual_name: manual_name.into(),
        }
    }

    #[inline]
    pub fn manual_name(&self) -> &str {
        &self.manual_name
    }

    /// Context and question are inserted verbatim
    #[inline]
    pub fn build(&self, context: &str, question: &str) -> String {
        format!(
            "You are a professional service assistant for the {manual}.
Your goal is to provide accurate technical advice based ONLY on the manual context provided.

MANUAL CONTEXT:
{context}

USER QUESTION: {question}

INSTRUCTIONS:
1. Answer ONLY from the manual context above. Do not use outside knowledge.
2. If the context does not contain the answer, state explicitly that the information is not available in the {manual}.
3. Be concise and technical.

ANSWER:",
            manual = self.manual_name,
        )
    }
}
