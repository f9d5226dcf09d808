//! Fixed prompt text sent alongside every user question.

/// Appended to each question so answers stay grounded in retrieved data.
pub const INSTRUCTION_SUFFIX: &str = r#"
Please give a concise, high-level summary followed by detail in
plain language about where the information in your response is
coming from in the database. Only use information that you learn
from BigQuery, do not make up information.
"#;

/// Questions shown when an interactive session starts.
pub const SAMPLE_PROMPTS: &[&str] = &[
    "What kind of information is in this database?",
    "What tables are available in the dataset?",
    "Can you show me the schema of table X?",
    "What are the main metrics related to X?",
    "Analyze the trends in metric Y over the past month",
    "What insights can you derive from the engagement metrics?",
    "How do metrics A and B correlate with each other?",
];

/// The question as sent to the model.
pub fn with_instructions(question: &str) -> String {
    let mut prompt = String::with_capacity(question.len() + INSTRUCTION_SUFFIX.len());
    prompt.push_str(question.trim_end());
    prompt.push('\n');
    prompt.push_str(INSTRUCTION_SUFFIX);
    prompt
}
