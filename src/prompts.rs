//! Prompt templates for the model-backed retrieval capabilities.
//!
//! Three prompts, one per capability: binary relevance grading, query
//! rewriting, and initial query suggestion. The grader and the initial
//! suggester ask for JSON; the rewriter answers with a bare query string.

/// Grade one document against the question. The model must answer with
/// `{"score": "yes"}` or `{"score": "no"}` and nothing else.
pub fn grade_document(question: &str, content: &str) -> String {
    format!(
        r#"You are a lenient code relevance checker. Decide whether the code
snippet below has ANY relation to the user's question.

Code snippet:
{content}

User's question:
{question}

Count the snippet as relevant if it shares keywords or concepts with the
question, or if it belongs to the same user flow (a component the feature
touches, an API it calls). Unrelated build or deployment configuration is
usually not relevant.

Answer with a JSON object with the single key 'score' set to "yes" or "no".
No preamble, no explanation."#
    )
}

/// Rewrite the question into a better vector-search query, steering away
/// from queries that already underperformed.
pub fn rewrite_query(question: &str, file_paths: &str, previous_queries: &str) -> String {
    format!(
        r#"You are an expert at formulating code search queries. Review the
project structure first and let it guide you:

~~~
{file_paths}
~~~

Guidelines:
1. The query is a set of plain English words separated by spaces, at most 25 words.
2. Prefer a general pattern over very specific code.
3. If the question names a framework that likely is not in this codebase,
   search for its equivalent or for the general pattern instead.
4. No code blocks, no natural-language sentences, no overly specific
   variable names.

The question:

<question>
{question}
</question>

Queries that already failed to find enough context — do not repeat them:
~~~
{previous_queries}
~~~

Respond with the query only. No preamble, no explanation."#
    )
}

/// Suggest which files look relevant to the question, as a seed for the
/// first retrieval pass. The model must answer with
/// `{{"filePaths": [...]}}`.
pub fn initial_query(question: &str, file_paths: &str) -> String {
    format!(
        r#"Given a question about a codebase and the list of files in it,
pick the file paths most likely to contain the answer.

Files:
~~~
{file_paths}
~~~

Question:
{question}

Answer with a JSON object with a single key 'filePaths' holding an array of
paths taken from the list above. No preamble, no explanation."#
    )
}
