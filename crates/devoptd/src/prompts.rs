//! Prompt templates for the text-generation model.

use devopt_common::Snapshot;

/// Instructions prepended to every optimization request
pub const OPTIMIZATION_INSTRUCTIONS: &str = "\
Answer the question as detailed as possible from the provided context. Make sure to provide all the details.
If the answer is not in the provided context, just say, \"Answer is not available in the context.\" Don't provide a wrong answer.";

/// The question asked about the snapshot
pub const OPTIMIZATION_QUESTION: &str = "\
Based on the above system information, provide at least five detailed and actionable recommendations \
to optimize the developer's environment for better efficiency and performance.";

/// Full prompt embedding the snapshot as JSON
pub fn optimization_prompt(snapshot: &Snapshot) -> String {
    format!(
        "{}\n\nContext: {}\n\nQuestion: {}\n\nAnswer (Use markdown formatting for numbering and bullet points):\n",
        OPTIMIZATION_INSTRUCTIONS,
        snapshot.to_pretty_json(),
        OPTIMIZATION_QUESTION
    )
}
