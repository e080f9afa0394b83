use crate::aggregator::ErrorGroup;

/// System and user messages for one suggestion request
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn new(groups: &[ErrorGroup], language: &str) -> Self {
        Self {
            system: system_message(language),
            user: format_prompt(groups, language),
        }
    }
}

/// System message pinning the assistant's role and response language
pub fn system_message(language: &str) -> String {
    format!(
        "You are a helpful system troubleshooting assistant. Always respond in {} language.",
        language
    )
}

/// Build the troubleshooting prompt for the ranked error groups
///
/// Each group becomes a numbered block carrying its source, event ID,
/// occurrence count and sample message. The surrounding instructions ask for
/// a likely cause and concrete remediation steps per error, in `language`.
pub fn format_prompt(groups: &[ErrorGroup], language: &str) -> String {
    let error_summary: String = groups
        .iter()
        .enumerate()
        .map(|(i, group)| {
            format!(
                "\n--- Error #{} ---\nSource: {}\nEvent ID: {}\nOccurrences: {}\nSample message: {}\n",
                i + 1,
                group.source,
                group.event_id,
                group.count,
                group.sample_message
            )
        })
        .collect();

    format!(
        r#"You are an experienced system administrator and troubleshooting expert.
The system logs of a machine were analyzed and the most frequently recurring critical and error events were identified.

Here is a summary of the most frequent errors:
{errors}
Based only on the information above (source, event ID, occurrence count, sample message), do the following for each error in {language}:

1.  **Likely cause:** Briefly explain the most probable reason this error occurs.
2.  **Troubleshooting steps:** Suggest concrete, step-by-step actions the user can take to diagnose and resolve the problem. Focus on practical, actionable advice and put the most common or effective fixes first.
3.  **Structure:** Keep the analysis of each error clearly separated, using headings such as "Error #1 Analysis" and "Error #2 Analysis".

**Important:**
* Do not ask for additional information. Give your best guidance from the summary alone.
* Your goal is to help the user fix the problems behind these log entries.
* **You must answer in {language}.** Use clear, easy to understand wording.
"#,
        errors = error_summary,
        language = language
    )
}
