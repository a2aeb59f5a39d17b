//! Prompt templates for each workflow.

pub fn visitor_analysis(query: &str, context: &str) -> String {
    format!(
        "Review the context and provide a concise, integrated, neutral and \
         balanced response to the Query, strictly adhering to the context provided, \
         and using simple language and written for an internal management audience. \
         Limit your response to 300 words, using UK English:\n\nQuery: {query}\
         \n\nAssertions:{context}"
    )
}

pub fn evidence_summary(context: &str) -> String {
    format!(
        "Please provide a high level summary of the nature of the evidence sources \
         available listed in the context. What kind of sources are these and how \
         reliable are they likely to be? Limit your response to 120 words, \
         using UK English (en-gb):\n\nContext: {context}"
    )
}

pub fn enquiry(query: &str, context: &str) -> String {
    format!(
        "Your role is to answer the query by providing a clear and concise response \
         in less than 200 words and drawing exclusively from the Context, and explain \
         how it is drawn from the context or just related to the context. Please use \
         UK English spelling. List the most relevant sources, including the year and \
         source with a URL. The blog should be clear, informative, and suitable for \
         a general audience. Use straightforward language and avoid overly formal or \
         dramatic terms. Make sure the arguments are balanced and include references. \
         en-gb:\n\nQuery: {query}\n\nContext: {context}"
    )
}

pub fn policy_analysis(query: &str, assertions: &str) -> String {
    format!(
        "You are a policy assistant responding to requests by highlighting the \
         Scottish Wildlife Trust's policy assertions. You responses always use UK \
         English spelling and always refer to the Scottish Wildlife Trust as the \
         Trust or its full name, never as SWT. Please answer the following query \
         based on the provided policy assertions, by providing a summary analysis \
         followed by a table format list of the relevant assertions and the Name \
         of their source (with its web link), and the source's Year and page number:\
         \n\n{query}\n\nPolicy assertions:{assertions}"
    )
}

/// Asks for strict JSON so the reply can be schema-checked.
pub fn decomposition(query: &str) -> String {
    format!(
        "Your role is to break down the query into its constituent parts. \
         Respond with only a JSON array of the main components of the query \
         in the format [{{\"component\": \"item\"}}], with no other text. \
         Use UK English spelling. en-gb:\n\nQuery: {query}"
    )
}

pub fn decomposed_answer(query: &str, context: &str) -> String {
    format!("Please answer the query using the context. en-gb:\n\nQuery: {query}\n\nContext: {context}")
}

pub fn blog(query: &str, assertions: &str, policies: &str) -> String {
    format!(
        "Please write a 400-word blog post with an engaging title in response to \
         the following query. Use en-gb spelling throughout. Ensure any evidence \
         referenced is accurately reflected in the provided assertions, including \
         the year and source with a URL. The blog should be clear, informative, \
         and suitable for a general audience. Use straightforward language and \
         avoid overly formal or dramatic terms. Make sure the arguments are \
         balanced and include references. \n\nQuery: {query}\n\nAssertions: {assertions}\
         \n\nPolicy Assertions: {policies}"
    )
}

pub fn summarize_message(message: &str) -> String {
    format!(
        "Please summarise the following message in a clear and concise manner in less than 40 words, \
         using UK English (en-gb):\n\nMessage: {message}"
    )
}

pub fn tag_summary(summary: &str) -> String {
    format!(
        "Please generate a concise and relevant tag for the following summary. \
         The tag should be up to two single words, separated by commas that captures the essence of the summary. \
         For example, conservation, policy, operations, academic, digital, staff development etc. \
         Use UK English spelling.\n\nSummary: {summary}"
    )
}
