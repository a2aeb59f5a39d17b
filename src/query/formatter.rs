use pulldown_cmark::{html, Options, Parser};
use serde_json::Value;

use crate::database::table::STYLESHEET_LINK;
use crate::database::Document;

/// How retrieved documents are laid out inside a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextShape {
    VisitorEvidence,
    PolicyAssertions,
    Raw,
}

/// Renders retrieved documents in retrieval order; missing fields render empty.
pub fn format_context_items(items: &[Document], shape: ContextShape) -> String {
    match shape {
        ContextShape::VisitorEvidence => {
            let entries: String = items
                .iter()
                .map(|item| {
                    format!(
                        "<li><strong>{}</strong> - Assertion: {} - \
                         [Evidence: <span>{}</span>] - <span>{}</span></li>",
                        item.text("Name"),
                        item.text("PolicyAssertion"),
                        item.text("Evidence"),
                        item.text("Year"),
                    )
                })
                .collect();
            format!("<ul>{}</ul>", entries)
        }
        ContextShape::PolicyAssertions => {
            let entries: String = items
                .iter()
                .map(|item| {
                    let link = item.text("Link");
                    format!(
                        "<li>Assertion: <span>{}</span> - Source: <strong>{}</strong> - \
                         Year: <span>{}</span> - Page: <span>{}</span> - \
                         Link: <a href='{}'>{}</a></li>",
                        item.text("PolicyAssertion"),
                        item.text("Name"),
                        item.text("Year"),
                        item.text("Page"),
                        link,
                        link,
                    )
                })
                .collect();
            format!("<ul>{}</ul>", entries)
        }
        ContextShape::Raw => format!("<div>{}</div>", raw_list(items)),
    }
}

/// Documents as a JSON array, for prompts that take the unformatted list.
pub fn raw_list(items: &[Document]) -> String {
    Value::Array(items.iter().map(|d| Value::Object(d.as_map().clone())).collect()).to_string()
}

/// Markdown (with tables) to HTML inside the styled answer container.
pub fn format_to_html(text: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    let parser = Parser::new_ext(text, options);

    let mut body = String::new();
    html::push_html(&mut body, parser);

    let body = body
        .replace('\n', "")
        .replace(
            "<table>",
            "<br><table class='table-auto border-collapse border border-gray-300'>",
        )
        .replace(
            "<th>",
            "<th class='border border-gray-300 bg-gray-100 px-4 py-2 text-left'>",
        )
        .replace("<td>", "<td class='border border-gray-300 px-4 py-2'>");

    format!(
        "{}<div class='prose max-w-none bg-gradient-to-r from-blue-50 to-blue-100 \
         p-12 rounded-2xl shadow-xl hover:shadow-2xl transition-shadow duration-300 \
         border border-blue-200'>{}</div>",
        STYLESHEET_LINK, body
    )
}
