//! Query workflows: retrieval, prompt construction, completion and rendering.
//!
//! Retrieval failures reach this layer as empty document lists, so every
//! workflow still builds and sends its prompt. Completion failures and a
//! malformed decomposition are returned to the caller.

use std::sync::Arc;

use crate::core::errors::BackendError;
use crate::database::{
    DocumentEnricher, SearchFacade, DEFAULT_BLOG_LIMIT, DEFAULT_POLICY_LIMIT,
    DEFAULT_VISITOR_LIMIT,
};
use crate::llm::{ChatRequest, LanguageModel};
use crate::relations::{format_graph_results, RelationshipStore};
use super::annotator::MessageAnnotator;
use super::decomposition::parse_components;
use super::formatter::{format_context_items, format_to_html, raw_list, ContextShape};
use super::prompts;

/// Policy assertions fetched for each decomposed component.
pub const COMPONENT_LIMIT: usize = 15;

pub struct QueryService {
    search: Arc<SearchFacade>,
    llm: Arc<dyn LanguageModel>,
    annotator: Arc<MessageAnnotator>,
    graph: Option<Arc<dyn RelationshipStore>>,
}

impl QueryService {
    pub fn new(
        search: Arc<SearchFacade>,
        llm: Arc<dyn LanguageModel>,
        annotator: Arc<MessageAnnotator>,
        graph: Option<Arc<dyn RelationshipStore>>,
    ) -> Self {
        Self {
            search,
            llm,
            annotator,
            graph,
        }
    }

    pub fn search(&self) -> &Arc<SearchFacade> {
        &self.search
    }

    async fn complete(&self, prompt: String) -> Result<String, BackendError> {
        self.llm.complete(ChatRequest::single(prompt)).await
    }

    /// Visitor evidence formatted as the `Evidence base:` block.
    pub async fn visitor_context(&self, query: &str, limit: Option<usize>) -> String {
        let documents = self
            .search
            .get_visitor_evidence_context(query, limit.unwrap_or(DEFAULT_VISITOR_LIMIT))
            .await;
        let formatted = format_context_items(&documents, ContextShape::VisitorEvidence);
        format!("Evidence base:\n{}\n\n", formatted)
    }

    /// Relationship rows around `query`; empty without a graph store.
    pub async fn graph_context(&self, query: &str) -> String {
        let Some(graph) = &self.graph else {
            return String::new();
        };
        match graph.query_relationships(query).await {
            Ok(rows) => format_graph_results(&rows),
            Err(err) => {
                tracing::error!("Graph lookup failed: {}", err);
                String::new()
            }
        }
    }

    /// Analysis, evidence reliability summary and sources as three sections.
    pub async fn visitor_analysis(
        &self,
        query: &str,
        limit: Option<usize>,
    ) -> Result<String, BackendError> {
        let context = self.visitor_context(query, limit).await;

        let analysis = self
            .complete(prompts::visitor_analysis(query, &context))
            .await?;
        let evidence_summary = self.complete(prompts::evidence_summary(&context)).await?;

        let combined = format!(
            "<div class='analysis-section'>\
             <h2 class='text-xl font-bold'>Analysis</h2><p>{}</p></div>\
             <div class='evidence-summary-section mt-4'>\
             <h2 class='text-xl font-bold'>Evidence Summary</h2><p>{}</p></div>\
             <div class='sources-section mt-4'>\
             <h2 class='text-xl font-bold'>Sources</h2><p>{}</p></div>",
            analysis, evidence_summary, context
        );
        Ok(format_to_html(&combined))
    }

    pub async fn enquiry(&self, query: &str, limit: Option<usize>) -> Result<String, BackendError> {
        let assertions = self
            .search
            .get_blog_assertions(query, limit.unwrap_or(DEFAULT_BLOG_LIMIT))
            .await;

        let text = self
            .complete(prompts::enquiry(query, &raw_list(&assertions)))
            .await?;
        Ok(format_to_html(&text))
    }

    pub async fn policy_analysis(
        &self,
        query: &str,
        limit: Option<usize>,
    ) -> Result<String, BackendError> {
        let assertions = self
            .search
            .get_policy_assertions(query, limit.unwrap_or(DEFAULT_POLICY_LIMIT))
            .await;
        let formatted = format_context_items(&assertions, ContextShape::PolicyAssertions);

        let text = self
            .complete(prompts::policy_analysis(query, &formatted))
            .await?;
        Ok(format_to_html(&text))
    }

    /// Asks the model to split `query` into components.
    pub async fn decompose(&self, query: &str) -> Result<Vec<String>, BackendError> {
        let reply = self.complete(prompts::decomposition(query)).await?;
        parse_components(&reply)
    }

    /// Answers over the union of policy assertions for every component.
    ///
    /// `limit` overrides the per-component count.
    pub async fn decomposed_query(
        &self,
        query: &str,
        limit: Option<usize>,
    ) -> Result<String, BackendError> {
        let components = self.decompose(query).await?;
        tracing::debug!(count = components.len(), "Decomposed query");

        let per_component = limit.unwrap_or(COMPONENT_LIMIT);
        let mut combined = Vec::new();
        for component in &components {
            combined.extend(
                self.search
                    .get_policy_assertions(component, per_component)
                    .await,
            );
        }

        let text = self
            .complete(prompts::decomposed_answer(query, &raw_list(&combined)))
            .await?;
        Ok(format_to_html(&text))
    }

    pub async fn write_blog(&self, query: &str, limit: Option<usize>) -> Result<String, BackendError> {
        let assertions = self
            .search
            .get_blog_assertions(query, limit.unwrap_or(DEFAULT_BLOG_LIMIT))
            .await;
        let policies = self
            .search
            .get_policy_assertions(query, limit.unwrap_or(DEFAULT_POLICY_LIMIT))
            .await;

        let text = self
            .complete(prompts::blog(query, &raw_list(&assertions), &raw_list(&policies)))
            .await?;
        Ok(format_to_html(&text))
    }

    pub async fn summarize_message(&self, message: &str) -> Result<String, BackendError> {
        self.annotator.summarize_message(message).await
    }

    pub async fn tag_summary(&self, summary: &str) -> Result<String, BackendError> {
        self.annotator.tag_summary(summary).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{
        BackendFactory, BackendRegistry, Document, MessageFormat, ProviderId, RenderedResult,
        SearchBackend,
    };
    use crate::relations::Relationship;
    use crate::test_support::ScriptedModel;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::Mutex;

    /// Records every retrieval call and answers with fixed documents.
    #[derive(Default)]
    struct RecordingBackend {
        calls: Mutex<Vec<(String, String, usize)>>,
        policy_docs: Vec<Document>,
    }

    impl RecordingBackend {
        fn record(&self, op: &str, query: &str, limit: usize) {
            self.calls
                .lock()
                .unwrap()
                .push((op.to_string(), query.to_string(), limit));
        }
    }

    #[async_trait]
    impl SearchBackend for RecordingBackend {
        fn provider(&self) -> ProviderId {
            ProviderId::Astra
        }

        async fn initialize_connection(&self) -> Result<(), BackendError> {
            Ok(())
        }

        async fn close_connection(&self) -> Result<(), BackendError> {
            Ok(())
        }

        async fn health_check(&self) -> bool {
            true
        }

        async fn get_visitor_evidence_context(&self, query: &str, limit: usize) -> Vec<Document> {
            self.record("visitor", query, limit);
            Vec::new()
        }

        async fn get_policy_assertions(&self, query: &str, limit: usize) -> Vec<Document> {
            self.record("policy", query, limit);
            self.policy_docs.clone()
        }

        async fn get_blog_assertions(&self, query: &str, limit: usize) -> Vec<Document> {
            self.record("blog", query, limit);
            Vec::new()
        }

        async fn get_message_descriptions(&self, _q: &str, _l: usize) -> RenderedResult {
            RenderedResult::default()
        }

        async fn get_messages_since(
            &self,
            _since: DateTime<Utc>,
            _format: MessageFormat,
        ) -> RenderedResult {
            RenderedResult::default()
        }

        async fn upload_documents(&self, _c: &str, _d: Vec<Document>) -> bool {
            false
        }

        async fn delete_document_by_id(&self, _c: &str, _id: &str) -> bool {
            false
        }
    }

    struct SharedFactory(Arc<RecordingBackend>);

    #[async_trait]
    impl BackendFactory for SharedFactory {
        fn detect(&self) -> Result<ProviderId, BackendError> {
            Ok(ProviderId::Astra)
        }

        async fn create(&self, _provider: ProviderId) -> Result<Arc<dyn SearchBackend>, BackendError> {
            Ok(self.0.clone())
        }
    }

    struct FixedGraph;

    #[async_trait]
    impl RelationshipStore for FixedGraph {
        async fn query_relationships(&self, _term: &str) -> Result<Vec<Relationship>, BackendError> {
            Ok(vec![Relationship {
                source_name: "Peat".into(),
                relationship: "STORES".into(),
                target_name: "Carbon".into(),
                criticality: "High".into(),
                evidence: "IUCN".into(),
            }])
        }
    }

    async fn service(
        backend: Arc<RecordingBackend>,
        llm: Arc<ScriptedModel>,
    ) -> QueryService {
        let registry = Arc::new(BackendRegistry::new(Arc::new(SharedFactory(backend))));
        let facade = Arc::new(SearchFacade::new(registry, None).await.unwrap());
        let annotator = Arc::new(MessageAnnotator::new(llm.clone()));
        QueryService::new(facade, llm, annotator, None)
    }

    fn policy_doc(name: &str) -> Document {
        Document::new()
            .with("Name", name)
            .with("PolicyAssertion", format!("{} protects habitats", name))
            .with("Year", 2023)
            .with("Page", 12)
            .with("Link", format!("https://example.org/{}", name))
    }

    #[tokio::test]
    async fn policy_analysis_embeds_ordered_assertions_in_prompt() {
        let backend = Arc::new(RecordingBackend {
            policy_docs: vec![policy_doc("Strategy"), policy_doc("Manifesto")],
            ..RecordingBackend::default()
        });
        let llm = Arc::new(ScriptedModel::new().push("| Assertion | Source |\n|---|---|\n| a | b |"));
        let service = service(backend.clone(), llm.clone()).await;

        let html = service
            .policy_analysis("environmental policy", None)
            .await
            .unwrap();

        let prompt = &llm.prompts()[0];
        let context = prompt.split("Policy assertions:").nth(1).unwrap();
        assert_eq!(context.matches("<li>").count(), 2);
        assert!(context.find("Strategy").unwrap() < context.find("Manifesto").unwrap());
        for field in [
            "Assertion: <span>Strategy protects habitats</span>",
            "Source: <strong>Strategy</strong>",
            "Year: <span>2023</span>",
            "Page: <span>12</span>",
            "Link: <a href='https://example.org/Strategy'>",
        ] {
            assert!(context.contains(field), "missing {}", field);
        }
        assert_eq!(
            backend.calls.lock().unwrap()[0],
            ("policy".to_string(), "environmental policy".to_string(), DEFAULT_POLICY_LIMIT)
        );
        assert!(html.contains("<td class='border border-gray-300 px-4 py-2'>a</td>"));
    }

    #[tokio::test]
    async fn empty_retrieval_still_sends_prompts() {
        let backend = Arc::new(RecordingBackend::default());
        let llm = Arc::new(ScriptedModel::new().push("analysis").push("summary"));
        let service = service(backend, llm.clone()).await;

        let html = service.visitor_analysis("access", Some(3)).await.unwrap();

        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("Assertions:Evidence base:\n<ul></ul>"));
        assert!(prompts[1].contains("Context: Evidence base:\n<ul></ul>"));
        assert!(html.contains("<h2 class='text-xl font-bold'>Evidence Summary</h2>"));
        assert!(html.contains("summary"));
    }

    #[tokio::test]
    async fn enquiry_uses_blog_default_and_raw_list() {
        let backend = Arc::new(RecordingBackend::default());
        let llm = Arc::new(ScriptedModel::new());
        let service = service(backend.clone(), llm.clone()).await;

        service.enquiry("rewilding", None).await.unwrap();

        assert!(llm.prompts()[0].ends_with("Context: []"));
        assert_eq!(backend.calls.lock().unwrap()[0].2, DEFAULT_BLOG_LIMIT);
    }

    #[tokio::test]
    async fn malformed_decomposition_skips_retrieval() {
        let backend = Arc::new(RecordingBackend::default());
        let llm = Arc::new(ScriptedModel::new().push("The query is about peat and funding."));
        let service = service(backend.clone(), llm.clone()).await;

        let err = service.decomposed_query("peat funding", None).await.unwrap_err();

        assert!(matches!(err, BackendError::MalformedDecomposition(_)));
        assert!(backend.calls.lock().unwrap().is_empty());
        assert_eq!(llm.prompts().len(), 1);
    }

    #[tokio::test]
    async fn decomposition_queries_each_component_then_completes_once() {
        let backend = Arc::new(RecordingBackend {
            policy_docs: vec![policy_doc("Plan")],
            ..RecordingBackend::default()
        });
        let llm = Arc::new(
            ScriptedModel::new()
                .push(r#"[{"component": "peat"}, {"component": "funding"}]"#)
                .push("answer"),
        );
        let service = service(backend.clone(), llm.clone()).await;

        let html = service.decomposed_query("peat funding", None).await.unwrap();

        let calls = backend.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                ("policy".to_string(), "peat".to_string(), COMPONENT_LIMIT),
                ("policy".to_string(), "funding".to_string(), COMPONENT_LIMIT),
            ]
        );
        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts[1].matches("\"Name\":\"Plan\"").count(), 2);
        assert!(html.contains("<p>answer</p>"));
    }

    #[tokio::test]
    async fn completion_failure_is_returned() {
        let backend = Arc::new(RecordingBackend::default());
        let llm = Arc::new(ScriptedModel::new().push_error("timeout"));
        let service = service(backend, llm).await;

        let err = service.write_blog("otters", None).await.unwrap_err();

        assert!(matches!(err, BackendError::Upstream(_)));
    }

    #[tokio::test]
    async fn blog_combines_both_retrievals() {
        let backend = Arc::new(RecordingBackend::default());
        let llm = Arc::new(ScriptedModel::new());
        let service = service(backend.clone(), llm.clone()).await;

        service.write_blog("otters", None).await.unwrap();

        let ops: Vec<String> = backend
            .calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.0.clone())
            .collect();
        assert_eq!(ops, vec!["blog".to_string(), "policy".to_string()]);
        assert!(llm.prompts()[0].contains("Assertions: []\n\nPolicy Assertions: []"));
    }

    #[tokio::test]
    async fn graph_context_is_empty_without_store() {
        let backend = Arc::new(RecordingBackend::default());
        let llm = Arc::new(ScriptedModel::new());
        let plain = service(backend.clone(), llm.clone()).await;
        assert_eq!(plain.graph_context("peat").await, "");

        let registry = Arc::new(BackendRegistry::new(Arc::new(SharedFactory(backend))));
        let facade = Arc::new(SearchFacade::new(registry, None).await.unwrap());
        let with_graph = QueryService::new(
            facade,
            llm.clone(),
            Arc::new(MessageAnnotator::new(llm)),
            Some(Arc::new(FixedGraph)),
        );
        assert_eq!(
            with_graph.graph_context("peat").await,
            "Peat - STORES - Carbon (Criticality: High)\nIUCN\n\n"
        );
    }
}
