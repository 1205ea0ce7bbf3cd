//! Gene-association adapter over the NCBI Gene database (E-utilities).
//!
//! Endpoints used:
//!   esearch:  db=gene, condition as term — returns gene UIDs
//!   esummary: db=gene — returns per-UID summary objects (JSON)
//!
//! Each summary object becomes one `RawRecord`; the association to the
//! condition is the search itself, so the payload stays source-shaped.

use async_trait::async_trait;
use tracing::{debug, instrument};

use medrecon_common::entities::{Condition, SourceType};
use medrecon_common::error::SourceError;
use medrecon_common::guard::GuardedClient;

use super::{classify_status, FetchParams, SourceAdapter};
use crate::models::{PartialRecord, RawRecord};

const ESEARCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi";
const ESUMMARY_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esummary.fcgi";

pub struct GeneAssociationAdapter {
    client: GuardedClient,
}

impl GeneAssociationAdapter {
    pub fn new(client: GuardedClient) -> Self {
        Self { client }
    }

    #[instrument(skip(self, params))]
    async fn esearch_genes(
        &self,
        term: &str,
        params: &FetchParams,
    ) -> Result<Vec<String>, SourceError> {
        let mut query = vec![
            ("db", "gene".to_string()),
            ("term", format!("{}[disease]", term)),
            ("retmax", params.max_results.to_string()),
            ("retmode", "json".to_string()),
        ];
        if let Some(key) = &params.api_key {
            query.push(("api_key", key.clone()));
        }

        let resp = self
            .client
            .get(ESEARCH_URL)?
            .query(&query)
            .send()
            .await?;
        if let Some(err) = classify_status(SourceType::GeneAssociation, resp.status()) {
            return Err(err);
        }
        let body: serde_json::Value = resp.json().await?;

        let uids: Vec<String> = body["esearchresult"]["idlist"]
            .as_array()
            .unwrap_or(&vec![])
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect();

        debug!(n = uids.len(), "NCBI Gene esearch returned UIDs");
        Ok(uids)
    }

    #[instrument(skip(self, params))]
    async fn esummary_genes(
        &self,
        uids: &[String],
        params: &FetchParams,
    ) -> Result<Vec<(String, serde_json::Value)>, SourceError> {
        let mut query = vec![
            ("db", "gene".to_string()),
            ("id", uids.join(",")),
            ("retmode", "json".to_string()),
        ];
        if let Some(key) = &params.api_key {
            query.push(("api_key", key.clone()));
        }

        let resp = self
            .client
            .get(ESUMMARY_URL)?
            .query(&query)
            .send()
            .await?;
        if let Some(err) = classify_status(SourceType::GeneAssociation, resp.status()) {
            return Err(err);
        }
        let body: serde_json::Value = resp.json().await?;

        // esummary keys each record under its UID inside "result",
        // with "uids" listing them in result order.
        let result = &body["result"];
        let ordered: Vec<(String, serde_json::Value)> = result["uids"]
            .as_array()
            .unwrap_or(&vec![])
            .iter()
            .filter_map(|v| v.as_str())
            .filter_map(|uid| {
                let summary = &result[uid];
                if summary.is_object() {
                    Some((uid.to_string(), summary.clone()))
                } else {
                    None
                }
            })
            .collect();

        Ok(ordered)
    }
}

#[async_trait]
impl SourceAdapter for GeneAssociationAdapter {
    fn source_type(&self) -> SourceType {
        SourceType::GeneAssociation
    }

    async fn fetch(
        &self,
        condition: &Condition,
        params: &FetchParams,
    ) -> Result<Vec<RawRecord>, SourceError> {
        let uids = self.esearch_genes(condition.name(), params).await?;
        if uids.is_empty() {
            return Ok(vec![]);
        }

        let summaries = self.esummary_genes(&uids, params).await?;
        debug!(n = summaries.len(), "NCBI Gene summaries retrieved");

        Ok(summaries
            .into_iter()
            .map(|(uid, summary)| {
                RawRecord::new(SourceType::GeneAssociation, Some(uid), summary)
            })
            .collect())
    }

    fn parse(&self, raw: &RawRecord) -> PartialRecord {
        let p = &raw.payload;
        let symbol = p["name"]
            .as_str()
            .or_else(|| p["nomenclaturesymbol"].as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty());

        PartialRecord {
            title: p["description"]
                .as_str()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(String::from)
                .or_else(|| symbol.map(String::from)),
            genes: symbol.map(|s| vec![s.to_string()]).unwrap_or_default(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_gene_summary() {
        let adapter = GeneAssociationAdapter::new(GuardedClient::new().unwrap());
        let raw = RawRecord::new(
            SourceType::GeneAssociation,
            Some("672".to_string()),
            json!({
                "name": "BRCA1",
                "description": "BRCA1 DNA repair associated",
                "chromosome": "17",
            }),
        );
        let partial = adapter.parse(&raw);
        assert_eq!(partial.genes, vec!["BRCA1".to_string()]);
        assert_eq!(partial.title.as_deref(), Some("BRCA1 DNA repair associated"));
    }

    #[test]
    fn test_parse_missing_symbol_yields_unusable() {
        let adapter = GeneAssociationAdapter::new(GuardedClient::new().unwrap());
        let raw = RawRecord::new(
            SourceType::GeneAssociation,
            Some("0".to_string()),
            json!({ "chromosome": "17" }),
        );
        let partial = adapter.parse(&raw);
        assert!(partial.genes.is_empty());
        assert!(partial.is_unusable());
    }

    #[test]
    fn test_parse_falls_back_to_nomenclature_symbol() {
        let adapter = GeneAssociationAdapter::new(GuardedClient::new().unwrap());
        let raw = RawRecord::new(
            SourceType::GeneAssociation,
            Some("7157".to_string()),
            json!({ "nomenclaturesymbol": "TP53" }),
        );
        let partial = adapter.parse(&raw);
        assert_eq!(partial.genes, vec!["TP53".to_string()]);
        assert_eq!(partial.title.as_deref(), Some("TP53"));
    }
}
