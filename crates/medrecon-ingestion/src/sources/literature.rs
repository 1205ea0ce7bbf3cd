//! Literature adapter over the PubMed E-utilities API.
//!
//! Endpoints used:
//!   esearch: https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi
//!   efetch:  https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi
//!
//! `fetch` runs esearch (JSON id list) then efetch (abstract XML), splits the
//! batch XML into one source-shaped payload per article, and wraps each in a
//! `RawRecord`. `parse` reads fields back out leniently.

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::json;
use tracing::{debug, instrument, warn};

use medrecon_common::entities::{Condition, SourceType};
use medrecon_common::error::SourceError;
use medrecon_common::guard::GuardedClient;

use super::{classify_status, FetchParams, SourceAdapter};
use crate::models::{PartialRecord, RawRecord};

const ESEARCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi";
const EFETCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi";

pub struct LiteratureAdapter {
    client: GuardedClient,
}

impl LiteratureAdapter {
    pub fn new(client: GuardedClient) -> Self {
        Self { client }
    }

    /// Search PubMed and return a list of PMIDs.
    #[instrument(skip(self, params))]
    async fn esearch(
        &self,
        term: &str,
        params: &FetchParams,
    ) -> Result<Vec<String>, SourceError> {
        let mut query = vec![
            ("db", "pubmed".to_string()),
            ("term", term.to_string()),
            ("retmax", params.max_results.to_string()),
            ("retmode", "json".to_string()),
            ("usehistory", "n".to_string()),
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
        if let Some(err) = classify_status(SourceType::Literature, resp.status()) {
            return Err(err);
        }
        let body: serde_json::Value = resp.json().await?;

        let ids: Vec<String> = body["esearchresult"]["idlist"]
            .as_array()
            .unwrap_or(&vec![])
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect();

        debug!(n = ids.len(), "PubMed esearch returned PMIDs");
        Ok(ids)
    }

    /// Fetch PubMed XML for a list of PMIDs.
    #[instrument(skip(self, params))]
    async fn efetch_abstracts(
        &self,
        pmids: &[String],
        params: &FetchParams,
    ) -> Result<String, SourceError> {
        let mut query = vec![
            ("db", "pubmed".to_string()),
            ("id", pmids.join(",")),
            ("rettype", "abstract".to_string()),
            ("retmode", "xml".to_string()),
        ];
        if let Some(key) = &params.api_key {
            query.push(("api_key", key.clone()));
        }

        let resp = self
            .client
            .get(EFETCH_URL)?
            .query(&query)
            .send()
            .await?;
        if let Some(err) = classify_status(SourceType::Literature, resp.status()) {
            return Err(err);
        }
        Ok(resp.text().await?)
    }
}

#[async_trait]
impl SourceAdapter for LiteratureAdapter {
    fn source_type(&self) -> SourceType {
        SourceType::Literature
    }

    async fn fetch(
        &self,
        condition: &Condition,
        params: &FetchParams,
    ) -> Result<Vec<RawRecord>, SourceError> {
        let pmids = self.esearch(condition.name(), params).await?;
        if pmids.is_empty() {
            return Ok(vec![]);
        }

        let xml = self.efetch_abstracts(&pmids, params).await?;
        let articles = split_pubmed_xml(&xml);
        debug!(n = articles.len(), "PubMed articles parsed from efetch XML");

        Ok(articles
            .into_iter()
            .map(|article| {
                let pmid = article["pmid"].as_str().map(String::from);
                RawRecord::new(SourceType::Literature, pmid, article)
            })
            .collect())
    }

    fn parse(&self, raw: &RawRecord) -> PartialRecord {
        let p = &raw.payload;
        PartialRecord {
            title: p["title"]
                .as_str()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from),
            year: p["year"].as_i64().map(|y| y as i32),
            abstract_text: p["abstract"].as_str().map(String::from),
            ..Default::default()
        }
    }
}

/// Split PubMed efetch XML into one JSON payload per `<PubmedArticle>`.
/// Captures PMID, title, abstract, journal, and publication year.
fn split_pubmed_xml(xml: &str) -> Vec<serde_json::Value> {
    let mut articles = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    // State machine over the <PubmedArticleSet><PubmedArticle> structure
    let mut in_article = false;
    let mut in_pmid = false;
    let mut in_title = false;
    let mut in_abstract = false;
    let mut in_journal = false;
    let mut in_pubdate = false;
    let mut in_year = false;
    let mut pmid: Option<String> = None;
    let mut title = String::new();
    let mut abstract_text = String::new();
    let mut journal: Option<String> = None;
    let mut year: Option<i32> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"PubmedArticle" => {
                    in_article = true;
                    pmid = None;
                    title.clear();
                    abstract_text.clear();
                    journal = None;
                    year = None;
                }
                b"PMID" => in_pmid = true,
                b"ArticleTitle" => in_title = true,
                b"AbstractText" => in_abstract = true,
                b"Title" => in_journal = true,
                b"PubDate" => in_pubdate = true,
                b"Year" => in_year = true,
                _ => {}
            },
            Ok(Event::Text(ref e)) => {
                if !in_article {
                    continue;
                }
                let text = e.unescape().unwrap_or_default().to_string();
                if in_pmid && pmid.is_none() {
                    pmid = Some(text);
                } else if in_title {
                    title.push_str(&text);
                } else if in_abstract {
                    if !abstract_text.is_empty() {
                        abstract_text.push(' ');
                    }
                    abstract_text.push_str(&text);
                } else if in_journal && journal.is_none() {
                    journal = Some(text);
                } else if in_pubdate && in_year && year.is_none() {
                    year = text.parse::<i32>().ok();
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"PMID" => in_pmid = false,
                b"ArticleTitle" => in_title = false,
                b"AbstractText" => in_abstract = false,
                b"Title" => in_journal = false,
                b"PubDate" => in_pubdate = false,
                b"Year" => in_year = false,
                b"PubmedArticle" => {
                    in_article = false;
                    articles.push(json!({
                        "pmid": pmid,
                        "title": if title.is_empty() { None } else { Some(title.clone()) },
                        "abstract": if abstract_text.is_empty() { None } else { Some(abstract_text.clone()) },
                        "journal": journal,
                        "year": year,
                    }));
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!("XML parse error: {}", e);
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    articles
}
