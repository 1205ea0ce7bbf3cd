//! Clinical trial adapter over the ClinicalTrials.gov v2 API.
//!
//! API docs: https://clinicaltrials.gov/data-api/api
//! Endpoint: https://clinicaltrials.gov/api/v2/studies
//!
//! Each study JSON object becomes one `RawRecord` keyed by its NCT id.

use async_trait::async_trait;
use tracing::{debug, instrument};

use medrecon_common::entities::{Condition, SourceType};
use medrecon_common::error::SourceError;
use medrecon_common::guard::GuardedClient;

use super::{classify_status, FetchParams, SourceAdapter};
use crate::models::{PartialRecord, RawRecord, TrialStatus};

const CT_API_URL: &str = "https://clinicaltrials.gov/api/v2/studies";

pub struct TrialAdapter {
    client: GuardedClient,
}

impl TrialAdapter {
    pub fn new(client: GuardedClient) -> Self {
        Self { client }
    }

    #[instrument(skip(self, params))]
    async fn search_studies(
        &self,
        term: &str,
        params: &FetchParams,
    ) -> Result<Vec<serde_json::Value>, SourceError> {
        let mut query = vec![
            ("query.cond", term.to_string()),
            ("pageSize", params.max_results.to_string()),
            ("format", "json".to_string()),
            (
                "fields",
                "NCTId,BriefTitle,OverallStatus,Condition,StartDate,CompletionDate,\
                 LeadSponsorName"
                    .to_string(),
            ),
        ];
        if let Some(ref status) = params.status_filter {
            // v2 status filter takes the SCREAMING_SNAKE status name
            query.push((
                "filter.overallStatus",
                status.as_str().to_uppercase().replace(' ', "_"),
            ));
        }

        let resp = self
            .client
            .get(CT_API_URL)?
            .query(&query)
            .send()
            .await?;
        if let Some(err) = classify_status(SourceType::Trial, resp.status()) {
            return Err(err);
        }
        let body: serde_json::Value = resp.json().await?;

        Ok(body["studies"].as_array().cloned().unwrap_or_default())
    }
}

#[async_trait]
impl SourceAdapter for TrialAdapter {
    fn source_type(&self) -> SourceType {
        SourceType::Trial
    }

    async fn fetch(
        &self,
        condition: &Condition,
        params: &FetchParams,
    ) -> Result<Vec<RawRecord>, SourceError> {
        let studies = self.search_studies(condition.name(), params).await?;
        debug!(n = studies.len(), "ClinicalTrials.gov studies retrieved");

        Ok(studies
            .into_iter()
            .map(|study| {
                let nct_id = study["protocolSection"]["identificationModule"]["nctId"]
                    .as_str()
                    .map(String::from);
                RawRecord::new(SourceType::Trial, nct_id, study)
            })
            .collect())
    }

    fn parse(&self, raw: &RawRecord) -> PartialRecord {
        let proto = &raw.payload["protocolSection"];
        let id_mod = &proto["identificationModule"];
        let status_mod = &proto["statusModule"];

        let trial_id = id_mod["nctId"]
            .as_str()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(String::from);

        let status = status_mod["overallStatus"]
            .as_str()
            .filter(|s| !s.trim().is_empty())
            .map(TrialStatus::parse);

        // Start year from "YYYY-MM-DD" or bare "YYYY"
        let year = status_mod["startDateStruct"]["date"]
            .as_str()
            .and_then(|d| d.get(..4))
            .and_then(|y| y.parse::<i32>().ok());

        PartialRecord {
            title: id_mod["briefTitle"]
                .as_str()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from),
            trial_id,
            status,
            year,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn study(nct: &str, title: &str, status: &str, start: &str) -> serde_json::Value {
        json!({
            "protocolSection": {
                "identificationModule": { "nctId": nct, "briefTitle": title },
                "statusModule": {
                    "overallStatus": status,
                    "startDateStruct": { "date": start },
                },
            }
        })
    }

    #[test]
    fn test_parse_study() {
        let adapter = TrialAdapter::new(GuardedClient::new().unwrap());
        let raw = RawRecord::new(
            SourceType::Trial,
            Some("NCT04956640".to_string()),
            study("NCT04956640", "Olaparib in metastatic breast cancer", "RECRUITING", "2021-07-01"),
        );
        let partial = adapter.parse(&raw);
        assert_eq!(partial.trial_id.as_deref(), Some("NCT04956640"));
        assert_eq!(partial.status, Some(TrialStatus::Recruiting));
        assert_eq!(partial.year, Some(2021));
        assert!(!partial.is_unusable());
    }

    #[test]
    fn test_parse_unknown_status_retained() {
        let adapter = TrialAdapter::new(GuardedClient::new().unwrap());
        let raw = RawRecord::new(
            SourceType::Trial,
            Some("NCT00000002".to_string()),
            study("NCT00000002", "Withdrawn trial", "TERMINATED", "2019"),
        );
        let partial = adapter.parse(&raw);
        assert_eq!(
            partial.status,
            Some(TrialStatus::Other("TERMINATED".to_string()))
        );
        assert_eq!(partial.year, Some(2019));
    }

    #[test]
    fn test_parse_empty_study_is_lenient() {
        let adapter = TrialAdapter::new(GuardedClient::new().unwrap());
        let raw = RawRecord::new(SourceType::Trial, None, json!({}));
        let partial = adapter.parse(&raw);
        assert!(partial.trial_id.is_none());
        assert!(partial.status.is_none());
        assert!(partial.is_unusable());
    }
}
