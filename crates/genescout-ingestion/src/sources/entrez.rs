//! Entrez gene links for a publication.
//!
//! Two-step lookup:
//!   elink:  {base}/elink.fcgi?dbfrom=pubmed&db=gene&id={pmid}&retmode=json
//!   efetch: {base}/efetch.fcgi?db=gene&id={gene_id}&retmode=xml   (one per linked gene)
//!
//! Detail requests run one at a time with a fixed pause before each, to stay
//! under NCBI's three-requests-per-second limit for callers without an API key.

use std::time::Duration;

use async_trait::async_trait;
use genescout_common::sandbox::SandboxClient as Client;
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, info, instrument, warn};

use crate::models::{GeneSymbolSet, PublicationId};
use super::{base, EutilsContact, GeneSymbolSource};

pub const EUTILS_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_millis(340);

pub struct EntrezClient {
    client: Client,
    base_url: String,
    contact: EutilsContact,
    request_delay: Duration,
}

impl EntrezClient {
    pub fn new(client: Client, contact: EutilsContact) -> Self {
        Self {
            client,
            base_url: EUTILS_BASE_URL.to_string(),
            contact,
            request_delay: DEFAULT_REQUEST_DELAY,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    /// Gene ids linked to the publication. No links is an empty list, not an error.
    #[instrument(skip(self), fields(pmid = %pmid))]
    async fn linked_gene_ids(&self, pmid: &PublicationId) -> anyhow::Result<Vec<String>> {
        let mut params = self.contact.params();
        params.push(("dbfrom", "pubmed".to_string()));
        params.push(("db", "gene".to_string()));
        params.push(("id", pmid.as_str().to_string()));
        params.push(("retmode", "json".to_string()));

        let resp: serde_json::Value = self.client
            .get(&format!("{}/elink.fcgi", base(&self.base_url)))?
            .query(&params)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        parse_elink_gene_ids(&resp)
    }

    /// Official symbol of one Entrez gene record, if the record carries one.
    async fn gene_symbol(&self, gene_id: &str) -> anyhow::Result<Option<String>> {
        let mut params = self.contact.params();
        params.push(("db", "gene".to_string()));
        params.push(("id", gene_id.to_string()));
        params.push(("retmode", "xml".to_string()));

        let xml = self.client
            .get(&format!("{}/efetch.fcgi", base(&self.base_url)))?
            .query(&params)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_gene_locus(&xml)
    }
}

#[async_trait]
impl GeneSymbolSource for EntrezClient {
    fn name(&self) -> &'static str {
        "entrez"
    }

    async fn fetch_gene_symbols(&self, pmid: &PublicationId) -> anyhow::Result<GeneSymbolSet> {
        let gene_ids = self.linked_gene_ids(pmid).await?;
        if gene_ids.is_empty() {
            info!(pmid = %pmid, "No Entrez gene links for publication");
            return Ok(GeneSymbolSet::new());
        }
        debug!(pmid = %pmid, count = gene_ids.len(), "Resolving linked Entrez genes");

        let mut symbols = GeneSymbolSet::new();
        let mut failed = 0usize;
        for gene_id in &gene_ids {
            tokio::time::sleep(self.request_delay).await;
            match self.gene_symbol(gene_id).await {
                Ok(Some(symbol)) => {
                    symbols.insert(symbol);
                }
                Ok(None) => debug!(gene_id = %gene_id, "Gene record has no locus symbol"),
                Err(e) => {
                    failed += 1;
                    warn!(gene_id = %gene_id, error = %e, "Entrez gene detail request failed");
                }
            }
        }

        if failed > 0 {
            warn!(pmid = %pmid, failed, total = gene_ids.len(), "Some linked genes could not be resolved");
            if failed == gene_ids.len() {
                anyhow::bail!("all {failed} Entrez gene detail requests failed");
            }
        }
        Ok(symbols)
    }
}

/// Extract `linksets[0].linksetdbs[0].links` from an elink JSON response.
fn parse_elink_gene_ids(resp: &serde_json::Value) -> anyhow::Result<Vec<String>> {
    let Some(linksets) = resp.get("linksets").and_then(|v| v.as_array()) else {
        anyhow::bail!("unexpected elink response: missing linksets");
    };

    let links = linksets
        .first()
        .and_then(|set| set.get("linksetdbs"))
        .and_then(|dbs| dbs.as_array())
        .and_then(|dbs| dbs.first())
        .and_then(|db| db.get("links"))
        .and_then(|links| links.as_array());

    Ok(links
        .map(|links| {
            links
                .iter()
                .filter_map(|id| match id {
                    serde_json::Value::String(s) => Some(s.clone()),
                    serde_json::Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default())
}

/// First `Gene-ref_locus` under `Entrezgene_gene` in an efetch gene XML record.
fn parse_gene_locus(xml: &str) -> anyhow::Result<Option<String>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut in_gene = false;
    let mut in_locus = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"Entrezgene_gene" => in_gene = true,
                b"Gene-ref_locus" if in_gene => in_locus = true,
                _ => {}
            },
            Ok(Event::Text(ref e)) if in_locus => {
                let symbol = e.unescape()?.trim().to_string();
                if !symbol.is_empty() {
                    return Ok(Some(symbol));
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"Entrezgene_gene" => in_gene = false,
                b"Gene-ref_locus" => in_locus = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => anyhow::bail!("malformed gene XML at {}: {e}", reader.buffer_position()),
            _ => {}
        }
        buf.clear();
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const TP53_XML: &str = r#"<?xml version="1.0" ?>
<Entrezgene-Set>
  <Entrezgene>
    <Entrezgene_track-info><Gene-track><Gene-track_geneid>7157</Gene-track_geneid></Gene-track></Entrezgene_track-info>
    <Entrezgene_gene>
      <Gene-ref>
        <Gene-ref_locus>TP53</Gene-ref_locus>
        <Gene-ref_desc>tumor protein p53</Gene-ref_desc>
      </Gene-ref>
    </Entrezgene_gene>
  </Entrezgene>
</Entrezgene-Set>"#;

    fn client(url: String) -> EntrezClient {
        EntrezClient::new(Client::new().unwrap(), EutilsContact::default())
            .with_base_url(url)
            .with_request_delay(Duration::from_millis(1))
    }

    #[test]
    fn test_parse_elink_links() {
        let resp = serde_json::json!({
            "linksets": [{"dbfrom": "pubmed", "linksetdbs": [{"dbto": "gene", "links": ["7157", 672]}]}]
        });
        assert_eq!(parse_elink_gene_ids(&resp).unwrap(), vec!["7157", "672"]);
    }

    #[test]
    fn test_parse_elink_without_links_is_empty() {
        let resp = serde_json::json!({"linksets": [{"dbfrom": "pubmed", "ids": ["1"]}]});
        assert!(parse_elink_gene_ids(&resp).unwrap().is_empty());
        assert!(parse_elink_gene_ids(&serde_json::json!({"linksets": []})).unwrap().is_empty());
        assert!(parse_elink_gene_ids(&serde_json::json!({"error": "bad id"})).is_err());
    }

    #[test]
    fn test_parse_gene_locus() {
        assert_eq!(parse_gene_locus(TP53_XML).unwrap().as_deref(), Some("TP53"));
        assert_eq!(parse_gene_locus("<Entrezgene-Set/>").unwrap(), None);
    }

    #[test]
    fn test_locus_outside_gene_block_is_ignored() {
        let xml = "<Entrezgene><Entrezgene_comments><Gene-ref_locus>OTHER</Gene-ref_locus></Entrezgene_comments>\
                   <Entrezgene_gene><Gene-ref><Gene-ref_locus>BRCA1</Gene-ref_locus></Gene-ref></Entrezgene_gene></Entrezgene>";
        assert_eq!(parse_gene_locus(xml).unwrap().as_deref(), Some("BRCA1"));
    }

    #[tokio::test]
    async fn test_no_links_skips_detail_requests() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/elink.fcgi")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("dbfrom".into(), "pubmed".into()),
                Matcher::UrlEncoded("db".into(), "gene".into()),
                Matcher::UrlEncoded("id".into(), "123".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"linksets":[{"dbfrom":"pubmed","ids":["123"]}]}"#)
            .create_async()
            .await;
        let efetch = server
            .mock("GET", "/efetch.fcgi")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let symbols = client(server.url()).fetch_gene_symbols(&PublicationId::from("123")).await.unwrap();
        assert!(symbols.is_empty());
        efetch.assert_async().await;
    }

    #[tokio::test]
    async fn test_failed_detail_request_is_skipped() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/elink.fcgi")
            .match_query(Matcher::Any)
            .with_body(r#"{"linksets":[{"linksetdbs":[{"links":["7157","672"]}]}]}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/efetch.fcgi")
            .match_query(Matcher::UrlEncoded("id".into(), "7157".into()))
            .with_body(TP53_XML)
            .expect(1)
            .create_async()
            .await;
        server
            .mock("GET", "/efetch.fcgi")
            .match_query(Matcher::UrlEncoded("id".into(), "672".into()))
            .with_status(500)
            .expect(1)
            .create_async()
            .await;

        let symbols = client(server.url()).fetch_gene_symbols(&PublicationId::from("9")).await.unwrap();
        assert_eq!(symbols.into_vec(), vec!["TP53"]);
    }

    #[tokio::test]
    async fn test_all_detail_requests_failing_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/elink.fcgi")
            .match_query(Matcher::Any)
            .with_body(r#"{"linksets":[{"linksetdbs":[{"links":["672"]}]}]}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/efetch.fcgi")
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        assert!(client(server.url()).fetch_gene_symbols(&PublicationId::from("9")).await.is_err());
    }
}
