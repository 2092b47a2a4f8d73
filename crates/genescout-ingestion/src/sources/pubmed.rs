//! PubMed E-utilities client for article title and abstract.
//!
//! Endpoint: {base}/efetch.fcgi?db=pubmed&id={pmid}&retmode=xml

use async_trait::async_trait;
use genescout_common::sandbox::SandboxClient as Client;
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, instrument, warn};

use crate::models::{ArticleText, PublicationId};
use super::{base, entrez::EUTILS_BASE_URL, ArticleSource, EutilsContact};

pub struct PubMedClient {
    client: Client,
    base_url: String,
    contact: EutilsContact,
}

impl PubMedClient {
    pub fn new(client: Client, contact: EutilsContact) -> Self {
        Self { client, base_url: EUTILS_BASE_URL.to_string(), contact }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetch and parse the article record. Errors are surfaced; see
    /// [`ArticleSource::fetch_article_text`] for the infallible variant.
    #[instrument(skip(self), fields(pmid = %pmid))]
    pub async fn fetch_article(&self, pmid: &PublicationId) -> anyhow::Result<ArticleText> {
        let mut params = self.contact.params();
        params.push(("db", "pubmed".to_string()));
        params.push(("id", pmid.as_str().to_string()));
        params.push(("retmode", "xml".to_string()));

        let xml = self.client
            .get(&format!("{}/efetch.fcgi", base(&self.base_url)))?
            .query(&params)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_article_xml(&xml)
    }
}

#[async_trait]
impl ArticleSource for PubMedClient {
    async fn fetch_article_text(&self, pmid: &PublicationId) -> ArticleText {
        match self.fetch_article(pmid).await {
            Ok(article) => {
                debug!(pmid = %pmid, title = %article.title, "Fetched article text");
                article
            }
            Err(e) => {
                warn!(pmid = %pmid, error = %format!("{e:#}"), "Could not fetch article text");
                ArticleText::unknown()
            }
        }
    }
}

/// Title and first abstract section of the first `PubmedArticle`.
/// Inline markup (`<i>`, `<sup>`, ...) is flattened into plain text.
fn parse_article_xml(xml: &str) -> anyhow::Result<ArticleText> {
    let mut reader = Reader::from_str(xml);

    let mut in_article = false;
    let mut in_title = false;
    let mut in_abstract = false;
    let mut abstract_done = false;
    let mut title = String::new();
    let mut abstract_text = String::new();
    let mut seen_article = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"PubmedArticle" => {
                    in_article = true;
                    seen_article = true;
                }
                b"ArticleTitle" if in_article => in_title = true,
                b"AbstractText" if in_article && !abstract_done => in_abstract = true,
                _ => {}
            },
            Ok(Event::Text(ref e)) => {
                if in_title || in_abstract {
                    let text = e.unescape()?;
                    if in_title {
                        title.push_str(&text);
                    }
                    if in_abstract {
                        abstract_text.push_str(&text);
                    }
                }
            }
            Ok(Event::CData(ref e)) => {
                if in_title || in_abstract {
                    let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                    if in_title {
                        title.push_str(&text);
                    }
                    if in_abstract {
                        abstract_text.push_str(&text);
                    }
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"ArticleTitle" => in_title = false,
                b"AbstractText" if in_abstract => {
                    in_abstract = false;
                    abstract_done = true;
                }
                b"PubmedArticle" => break,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => anyhow::bail!("malformed PubMed XML at {}: {e}", reader.buffer_position()),
            _ => {}
        }
        buf.clear();
    }

    if !seen_article {
        anyhow::bail!("no PubmedArticle in response");
    }
    let title = collapse_whitespace(&title);
    if title.is_empty() {
        anyhow::bail!("article has no title");
    }
    let abstract_text = collapse_whitespace(&abstract_text);
    if abstract_text.is_empty() {
        return Ok(ArticleText::new(title, ArticleText::NO_ABSTRACT));
    }
    Ok(ArticleText::new(title, abstract_text))
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
