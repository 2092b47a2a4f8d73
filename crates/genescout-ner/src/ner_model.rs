//! BERT token-classification NER on Candle.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config};
use hf_hub::api::sync::Api;
use serde::{Deserialize, Serialize};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::{EntityRecognizer, NerError, Result, entity_types::{EntityType, normalize_entity_label}};

/// NER configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NerConfig {
    pub model_id: String,
    pub max_length: usize,
    pub use_gpu: bool,
}

impl Default for NerConfig {
    fn default() -> Self {
        Self::gene_mentions()
    }
}

impl NerConfig {
    /// PubMedBERT fine-tuned for gene/gene-product mentions.
    pub fn gene_mentions() -> Self {
        Self {
            model_id: "pruas/BENT-PubMedBERT-NER-Gene".to_string(),
            max_length: 512,
            use_gpu: false,
        }
    }

    /// BioBERT fine-tuned for genetic entities (genes, proteins).
    pub fn genetic_entities() -> Self {
        Self {
            model_id: "alvaroalon2/biobert_genetic_ner".to_string(),
            max_length: 512,
            use_gpu: false,
        }
    }
}

/// Extracted entity.
#[derive(Debug, Clone, PartialEq)]
pub struct NerEntity {
    pub text: String,
    pub label: String,
    pub entity_type: EntityType,
    /// Byte offsets into the input text.
    pub start: usize,
    pub end: usize,
    pub score: f32,
}

impl NerEntity {
    pub fn new(text: &str, label: &str, start: usize, end: usize, score: f32) -> Self {
        Self {
            text: text.to_string(),
            label: label.to_string(),
            entity_type: normalize_entity_label(label),
            start,
            end,
            score,
        }
    }
}

/// NER model wrapper.
pub struct NerModel {
    model: BertModel,
    tokenizer: Tokenizer,
    classifier: Tensor,
    classifier_bias: Option<Tensor>,
    label_map: HashMap<i64, String>,
    config: NerConfig,
    device: Device,
}

impl NerModel {
    /// Load a NER model from Hugging Face Hub.
    pub async fn new(config: NerConfig) -> Result<Self> {
        let start = Instant::now();
        info!("Loading NER model: {}", config.model_id);

        let device = if config.use_gpu {
            Device::cuda_if_available(0).unwrap_or(Device::Cpu)
        } else {
            Device::Cpu
        };
        debug!("Using device: {:?}", device);

        let model_id = config.model_id.clone();
        let (bert_config, tokenizer, weights_path, label_map) =
            tokio::task::spawn_blocking(move || Self::download_model(&model_id))
                .await
                .map_err(|e| NerError::Download(e.to_string()))??;

        if label_map.is_empty() {
            return Err(NerError::ModelLoad(format!(
                "{} has no id2label mapping; not a token classifier",
                config.model_id
            )));
        }

        info!("Loading model weights from {:?}", weights_path);
        let vb = load_weights(&weights_path, &device)?;

        // Checkpoints differ in whether the encoder sits under a `bert.` prefix
        let model = BertModel::load(vb.pp("bert"), &bert_config)
            .or_else(|_| BertModel::load(vb.clone(), &bert_config))
            .map_err(|e| NerError::ModelLoad(format!("BertModel: {}", e)))?;

        // Classification head: weight [num_labels, hidden], optional bias [num_labels]
        let num_labels = label_map.len();
        let hidden_size = bert_config.hidden_size;
        let head = vb.pp("classifier");
        let classifier = head
            .get((num_labels, hidden_size), "weight")
            .map_err(|e| NerError::ModelLoad(format!("Classifier: {}", e)))?;
        let classifier_bias = head.get(num_labels, "bias").ok();

        info!(
            model = %config.model_id,
            labels = num_labels,
            "NER model loaded in {:?}",
            start.elapsed()
        );

        Ok(Self {
            model,
            tokenizer,
            classifier,
            classifier_bias,
            label_map,
            config,
            device,
        })
    }

    fn download_model(
        model_id: &str,
    ) -> Result<(Config, Tokenizer, PathBuf, HashMap<i64, String>)> {
        let files = ModelFiles::resolve(model_id)?;

        let config_path = files.get("config.json")?;
        let config_content = std::fs::read_to_string(&config_path)?;

        let config_json: serde_json::Value = serde_json::from_str(&config_content)
            .map_err(|e| NerError::ModelLoad(format!("Parse config: {}", e)))?;
        let label_map = parse_label_map(&config_json);

        let bert_config: Config = serde_json::from_str(&config_content)
            .map_err(|e| NerError::ModelLoad(format!("BERT config: {}", e)))?;

        // Prefer tokenizer.json; older checkpoints only ship vocab.txt
        let tokenizer = if let Ok(tok_path) = files.get("tokenizer.json") {
            debug!("Loading tokenizer from: {:?}", tok_path);
            Tokenizer::from_file(&tok_path)
                .map_err(|e| NerError::Tokenization(e.to_string()))?
        } else if let Ok(vocab_path) = files.get("vocab.txt") {
            debug!("Building tokenizer from vocab.txt");
            let lowercase = config_json["do_lower_case"].as_bool().unwrap_or(false);
            wordpiece_tokenizer(&vocab_path, lowercase)?
        } else {
            return Err(NerError::Tokenization(format!("No tokenizer found for {}", model_id)));
        };

        let weights_path = files.get("model.safetensors")
            .or_else(|_| files.get("pytorch_model.bin"))?;

        Ok((bert_config, tokenizer, weights_path, label_map))
    }

    /// Extract entities from text.
    pub fn extract(&self, text: &str) -> Result<Vec<NerEntity>> {
        let start = Instant::now();

        let encoding = self.tokenizer
            .encode(text, true)
            .map_err(|e| NerError::Tokenization(e.to_string()))?;

        let len = encoding.get_ids().len().min(self.config.max_length);
        if len == 0 {
            return Ok(Vec::new());
        }
        let input_ids: Vec<i64> = encoding.get_ids()[..len].iter().map(|&id| id as i64).collect();

        // [batch=1, seq_len]
        let input_ids_tensor = Tensor::new(&input_ids[..], &self.device)?.unsqueeze(0)?;
        let token_type_ids = Tensor::zeros((1, len), DType::I64, &self.device)?;
        let attention_mask = Tensor::ones((1, len), DType::I64, &self.device)?;

        // [1, seq, hidden] -> [seq, hidden]
        let hidden_states = self.model
            .forward(&input_ids_tensor, &token_type_ids, Some(&attention_mask))?
            .squeeze(0)?;

        // [seq, hidden] @ [hidden, num_labels]
        let mut logits = hidden_states.matmul(&self.classifier.t()?)?;
        if let Some(bias) = &self.classifier_bias {
            logits = logits.broadcast_add(bias)?;
        }

        let probs = candle_nn::ops::softmax(&logits, 1)?;
        let preds = probs.argmax(1)?.to_dtype(DType::I64)?.to_vec1::<i64>()?;
        let probs = probs.to_vec2::<f32>()?;

        let scores: Vec<f32> = preds
            .iter()
            .zip(&probs)
            .map(|(&p, row)| row.get(p as usize).copied().unwrap_or(0.0))
            .collect();
        let labels: Vec<&str> = preds
            .iter()
            .map(|p| self.label_map.get(p).map(String::as_str).unwrap_or("O"))
            .collect();

        let entities = decode_bio_spans(
            text,
            &encoding.get_tokens()[..len],
            &encoding.get_offsets()[..len],
            &labels,
            &scores,
        );

        debug!("Extracted {} entities in {:?}", entities.len(), start.elapsed());
        Ok(entities)
    }

    pub fn config(&self) -> &NerConfig {
        &self.config
    }
}

impl EntityRecognizer for NerModel {
    fn name(&self) -> &str {
        &self.config.model_id
    }

    fn recognize(&self, text: &str) -> Result<Vec<NerEntity>> {
        self.extract(text)
    }
}

/// Where checkpoint files come from: a local directory, or the Hugging Face Hub cache.
enum ModelFiles {
    Local(PathBuf),
    Hub(hf_hub::api::sync::ApiRepo),
}

impl ModelFiles {
    fn resolve(model_id: &str) -> Result<Self> {
        let local = Path::new(model_id);
        if local.is_dir() {
            debug!("Loading model files from local directory {:?}", local);
            return Ok(ModelFiles::Local(local.to_path_buf()));
        }

        use hf_hub::{Repo, RepoType};
        let api = Api::new()
            .map_err(|e| NerError::Download(format!("API init: {}", e)))?;
        Ok(ModelFiles::Hub(api.repo(Repo::new(model_id.to_string(), RepoType::Model))))
    }

    fn get(&self, name: &str) -> Result<PathBuf> {
        match self {
            ModelFiles::Local(dir) => {
                let path = dir.join(name);
                if path.is_file() {
                    Ok(path)
                } else {
                    Err(NerError::ModelLoad(format!("{} not found in {}", name, dir.display())))
                }
            }
            ModelFiles::Hub(repo) => repo
                .get(name)
                .map_err(|e| NerError::Download(format!("{}: {}", name, e))),
        }
    }
}

fn load_weights(path: &Path, device: &Device) -> Result<VarBuilder<'static>> {
    let is_safetensors = path.extension().and_then(|e| e.to_str()) == Some("safetensors");
    if is_safetensors {
        // SAFETY: the file is owned by the hf-hub cache and not modified while mapped.
        unsafe {
            VarBuilder::from_mmaped_safetensors(&[path.to_path_buf()], DType::F32, device)
                .map_err(|e| NerError::ModelLoad(e.to_string()))
        }
    } else {
        VarBuilder::from_pth(path, DType::F32, device)
            .map_err(|e| NerError::ModelLoad(e.to_string()))
    }
}

fn parse_label_map(config_json: &serde_json::Value) -> HashMap<i64, String> {
    config_json["id2label"]
        .as_object()
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| Some((k.parse().ok()?, v.as_str()?.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

fn wordpiece_tokenizer(vocab_path: &Path, lowercase: bool) -> Result<Tokenizer> {
    use tokenizers::models::wordpiece::WordPieceBuilder;
    use tokenizers::normalizers::bert::BertNormalizer;
    use tokenizers::pre_tokenizers::bert::BertPreTokenizer;

    let vocab_content = std::fs::read_to_string(vocab_path)?;
    let vocab: ahash::AHashMap<String, u32> = vocab_content
        .lines()
        .enumerate()
        .map(|(i, line)| (line.to_string(), i as u32))
        .collect();

    let wordpiece = WordPieceBuilder::new()
        .vocab(vocab)
        .continuing_subword_prefix("##".to_string())
        .max_input_chars_per_word(100)
        .unk_token("[UNK]".to_string())
        .build()
        .map_err(|e| NerError::Tokenization(format!("WordPiece: {}", e)))?;

    let mut tokenizer = Tokenizer::new(wordpiece);
    tokenizer.with_normalizer(Some(BertNormalizer::new(true, true, None, lowercase)));
    tokenizer.with_pre_tokenizer(Some(BertPreTokenizer));
    Ok(tokenizer)
}

/// Merge per-token BIO predictions into entity spans.
///
/// Special tokens carry an empty offset and are skipped. `##` word pieces always
/// extend the open span. Labels without a BIO prefix behave like `I-`.
fn decode_bio_spans(
    text: &str,
    tokens: &[String],
    offsets: &[(usize, usize)],
    labels: &[&str],
    scores: &[f32],
) -> Vec<NerEntity> {
    struct Open<'a> {
        kind: &'a str,
        start: usize,
        end: usize,
        scores: Vec<f32>,
    }

    fn close(text: &str, open: Open<'_>, out: &mut Vec<NerEntity>) {
        if let Some(span) = text.get(open.start..open.end) {
            let score = open.scores.iter().sum::<f32>() / open.scores.len().max(1) as f32;
            out.push(NerEntity::new(span, open.kind, open.start, open.end, score));
        }
    }

    let mut entities = Vec::new();
    let mut current: Option<Open<'_>> = None;

    for i in 0..labels.len().min(offsets.len()).min(tokens.len()) {
        let (start, end) = offsets[i];
        if start == end {
            continue;
        }
        let label = labels[i];
        let score = scores.get(i).copied().unwrap_or(0.0);

        if tokens[i].starts_with("##") {
            if let Some(open) = current.as_mut() {
                open.end = end;
                open.scores.push(score);
            }
            continue;
        }

        if label == "O" {
            if let Some(open) = current.take() {
                close(text, open, &mut entities);
            }
            continue;
        }

        let (is_begin, kind) = match label.split_once('-') {
            Some(("B", kind)) => (true, kind),
            Some(("I", kind)) => (false, kind),
            _ => (false, label),
        };

        let continues = !is_begin && current.as_ref().is_some_and(|open| open.kind == kind);
        if continues {
            if let Some(open) = current.as_mut() {
                open.end = end;
                open.scores.push(score);
            }
        } else {
            if let Some(open) = current.take() {
                close(text, open, &mut entities);
            }
            current = Some(Open { kind, start, end, scores: vec![score] });
        }
    }

    if let Some(open) = current {
        close(text, open, &mut entities);
    }

    entities
}
