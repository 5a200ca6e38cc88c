//! # Sentence Embedding Model
//!
//! Handles loading and running sentence-transformers checkpoints using
//! Candle-rs. The corpus was embedded offline with the same model family,
//! so transcripts embedded here land in the same vector space.
//!
//! ## Model Loading Process:
//! 1. Download model files from HuggingFace if not cached locally
//! 2. Load tokenizer and configuration
//! 3. Initialize BERT weights on the selected device
//!
//! ## Embedding Process:
//! Tokenize, run the BERT forward pass, mean-pool over the token axis,
//! then L2-normalize. Normalized outputs make cosine similarity a plain
//! dot product against the unit-normalized corpus vectors.

use crate::embedding::TextEmbedder;
use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config, DTYPE};
use tokenizers::Tokenizer;

/// BERT-family positional limit; longer transcripts are truncated.
const MAX_TOKENS: usize = 512;

/// Known sentence-embedding models with their characteristics.
///
/// ## Trade-offs:
/// - **Size vs Quality**: Larger checkpoints embed more faithfully but
///   load and run slower
/// - **Monolingual vs Multilingual**: The multilingual checkpoint handles
///   Arabic-script transcripts directly; the English ones rely on the
///   transcription layer romanizing consistently
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum EmbeddingModel {
    MiniLmL6V2,
    MiniLmL12V2,
    MpnetBaseV2,
    MultilingualMiniLmL12V2,
}

impl EmbeddingModel {
    /// Get the HuggingFace model repository name.
    pub fn repo_name(&self) -> &'static str {
        match self {
            EmbeddingModel::MiniLmL6V2 => "sentence-transformers/all-MiniLM-L6-v2",
            EmbeddingModel::MiniLmL12V2 => "sentence-transformers/all-MiniLM-L12-v2",
            EmbeddingModel::MpnetBaseV2 => "sentence-transformers/all-mpnet-base-v2",
            EmbeddingModel::MultilingualMiniLmL12V2 => {
                "sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2"
            }
        }
    }

    /// Dimension of the vectors this model produces.
    pub fn dimension(&self) -> usize {
        match self {
            EmbeddingModel::MiniLmL6V2 => 384,
            EmbeddingModel::MiniLmL12V2 => 384,
            EmbeddingModel::MpnetBaseV2 => 768,
            EmbeddingModel::MultilingualMiniLmL12V2 => 384,
        }
    }

    /// Get the approximate checkpoint size in MB.
    pub fn size_mb(&self) -> u32 {
        match self {
            EmbeddingModel::MiniLmL6V2 => 91,
            EmbeddingModel::MiniLmL12V2 => 134,
            EmbeddingModel::MpnetBaseV2 => 438,
            EmbeddingModel::MultilingualMiniLmL12V2 => 471,
        }
    }

    /// Get a human-readable description.
    pub fn description(&self) -> &'static str {
        match self {
            EmbeddingModel::MiniLmL6V2 => "Fast, the model the corpus pipeline uses",
            EmbeddingModel::MiniLmL12V2 => "Slower, slightly better sentence quality",
            EmbeddingModel::MpnetBaseV2 => "Best English quality, larger vectors",
            EmbeddingModel::MultilingualMiniLmL12V2 => "Handles Arabic-script transcripts",
        }
    }
}

impl std::str::FromStr for EmbeddingModel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "all-minilm-l6-v2" | "minilm-l6" => Ok(EmbeddingModel::MiniLmL6V2),
            "all-minilm-l12-v2" | "minilm-l12" => Ok(EmbeddingModel::MiniLmL12V2),
            "all-mpnet-base-v2" | "mpnet" => Ok(EmbeddingModel::MpnetBaseV2),
            "paraphrase-multilingual-minilm-l12-v2" | "multilingual-minilm" => {
                Ok(EmbeddingModel::MultilingualMiniLmL12V2)
            }
            _ => Err(anyhow!("Unknown embedding model: {}", s)),
        }
    }
}

impl std::fmt::Display for EmbeddingModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EmbeddingModel::MiniLmL6V2 => "all-minilm-l6-v2",
            EmbeddingModel::MiniLmL12V2 => "all-minilm-l12-v2",
            EmbeddingModel::MpnetBaseV2 => "all-mpnet-base-v2",
            EmbeddingModel::MultilingualMiniLmL12V2 => "paraphrase-multilingual-minilm-l12-v2",
        };
        write!(f, "{}", name)
    }
}

/// A loaded sentence-embedding model ready to embed transcripts.
///
/// ## Thread Safety:
/// The forward pass only needs `&self`, so one loaded model can serve all
/// request handlers behind an `Arc` with no locking.
pub struct SentenceEmbedder {
    /// The actual Candle model
    model: BertModel,

    /// Tokenizer for text processing
    tokenizer: Tokenizer,

    /// Device where the model is loaded (CPU/GPU)
    device: Device,

    /// Which catalogue entry this is
    kind: EmbeddingModel,
}

impl SentenceEmbedder {
    /// Load a sentence-embedding model from HuggingFace.
    ///
    /// ## Parameters:
    /// - **kind**: Which catalogue model to load
    /// - **revision**: Repository revision to pin ("main" for latest)
    /// - **device**: Device to load the model on (CPU/GPU)
    ///
    /// ## Returns:
    /// - **Ok(SentenceEmbedder)**: Model loaded successfully
    /// - **Err(anyhow::Error)**: Download or initialization failed
    pub async fn load(kind: EmbeddingModel, revision: &str, device: Device) -> Result<Self> {
        tracing::info!(
            "Loading {} embedding model (~{} MB): {}",
            kind,
            kind.size_mb(),
            kind.description()
        );
        let start_time = std::time::Instant::now();

        let api = {
            use hf_hub::api::tokio::{Api, ApiBuilder};

            let builder_result = {
                let mut builder = ApiBuilder::new();

                if let Ok(token) = std::env::var("HF_TOKEN") {
                    tracing::debug!("Setting HF token (length: {})", token.len());
                    builder = builder.with_token(Some(token));
                } else {
                    builder = builder.with_token(None);
                }

                if let Ok(cache_dir) = std::env::var("HF_HUB_CACHE") {
                    tracing::debug!("Setting custom cache dir: {}", cache_dir);
                    builder = builder.with_cache_dir(cache_dir.into());
                } else if let Ok(hf_home) = std::env::var("HF_HOME") {
                    let cache_path = std::path::PathBuf::from(hf_home).join("hub");
                    tracing::debug!("Setting cache dir from HF_HOME: {:?}", cache_path);
                    builder = builder.with_cache_dir(cache_path);
                }

                builder.with_progress(false).build()
            };

            match builder_result {
                Ok(api) => api,
                Err(e) => {
                    tracing::warn!("ApiBuilder failed: {}, falling back to Api::new()", e);
                    Api::new().map_err(|e2| {
                        anyhow!(
                            "HuggingFace API initialization failed. ApiBuilder error: {}. Api::new() error: {}",
                            e,
                            e2
                        )
                    })?
                }
            }
        };

        let repo = api.repo(hf_hub::Repo::with_revision(
            kind.repo_name().to_string(),
            hf_hub::RepoType::Model,
            revision.to_string(),
        ));

        tracing::info!("Downloading model files from {}", kind.repo_name());
        let config_filename = repo.get("config.json").await.map_err(|e| {
            anyhow!("Failed to download config.json from {}: {}", kind.repo_name(), e)
        })?;
        let tokenizer_filename = repo.get("tokenizer.json").await.map_err(|e| {
            anyhow!("Failed to download tokenizer.json from {}: {}", kind.repo_name(), e)
        })?;
        let weights_filename = match repo.get("model.safetensors").await {
            Ok(path) => path,
            Err(_) => repo.get("pytorch_model.bin").await.map_err(|e| {
                anyhow!("Failed to download model weights from {}: {}", kind.repo_name(), e)
            })?,
        };

        // Load configuration
        let config: Config = serde_json::from_reader(std::fs::File::open(config_filename)?)?;

        // Load tokenizer
        let tokenizer = Tokenizer::from_file(tokenizer_filename)
            .map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?;

        // Load model weights
        tracing::debug!("Loading model weights...");
        let vb = if weights_filename.to_string_lossy().ends_with(".safetensors") {
            unsafe { VarBuilder::from_mmaped_safetensors(&[weights_filename], DTYPE, &device)? }
        } else {
            VarBuilder::from_pth(&weights_filename, DTYPE, &device)?
        };

        let model = BertModel::load(vb, &config)?;

        let load_time = start_time.elapsed();
        tracing::info!(
            "{} embedding model loaded in {:.2}s",
            kind,
            load_time.as_secs_f64()
        );

        Ok(Self {
            model,
            tokenizer,
            device,
            kind,
        })
    }

    /// Which catalogue model is loaded.
    pub fn kind(&self) -> EmbeddingModel {
        self.kind
    }

    /// Get the device where the model is loaded.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Mean-pool token embeddings over the sequence axis.
    ///
    /// Input shape (batch, tokens, hidden); output shape (batch, hidden).
    fn mean_pool(token_embeddings: &Tensor) -> Result<Tensor> {
        let (_batch, n_tokens, _hidden) = token_embeddings.dims3()?;
        let pooled = (token_embeddings.sum(1)? / (n_tokens as f64))?;
        Ok(pooled)
    }

    /// L2-normalize each row of a (batch, hidden) tensor.
    fn l2_normalize(embeddings: &Tensor) -> Result<Tensor> {
        let norms = embeddings.sqr()?.sum_keepdim(1)?.sqrt()?;
        Ok(embeddings.broadcast_div(&norms)?)
    }
}

impl TextEmbedder for SentenceEmbedder {
    /// Embed one transcript.
    ///
    /// ## Returns:
    /// A unit-normalized vector of `dimension()` values.
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow!("Tokenization failed: {}", e))?;

        let mut ids: Vec<u32> = encoding.get_ids().to_vec();
        ids.truncate(MAX_TOKENS);
        if ids.is_empty() {
            return Err(anyhow!("Tokenizer produced no tokens"));
        }

        let token_ids = Tensor::new(&ids[..], &self.device)?.unsqueeze(0)?;
        let token_type_ids = token_ids.zeros_like()?;

        let token_embeddings = self.model.forward(&token_ids, &token_type_ids, None)?;
        let pooled = Self::mean_pool(&token_embeddings)?;
        let normalized = Self::l2_normalize(&pooled)?;

        let vector = normalized.squeeze(0)?.to_vec1::<f32>()?;
        tracing::debug!("Embedded {} tokens into {} dimensions", ids.len(), vector.len());
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.kind.dimension()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_model_parsing() {
        assert_eq!(
            "all-minilm-l6-v2".parse::<EmbeddingModel>().unwrap(),
            EmbeddingModel::MiniLmL6V2
        );
        assert_eq!(
            "ALL-MiniLM-L6-V2".parse::<EmbeddingModel>().unwrap(),
            EmbeddingModel::MiniLmL6V2
        );
        assert_eq!(
            "multilingual-minilm".parse::<EmbeddingModel>().unwrap(),
            EmbeddingModel::MultilingualMiniLmL12V2
        );
        assert!("invalid".parse::<EmbeddingModel>().is_err());
    }

    #[test]
    fn test_embedding_model_metadata() {
        let model = EmbeddingModel::MiniLmL6V2;
        assert_eq!(model.repo_name(), "sentence-transformers/all-MiniLM-L6-v2");
        assert_eq!(model.dimension(), 384);
        assert_eq!(model.to_string(), "all-minilm-l6-v2");
        assert_eq!(EmbeddingModel::MpnetBaseV2.dimension(), 768);
    }

    #[test]
    fn test_mean_pool() {
        let device = Device::Cpu;
        // One sentence, two tokens, two hidden dims
        let tokens = Tensor::new(&[[[1.0f32, 2.0], [3.0, 4.0]]], &device).unwrap();
        let pooled = SentenceEmbedder::mean_pool(&tokens).unwrap();
        assert_eq!(pooled.dims(), &[1, 2]);
        assert_eq!(pooled.to_vec2::<f32>().unwrap(), vec![vec![2.0, 3.0]]);
    }

    #[test]
    fn test_l2_normalize() {
        let device = Device::Cpu;
        let raw = Tensor::new(&[[3.0f32, 4.0]], &device).unwrap();
        let normalized = SentenceEmbedder::l2_normalize(&raw).unwrap();
        assert_eq!(normalized.to_vec2::<f32>().unwrap(), vec![vec![0.6, 0.8]]);
    }
}
