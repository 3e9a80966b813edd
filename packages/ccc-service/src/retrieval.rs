use ccc_storage::models::Match;

use crate::{CccService, Error, Result};

/// Joins the non-empty trimmed texts of `matches`, in index order, with blank lines.
pub fn evidence_context(matches: &[Match]) -> String {
	let texts: Vec<&str> = matches
		.iter()
		.filter_map(Match::text)
		.map(str::trim)
		.filter(|text| !text.is_empty())
		.collect();
	let skipped = matches.len() - texts.len();

	if skipped > 0 {
		tracing::debug!(skipped, matches = matches.len(), "Skipped matches without text.");
	}

	texts.join("\n\n")
}

impl CccService {
	/// Embeds `query` and returns the evidence context of its nearest statute chunks.
	pub(crate) async fn retrieve(&self, query: &str) -> Result<String> {
		let texts = [query.to_string()];
		let vectors = self.providers.embedding.embed(&self.cfg.providers.embedding, &texts).await?;
		let Some(vector) = vectors.into_iter().next() else {
			return Err(Error::Provider {
				message: "Embedding provider returned no vectors.".to_string(),
			});
		};

		if vector.len() != self.cfg.storage.qdrant.vector_dim as usize {
			return Err(Error::Provider {
				message: "Embedding vector dimension mismatch.".to_string(),
			});
		}

		let matches = self.index.nearest(&vector, self.cfg.retrieval.top_k).await?;
		let evidence = evidence_context(&matches);

		tracing::debug!(
			matches = matches.len(),
			evidence_chars = evidence.chars().count(),
			"Retrieved evidence."
		);

		Ok(evidence)
	}
}
