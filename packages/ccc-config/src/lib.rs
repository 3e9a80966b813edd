mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, Cot, EmbeddingProviderConfig, Guard, LlmProviderConfig, Providers, Qdrant, Retrieval,
	Security, Service, Storage,
};

use std::{fs, path::Path};

/// Hard ceiling on executed plan steps; `cot.max_steps` may only lower it.
pub const MAX_PLAN_STEPS: usize = 3;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.storage.qdrant.collection.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.qdrant.collection must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}
	if cfg.retrieval.top_k == 0 {
		return Err(Error::Validation {
			message: "retrieval.top_k must be greater than zero.".to_string(),
		});
	}
	if cfg.guard.chunk_chars == 0 {
		return Err(Error::Validation {
			message: "guard.chunk_chars must be greater than zero.".to_string(),
		});
	}
	if cfg.guard.overlap_chars >= cfg.guard.chunk_chars {
		return Err(Error::Validation {
			message: "guard.overlap_chars must be less than guard.chunk_chars.".to_string(),
		});
	}
	if !cfg.guard.attack_threshold.is_finite() {
		return Err(Error::Validation {
			message: "guard.attack_threshold must be a finite number.".to_string(),
		});
	}
	if !(0.0..=1.0).contains(&cfg.guard.attack_threshold) {
		return Err(Error::Validation {
			message: "guard.attack_threshold must be in the range 0.0-1.0.".to_string(),
		});
	}
	if !(1..=MAX_PLAN_STEPS).contains(&cfg.cot.max_steps) {
		return Err(Error::Validation {
			message: format!("cot.max_steps must be between 1 and {MAX_PLAN_STEPS}."),
		});
	}

	for (label, provider) in [
		("chat", &cfg.providers.chat),
		("guard", &cfg.providers.guard),
		("prompt_guard", &cfg.providers.prompt_guard),
	] {
		if !provider.temperature.is_finite() || provider.temperature < 0.0 {
			return Err(Error::Validation {
				message: format!(
					"providers.{label}.temperature must be a finite number, zero or greater."
				),
			});
		}
		if !provider.top_p.is_finite() || !(0.0..=1.0).contains(&provider.top_p) {
			return Err(Error::Validation {
				message: format!("providers.{label}.top_p must be in the range 0.0-1.0."),
			});
		}
		if provider.max_tokens == 0 {
			return Err(Error::Validation {
				message: format!("providers.{label}.max_tokens must be greater than zero."),
			});
		}
		if provider.model.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("providers.{label}.model must be non-empty."),
			});
		}
	}

	for (label, key) in [
		("chat", &cfg.providers.chat.api_key),
		("guard", &cfg.providers.guard.api_key),
		("prompt_guard", &cfg.providers.prompt_guard.api_key),
		("embedding", &cfg.providers.embedding.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.security.api_auth_token.as_deref().map(|token| token.trim().is_empty()).unwrap_or(false)
	{
		cfg.security.api_auth_token = None;
	}

	for api_base in [
		&mut cfg.providers.chat.api_base,
		&mut cfg.providers.guard.api_base,
		&mut cfg.providers.prompt_guard.api_base,
		&mut cfg.providers.embedding.api_base,
	] {
		let trimmed = api_base.trim_end_matches('/').len();

		api_base.truncate(trimmed);
	}
}
