//! Component 18: the defaults resolver (§4.18). Merges model
//! parameters across four layers — system defaults, agent defaults,
//! session defaults, request overrides, each field independently
//! overridable by the next layer — then validates ranges and caps
//! `max_tokens` at the model's own output limit.

use sa_domain::{Error, Result};

#[derive(Debug, Clone, Default)]
pub struct ModelParams {
    pub model_id: Option<String>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub top_k: Option<u32>,
    pub max_tokens: Option<u32>,
    pub thinking_budget: Option<u32>,
}

impl From<ModelParams> for sa_domain::ModelParameters {
    fn from(p: ModelParams) -> Self {
        sa_domain::ModelParameters {
            model_id: p.model_id,
            temperature: p.temperature,
            top_p: p.top_p,
            top_k: p.top_k,
            max_tokens: p.max_tokens,
            thinking_budget: p.thinking_budget,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ModelLimits {
    pub max_output_tokens: u32,
}

fn merge(base: &mut ModelParams, overlay: &ModelParams) {
    if overlay.model_id.is_some() {
        base.model_id = overlay.model_id.clone();
    }
    if overlay.temperature.is_some() {
        base.temperature = overlay.temperature;
    }
    if overlay.top_p.is_some() {
        base.top_p = overlay.top_p;
    }
    if overlay.top_k.is_some() {
        base.top_k = overlay.top_k;
    }
    if overlay.max_tokens.is_some() {
        base.max_tokens = overlay.max_tokens;
    }
    if overlay.thinking_budget.is_some() {
        base.thinking_budget = overlay.thinking_budget;
    }
}

/// Merge `system` → `agent` → `session` → `request`, each layer
/// overriding only the fields it sets, then validate and cap the
/// result. `limits` is optional — when absent, `max_tokens` passes
/// through unclamped.
pub fn resolve(
    system: &ModelParams,
    agent: &ModelParams,
    session: &ModelParams,
    request: &ModelParams,
    limits: Option<&ModelLimits>,
) -> Result<ModelParams> {
    let mut out = system.clone();
    merge(&mut out, agent);
    merge(&mut out, session);
    merge(&mut out, request);

    if let Some(t) = out.temperature {
        if !(0.0..=1.0).contains(&t) {
            return Err(Error::InvalidRequest(format!("temperature {t} out of range [0, 1]")));
        }
    }
    if let Some(p) = out.top_p {
        if !(0.0..=1.0).contains(&p) {
            return Err(Error::InvalidRequest(format!("topP {p} out of range [0, 1]")));
        }
    }
    if let Some(k) = out.top_k {
        if k == 0 {
            return Err(Error::InvalidRequest("topK must be positive".into()));
        }
    }
    if let Some(mt) = out.max_tokens {
        if mt == 0 {
            return Err(Error::InvalidRequest("maxTokens must be positive".into()));
        }
    }
    if let Some(tb) = out.thinking_budget {
        if tb == 0 {
            return Err(Error::InvalidRequest("thinkingBudget must be positive".into()));
        }
    }

    if let Some(limits) = limits {
        out.max_tokens = Some(out.max_tokens.map_or(limits.max_output_tokens, |mt| mt.min(limits.max_output_tokens)));
    }

    if out.model_id.is_none() {
        return Err(Error::InvalidRequest("modelId is required".into()));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(model_id: Option<&str>) -> ModelParams {
        ModelParams { model_id: model_id.map(String::from), ..Default::default() }
    }

    #[test]
    fn later_layers_override_earlier_ones() {
        let system = ModelParams { temperature: Some(0.2), ..params(Some("system-model")) };
        let request = ModelParams { temperature: Some(0.9), ..Default::default() };
        let out = resolve(&system, &ModelParams::default(), &ModelParams::default(), &request, None).unwrap();
        assert_eq!(out.temperature, Some(0.9));
        assert_eq!(out.model_id.as_deref(), Some("system-model"));
    }

    #[test]
    fn missing_model_id_after_every_layer_is_an_error() {
        let err = resolve(&ModelParams::default(), &ModelParams::default(), &ModelParams::default(), &ModelParams::default(), None);
        assert!(err.is_err());
    }

    #[test]
    fn out_of_range_temperature_is_rejected() {
        let request = ModelParams { temperature: Some(1.5), ..Default::default() };
        let err = resolve(&params(Some("m")), &ModelParams::default(), &ModelParams::default(), &request, None);
        assert!(err.is_err());
    }

    #[test]
    fn max_tokens_is_capped_at_the_model_limit() {
        let request = ModelParams { max_tokens: Some(100_000), ..Default::default() };
        let out = resolve(
            &params(Some("m")),
            &ModelParams::default(),
            &ModelParams::default(),
            &request,
            Some(&ModelLimits { max_output_tokens: 4096 }),
        )
        .unwrap();
        assert_eq!(out.max_tokens, Some(4096));
    }

    #[test]
    fn missing_max_tokens_defaults_to_the_model_limit_when_one_is_given() {
        let out = resolve(
            &params(Some("m")),
            &ModelParams::default(),
            &ModelParams::default(),
            &ModelParams::default(),
            Some(&ModelLimits { max_output_tokens: 4096 }),
        )
        .unwrap();
        assert_eq!(out.max_tokens, Some(4096));
    }
}
