//! Elección del modelo generativo a partir de los que anuncia el proveedor.
//!
//! Se ejecuta de nuevo en cada resumen y en cada respuesta, sin caché: si la
//! disponibilidad cambia a mitad de sesión, el modelo elegido también.

use serde::Serialize;
use tracing::warn;

use crate::llm::{GenerativeProvider, ModelInfo};

/// Resultado de la selección, etiquetado según el paso que lo produjo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "name", rename_all = "snake_case")]
pub enum ModelChoice {
    /// Coincide con una de las preferencias.
    Matched(String),
    /// Ninguna preferencia coincide: primer modelo disponible.
    FallbackAny(String),
    /// El listado falló o vino vacío: modelo por defecto.
    FallbackDefault(String),
}

impl ModelChoice {
    pub fn name(&self) -> &str {
        match self {
            Self::Matched(name) | Self::FallbackAny(name) | Self::FallbackDefault(name) => name,
        }
    }
}

/// Recorre las preferencias en orden; para cada una busca el primer modelo
/// cuyo nombre la contenga. Gana la primera preferencia con alguna coincidencia.
pub fn choose_from(available: &[ModelInfo], preferences: &[String]) -> Option<ModelChoice> {
    let by_preference = preferences.iter().find_map(|wanted| {
        available
            .iter()
            .find(|m| m.name.contains(wanted.as_str()))
            .map(|m| ModelChoice::Matched(m.name.clone()))
    });

    by_preference.or_else(|| {
        available
            .first()
            .map(|m| ModelChoice::FallbackAny(m.name.clone()))
    })
}

/// Lista los modelos del proveedor y aplica [`choose_from`], cayendo en
/// `default_model` si el listado falla o no devuelve nada.
pub async fn select_model(
    provider: &dyn GenerativeProvider,
    preferences: &[String],
    default_model: &str,
) -> ModelChoice {
    let available = match provider.list_models().await {
        Ok(models) => models,
        Err(err) => {
            warn!("No se pudo listar modelos ({err:#}); usando {default_model}");
            return ModelChoice::FallbackDefault(default_model.to_string());
        }
    };

    // Solo cuentan los que admiten generación, aunque el proveedor ya filtre.
    let generative: Vec<ModelInfo> = available
        .into_iter()
        .filter(ModelInfo::supports_generation)
        .collect();

    choose_from(&generative, preferences).unwrap_or_else(|| {
        warn!("El proveedor no anunció modelos generativos; usando {default_model}");
        ModelChoice::FallbackDefault(default_model.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{model, ScriptedProvider};

    fn prefs() -> Vec<String> {
        ["gemini-3-flash", "gemini-2.5-flash", "gemini-flash-latest"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn earlier_preference_wins_over_list_order() {
        let available = vec![model("x-gemini-2.5-flash-exp"), model("gemini-flash-latest")];
        assert_eq!(
            choose_from(&available, &prefs()),
            Some(ModelChoice::Matched("x-gemini-2.5-flash-exp".to_string()))
        );
    }

    #[test]
    fn first_listed_model_wins_within_a_preference() {
        let available = vec![model("gemini-2.5-flash-lite"), model("gemini-2.5-flash")];
        assert_eq!(
            choose_from(&available, &prefs()),
            Some(ModelChoice::Matched("gemini-2.5-flash-lite".to_string()))
        );

        let mut with_newer = available.clone();
        with_newer.push(model("gemini-3-flash-preview"));
        assert_eq!(
            choose_from(&with_newer, &prefs()),
            Some(ModelChoice::Matched("gemini-3-flash-preview".to_string()))
        );
    }

    #[test]
    fn no_match_falls_back_to_first_available() {
        let available = vec![model("gemma-3-27b-it"), model("gemini-pro")];
        assert_eq!(
            choose_from(&available, &prefs()),
            Some(ModelChoice::FallbackAny("gemma-3-27b-it".to_string()))
        );
        assert_eq!(choose_from(&[], &prefs()), None);
    }

    #[tokio::test]
    async fn listing_failure_uses_default() {
        let provider = ScriptedProvider::failing_listing();
        let choice = select_model(&provider, &prefs(), "gemini-1.5-flash").await;
        assert_eq!(choice, ModelChoice::FallbackDefault("gemini-1.5-flash".to_string()));
        assert_eq!(choice.name(), "gemini-1.5-flash");
    }

    #[tokio::test]
    async fn empty_listing_uses_default() {
        let provider = ScriptedProvider::with_models(Vec::new());
        let choice = select_model(&provider, &prefs(), "gemini-1.5-flash").await;
        assert_eq!(choice, ModelChoice::FallbackDefault("gemini-1.5-flash".to_string()));
    }

    #[tokio::test]
    async fn non_generative_models_are_ignored() {
        let mut embedder = model("gemini-2.5-flash-embedding");
        embedder.supported_generation_methods = vec!["embedContent".to_string()];
        let provider = ScriptedProvider::with_models(vec![embedder, model("gemini-flash-latest")]);

        let choice = select_model(&provider, &prefs(), "gemini-1.5-flash").await;
        assert_eq!(choice, ModelChoice::Matched("gemini-flash-latest".to_string()));
    }

    #[test]
    fn choice_serializes_as_tagged_variant() {
        let json = serde_json::to_value(ModelChoice::FallbackAny("m".to_string())).unwrap();
        assert_eq!(json, serde_json::json!({"outcome": "fallback_any", "name": "m"}));
    }
}
