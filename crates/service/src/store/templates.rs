use std::collections::HashMap;

use async_trait::async_trait;
use lexio_core::config::StoreConfig;
use lexio_core::{DifficultyLevel, ExerciseTemplate, ExerciseType, Result};
use parking_lot::RwLock;
use tracing::debug;

use super::{simulate_latency, TemplateStore};

use lexio_core::DifficultyLevel::{Advanced, Beginner, Intermediate};
use lexio_core::ExerciseType::{
    LetterRecognition, SentenceFormation, SyllableFormation, TextComprehension, WordCompletion,
};

/// Template catalogue held in memory.
pub struct InMemoryTemplateStore {
    templates: RwLock<HashMap<String, ExerciseTemplate>>,
    latency_ms: u64,
}

impl InMemoryTemplateStore {
    pub fn empty(config: &StoreConfig) -> Self {
        Self {
            templates: RwLock::new(HashMap::new()),
            latency_ms: config.template_latency_ms,
        }
    }

    /// Store pre-loaded with the Spanish literacy catalogue.
    pub fn seeded(config: &StoreConfig) -> Self {
        let store = Self::empty(config);
        for template in seed_templates() {
            store.insert(template);
        }
        store
    }

    /// Add or replace a template under its own id.
    pub fn insert(&self, template: ExerciseTemplate) {
        debug!(template_id = %template.id, "template stored");
        self.templates.write().insert(template.id.clone(), template);
    }

    pub fn len(&self) -> usize {
        self.templates.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.read().is_empty()
    }
}

#[async_trait]
impl TemplateStore for InMemoryTemplateStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<ExerciseTemplate>> {
        simulate_latency(self.latency_ms).await;
        Ok(self.templates.read().get(id).cloned())
    }

    async fn templates_for(
        &self,
        level: DifficultyLevel,
        kind: ExerciseType,
    ) -> Result<Vec<ExerciseTemplate>> {
        simulate_latency(self.latency_ms).await;
        let mut found: Vec<_> = self
            .templates
            .read()
            .values()
            .filter(|t| t.level == level && t.kind == kind)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }

    async fn all(&self) -> Result<Vec<ExerciseTemplate>> {
        simulate_latency(self.latency_ms).await;
        let mut all: Vec<_> = self.templates.read().values().cloned().collect();
        all.sort_by(|a, b| (a.level as u8, &a.id).cmp(&(b.level as u8, &b.id)));
        Ok(all)
    }
}

fn seed_templates() -> Vec<ExerciseTemplate> {
    vec![
        ExerciseTemplate::new(
            "beginner-letter-1",
            Beginner,
            LetterRecognition,
            "¿Qué letra es esta? A",
            "A",
        )
        .with_options(["A", "E", "I", "O"]),
        ExerciseTemplate::new(
            "beginner-letter-2",
            Beginner,
            LetterRecognition,
            "¿Qué letra es esta? M",
            "M",
        )
        .with_options(["M", "N", "P", "R"]),
        ExerciseTemplate::new(
            "beginner-syllable-1",
            Beginner,
            SyllableFormation,
            "Forma una sílaba con la letra M y una vocal",
            "MA",
        )
        .with_options(["MA", "LA", "TA", "PA"]),
        ExerciseTemplate::new(
            "beginner-syllable-2",
            Beginner,
            SyllableFormation,
            "Forma una sílaba con la letra P y una vocal",
            "PE",
        )
        .with_options(["PE", "DE", "BE", "FE"]),
        ExerciseTemplate::new(
            "intermediate-word-1",
            Intermediate,
            WordCompletion,
            "Completa la palabra: CA_A",
            "S",
        )
        .with_options(["S", "M", "R", "L"]),
        ExerciseTemplate::new(
            "intermediate-word-2",
            Intermediate,
            WordCompletion,
            "Completa la palabra: PE_RO",
            "R",
        )
        .with_options(["R", "S", "D", "L"]),
        ExerciseTemplate::new(
            "intermediate-syllable-1",
            Intermediate,
            SyllableFormation,
            "Forma una sílaba con las letras TR y una vocal",
            "TRA",
        )
        .with_options(["TRA", "BRA", "FRA", "GRA"]),
        ExerciseTemplate::new(
            "advanced-sentence-1",
            Advanced,
            SentenceFormation,
            "Ordena las palabras para formar una oración: gato el duerme sofá en el",
            "El gato duerme en el sofá",
        ),
        ExerciseTemplate::new(
            "advanced-sentence-2",
            Advanced,
            SentenceFormation,
            "Ordena las palabras para formar una oración: escuela voy a la yo",
            "Yo voy a la escuela",
        ),
        ExerciseTemplate::new(
            "advanced-reading-1",
            Advanced,
            TextComprehension,
            "Lee el siguiente texto y responde: \"María juega en el parque con su pelota roja\". ¿De qué color es la pelota de María?",
            "Roja",
        )
        .with_options(["Roja", "Azul", "Verde", "Amarilla"]),
    ]
}
